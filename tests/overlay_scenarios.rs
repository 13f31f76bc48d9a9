use force_graph_overlay::overlay::{
	CategorySettings, Color, GraphInstance, GraphicsKind, InMemoryVault, InteractiveManager, LayerSettings, LayersEngine,
	LogicalId, MemoryHost, NodeKind, Override, OverlaySettings, Palette, Property, PropertyValue, Registration,
	Scene,
};
use rstest::{fixture, rstest};

struct Graph {
	host: MemoryHost,
	vault: InMemoryVault,
	instance: GraphInstance,
}

impl Graph {
	fn sync(&mut self) -> force_graph_overlay::overlay::SyncReport {
		self.instance.sync(&mut self.host, &self.vault)
	}

	fn decorations_on(&self, anchor: force_graph_overlay::overlay::GraphicsId) -> usize {
		let scene = self.host.scene();
		scene
			.children(self.host.stage())
			.iter()
			.filter(|c| scene.get(**c).is_some_and(|o| o.anchor() == Some(anchor)))
			.count()
	}
}

#[fixture]
fn graph() -> Graph {
	let mut host = MemoryHost::new();
	for id in ["a.md", "b.md", "c.md"] {
		host.add_node(id, NodeKind::File);
	}
	host.add_link("a.md", "b.md", true);
	host.add_link("b.md", "c.md", true);
	let vault = InMemoryVault::new()
		.with_tags("a.md", &["x"])
		.with_tags("b.md", &["x", "y"])
		.with_tags("c.md", &["y"])
		.with_property("a.md", "parent", &["[[b]]"]);
	let mut instance = GraphInstance::new(OverlaySettings::default());
	instance.on_graph_ready(&mut host, &vault);
	Graph {
		host,
		vault,
		instance,
	}
}

fn hues(manager: &InteractiveManager) -> Vec<(String, String)> {
	manager
		.types()
		.map(|v| (v.to_owned(), manager.color(v).to_string()))
		.collect()
}

#[rstest]
fn memberships_survive_repeated_recreation(mut graph: Graph) {
	let id = LogicalId::node("b.md");
	let before = graph.instance.nodes().get(&id).expect("b").types().clone();

	for _ in 0..3 {
		graph.host.recreate_node("b.md");
		graph.sync();
	}
	let b = graph.instance.nodes().get(&id).expect("b");
	assert_eq!(b.types(), &before);
	assert!(b.is_active());
	assert_eq!(b.rebinds(), 3);
	assert_eq!(b.core_handle(), graph.host.node("b.md").map(|n| n.handle));
}

#[rstest]
fn sync_without_host_changes_is_quiet(mut graph: Graph) {
	graph.sync();
	let objects = graph.host.scene().len();
	let report = graph.sync();
	assert!(report.is_quiet(), "{report:?}");
	assert_eq!(graph.host.scene().len(), objects);
}

#[rstest]
#[case(&["a", "b", "c", "d", "e"])]
#[case(&["e", "d", "c", "b", "a"])]
#[case(&["c", "a", "e", "b", "d"])]
fn colour_by_index_is_order_independent(#[case] order: &[&str]) {
	let mut reference = InteractiveManager::new("tag", &CategorySettings::default());
	reference.add_types(["a", "b", "c", "d", "e"]);
	let want: Vec<String> = hues(&reference).into_iter().map(|(_, c)| c).collect();

	let mut tags = InteractiveManager::new("tag", &CategorySettings::default());
	for value in order {
		tags.add_type(value);
	}
	let got: Vec<String> = hues(&tags).into_iter().map(|(_, c)| c).collect();
	assert_eq!(got, want);
}

#[test]
fn three_tags_split_the_hue_circle_and_keep_it() {
	let mut tags = InteractiveManager::new("tag", &CategorySettings::default());
	for value in ["a", "b", "c"] {
		tags.add_type(value);
	}
	let types: Vec<&str> = tags.types().collect();
	assert_eq!(types, ["a", "b", "c"]);
	for (i, value) in ["a", "b", "c"].into_iter().enumerate() {
		assert_eq!(tags.color(value), Palette::LinearHue.sample(i as f64 / 3.0));
	}

	let (a, c) = (tags.color("a"), tags.color("c"));
	tags.remove_types(["b"]);
	tags.add_type("d");
	assert_eq!(tags.color("a"), a);
	assert_eq!(tags.color("c"), c);
}

#[rstest]
fn linear_window_fades_monotonically(#[values(1, 2, 3, 4, 7)] window: usize) {
	let engine = LayersEngine::new(LayerSettings {
		window_size: window,
		..LayerSettings::default()
	});
	let w = window as isize;
	for shift in -3..w + 3 {
		let opacity = engine.opacity_at(shift);
		if (0..w).contains(&shift) {
			assert!(opacity > 0.0 && opacity <= 1.0);
			assert!(opacity >= engine.opacity_at(shift + 1));
		} else {
			assert_eq!(opacity, 0.0);
		}
	}
}

#[test]
fn five_layers_with_a_window_of_three() {
	let mut host = MemoryHost::new();
	let mut vault = InMemoryVault::new();
	let names = ["a.md", "b.md", "c.md", "d.md", "e.md"];
	for (level, name) in names.into_iter().enumerate() {
		host.add_node(name, NodeKind::File);
		vault = vault.with_property(name, "layer", &[&format!("{level}_L{level}")]);
	}
	let mut settings = OverlaySettings::default();
	settings.layers.enabled = true;
	settings.layers.window_size = 3;
	let mut instance = GraphInstance::new(settings);
	instance.on_graph_ready(&mut host, &vault);
	instance.set_current_level(&mut host, 1);

	let expected = [0.0, 1.0, 2.0 / 3.0, 1.0 / 3.0, 0.0];
	for (name, want) in names.into_iter().zip(expected) {
		let got = instance.layer_opacity(&LogicalId::node(name)).expect("layered");
		assert!((got - want).abs() < 1e-9, "{name}: {got} != {want}");
	}
}

#[test]
fn one_override_chain_per_target_and_property() {
	let mut scene = Scene::new();
	let circle = scene.create(GraphicsKind::Circle);
	let owner = LogicalId::node("a.md");
	let grey = || {
		vec![Override::rewrite("grey", |_| true, |_| {
			PropertyValue::Color(Color::GREY)
		})]
	};

	assert_eq!(scene.intercept(circle, Property::Tint, &owner, grey()), Registration::Installed);
	assert_eq!(
		scene.intercept(circle, Property::Tint, &owner, grey()),
		Registration::AlreadyRegistered
	);
	assert_eq!(scene.interceptors().len(), 1);

	assert!(scene.interceptors().is_registered(circle, Property::Tint));
	assert!(!scene.interceptors().is_registered(circle, Property::Alpha));
	scene.write(circle, Property::Tint, PropertyValue::Color(Color::WHITE));
	assert_eq!(scene.get(circle).expect("circle").tint, Color::GREY);

	assert!(scene.interceptors_mut().unregister_property(circle, Property::Tint));
	assert_eq!(scene.intercept(circle, Property::Tint, &owner, grey()), Registration::Installed);
	assert_eq!(scene.interceptors_mut().unregister(circle), 1);
	assert_eq!(scene.intercept(circle, Property::Tint, &owner, grey()), Registration::Installed);

	scene.destroy(circle);
	assert!(scene.interceptors().is_empty());
}

#[rstest]
fn recreated_link_moves_its_decoration_once(mut graph: Graph) {
	let id = LogicalId::link("a.md", "b.md");
	let old_line = graph.host.link("a.md", "b.md").expect("link").line;
	assert!(graph.instance.links().get(&id).and_then(|l| l.decoration()).is_some());
	assert_eq!(graph.decorations_on(old_line), 1);

	graph.host.recreate_link("a.md", "b.md");
	let report = graph.sync();
	assert_eq!(report.rebound, vec![id.clone()]);
	let new_line = graph.host.link("a.md", "b.md").expect("link").line;

	let link = graph.instance.links().get(&id).expect("link");
	assert_eq!(link.rebinds(), 1);
	assert_eq!(link.decoration().and_then(|d| d.anchor()), Some(new_line));
	assert_eq!(graph.decorations_on(old_line), 0);
	assert_eq!(graph.decorations_on(new_line), 1);

	let again = graph.sync();
	assert!(again.is_quiet());
	assert_eq!(graph.instance.links().get(&id).expect("link").rebinds(), 1);
}

#[rstest]
fn one_element_can_hide_one_membership(mut graph: Graph) {
	let b = LogicalId::node("b.md");
	assert!(graph.instance.toggle_element_type(&mut graph.host, &b, "tag", "x", false));
	graph.sync();

	let element = graph.instance.nodes().get(&b).expect("b");
	assert!(element.is_active());
	assert!(!element.is_channel_enabled("tag", "x"));
	let arc = element.decoration().and_then(|d| d.channel("tag", "x")).expect("arc");
	assert!(!graph.host.scene().get(arc).expect("arc").visible);

	let a = graph.instance.nodes().get(&LogicalId::node("a.md")).expect("a");
	let arc = a.decoration().and_then(|d| d.channel("tag", "x")).expect("arc");
	assert!(graph.host.scene().get(arc).expect("arc").visible);

	let stranger = LogicalId::node("nowhere.md");
	assert!(!graph.instance.toggle_element_type(&mut graph.host, &stranger, "tag", "x", true));
}

#[rstest]
fn user_colour_reaches_every_arc(mut graph: Graph) {
	let red = Color::rgb(255, 0, 0);
	graph.instance.manager_mut("tag").expect("tags").set_color("y", red);
	graph.sync();
	for id in ["b.md", "c.md"] {
		let element = graph.instance.nodes().get(&LogicalId::node(id)).expect("node");
		let arc = element.decoration().and_then(|d| d.channel("tag", "y")).expect("arc");
		assert_eq!(graph.host.scene().get(arc).expect("arc").tint, red);
	}
}

#[rstest]
fn switching_a_whole_category_off_and_on(mut graph: Graph) {
	graph.instance.manager_mut("tag").expect("tags").disable_all();
	graph.sync();
	for id in ["a.md", "b.md", "c.md"] {
		assert!(graph.host.is_hidden(id), "{id} still drawn");
	}
	assert!(graph.host.links().is_empty());

	graph.instance.manager_mut("tag").expect("tags").enable_all();
	graph.sync();
	for id in ["a.md", "b.md", "c.md"] {
		assert!(graph.host.node(id).is_some());
		assert!(graph.instance.nodes().get(&LogicalId::node(id)).expect("node").is_active());
	}
	assert_eq!(graph.host.links().len(), 2);
}
