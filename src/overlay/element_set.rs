//! Reconciliation of the host's live arrays against known identities.

use std::collections::{BTreeMap, HashSet};

use log::warn;

use super::color::Color;
use super::element::{Decoratable, DecorationContext, ElementState, ExtendedElement};
use super::host::{CoreLink, LiveCollections};
use super::identity::LogicalId;
use super::interactive::Managers;
use super::metadata::MetadataSource;
use super::scene::{GraphicsId, GraphicsKind, Scene};
use super::settings::Features;

/// What one [`ElementSet::sync`] pass reads from the graph instance.
pub struct SyncContext<'a> {
	/// Source of memberships.
	pub metadata: &'a dyn MetadataSource,
	/// New values are registered here.
	pub managers: &'a mut Managers,
	/// Decides which elements get a decoration.
	pub features: &'a Features,
	/// Fill behind node decorations.
	pub background: Color,
	/// Consecutive missed syncs tolerated before an element is deactivated.
	pub grace_ticks: u32,
}

/// Identities each reconciliation step touched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
	/// First seen this pass.
	pub created: Vec<LogicalId>,
	/// Moved onto a replacement core.
	pub rebound: Vec<LogicalId>,
	/// Missing past the grace period.
	pub deactivated: Vec<LogicalId>,
	/// Back after being deactivated.
	pub reactivated: Vec<LogicalId>,
	/// Memberships changed since the last pass.
	pub retyped: Vec<LogicalId>,
	/// Hit an error; retried next pass.
	pub failed: Vec<LogicalId>,
}

impl SyncReport {
	/// Nothing was created, moved, retyped or switched.
	pub fn is_quiet(&self) -> bool {
		self.created.is_empty()
			&& self.rebound.is_empty()
			&& self.deactivated.is_empty()
			&& self.reactivated.is_empty()
			&& self.retyped.is_empty()
	}

	/// Appends another pass's findings.
	pub fn merge(&mut self, other: SyncReport) {
		self.created.extend(other.created);
		self.rebound.extend(other.rebound);
		self.deactivated.extend(other.deactivated);
		self.reactivated.extend(other.reactivated);
		self.retyped.extend(other.retyped);
		self.failed.extend(other.failed);
	}

	/// Identities whose graphics changed and need (re)layering.
	pub fn touched(&self) -> impl Iterator<Item = &LogicalId> {
		self.created
			.iter()
			.chain(&self.rebound)
			.chain(&self.reactivated)
	}
}

/// Every identity of one kind the overlay has ever seen, keyed and ordered
/// by [`LogicalId`].
#[derive(Debug)]
pub struct ElementSet<C: Decoratable> {
	elements: BTreeMap<LogicalId, ExtendedElement<C>>,
}

impl<C: Decoratable> Default for ElementSet<C> {
	fn default() -> Self {
		Self {
			elements: BTreeMap::new(),
		}
	}
}

impl<C: Decoratable> ElementSet<C> {
	/// An empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Looks up an element, active or not.
	pub fn get(&self, id: &LogicalId) -> Option<&ExtendedElement<C>> {
		self.elements.get(id)
	}

	/// Mutable lookup.
	pub fn get_mut(&mut self, id: &LogicalId) -> Option<&mut ExtendedElement<C>> {
		self.elements.get_mut(id)
	}

	/// True once `id` has been seen.
	pub fn contains(&self, id: &LogicalId) -> bool {
		self.elements.contains_key(id)
	}

	/// Known identities, including deactivated ones.
	pub fn len(&self) -> usize {
		self.elements.len()
	}

	/// True before the first element is created.
	pub fn is_empty(&self) -> bool {
		self.elements.is_empty()
	}

	/// Elements in identity order.
	pub fn iter(&self) -> impl Iterator<Item = &ExtendedElement<C>> {
		self.elements.values()
	}

	/// Mutable iteration in identity order.
	pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ExtendedElement<C>> {
		self.elements.values_mut()
	}

	/// True when some element still lists `value` under `category`.
	pub fn carries(&self, category: &str, value: &str) -> bool {
		self.elements
			.values()
			.any(|e| e.values(category).any(|v| v == value))
	}

	/// Elements that belong to `value` in `category`.
	pub fn members_mut<'a>(
		&'a mut self,
		category: &'a str,
		value: &'a str,
	) -> impl Iterator<Item = &'a mut ExtendedElement<C>> + 'a {
		self.elements
			.values_mut()
			.filter(move |e| e.values(category).any(|v| v == value))
	}

	/// One reconciliation pass against the host's current collection.
	pub fn sync(
		&mut self,
		scene: &mut Scene,
		live: LiveCollections<'_>,
		ctx: &mut SyncContext<'_>,
	) -> SyncReport {
		let mut report = SyncReport::default();
		let mut seen = HashSet::new();

		for core in C::collection(live) {
			let id = core.identity();
			if !seen.insert(id.clone()) {
				warn!("{id}: host listed the same identity twice, keeping the first");
				continue;
			}

			if !self.elements.contains_key(&id) {
				let element = Self::create(scene, core, id.clone(), ctx, &mut report);
				self.elements.insert(id.clone(), element);
				report.created.push(id);
				continue;
			}
			let Some(element) = self.elements.get_mut(&id) else {
				continue;
			};
			element.note_present();
			let types = core.derive_types(ctx.metadata, ctx.managers);
			let retyped = types != *element.types();
			if retyped {
				for (category, values) in &types {
					if let Some(manager) = ctx.managers.get_mut(category) {
						manager.add_types(values.iter().map(String::as_str));
					}
				}
			}
			let dctx = DecorationContext {
				managers: &*ctx.managers,
				features: ctx.features,
				background: ctx.background,
			};
			if retyped {
				if let Err(err) = element.set_types(scene, types, &dctx) {
					warn!("{id}: decoration rebuild failed: {err}");
					report.failed.push(id.clone());
				}
				report.retyped.push(id.clone());
			}

			if element.state() == ElementState::Disabled {
				if !element.is_filtered() {
					match element.enable(scene, live, &dctx) {
						Ok(true) => report.reactivated.push(id),
						Ok(false) => {}
						Err(err) => {
							warn!("{id}: reactivation failed: {err}");
							report.failed.push(id);
						}
					}
				}
				continue;
			}

			let stale = !element.is_same_core_element(core) || element.state() != ElementState::Bound;
			if stale {
				match element.update_core_element(scene, live, &dctx) {
					Ok(true) => report.rebound.push(id),
					Ok(false) => {}
					Err(err) => {
						warn!("{id}: rebind failed: {err}");
						report.failed.push(id);
					}
				}
			} else if element.decoration().is_some_and(|d| !d.is_alive(scene)) {
				if let Err(err) = element.rebuild_decoration(scene, &dctx) {
					warn!("{id}: decoration rebuild failed: {err}");
					report.failed.push(id);
				}
			}
		}

		for (id, element) in &mut self.elements {
			if seen.contains(id) || element.is_absent() {
				continue;
			}
			let was_active = element.is_active();
			if element.note_missing() > ctx.grace_ticks {
				element.mark_absent(scene);
				if was_active {
					report.deactivated.push(id.clone());
				}
			}
		}
		report
	}

	fn create(
		scene: &mut Scene,
		core: &C,
		id: LogicalId,
		ctx: &mut SyncContext<'_>,
		report: &mut SyncReport,
	) -> ExtendedElement<C> {
		let types = core.derive_types(ctx.metadata, ctx.managers);
		for (category, values) in &types {
			if let Some(manager) = ctx.managers.get_mut(category) {
				manager.add_types(values.iter().map(String::as_str));
			}
		}
		let mut element = ExtendedElement::new(id.clone(), core.kind(), types);
		let dctx = DecorationContext {
			managers: &*ctx.managers,
			features: ctx.features,
			background: ctx.background,
		};
		if let Err(err) = element.set_core_element(scene, core, &dctx) {
			warn!("{id}: initial bind failed: {err}");
			report.failed.push(id);
		}
		if element.is_any_manager_disabled(ctx.managers) {
			element.mark_filtered(scene, true);
		}
		element
	}

	/// Forgets an identity entirely, releasing its graphics.
	pub fn remove(&mut self, scene: &mut Scene, id: &LogicalId) -> bool {
		match self.elements.remove(id) {
			Some(element) => {
				element.destroy(scene);
				true
			}
			None => false,
		}
	}

	/// Forgets every identity, releasing all graphics.
	pub fn clear(&mut self, scene: &mut Scene) {
		for (_, element) in std::mem::take(&mut self.elements) {
			element.destroy(scene);
		}
	}
}

impl ElementSet<CoreLink> {
	/// Cross-references each link with the one running the other way and
	/// bows the decorations of such pairs apart.
	pub fn refresh_siblings(&mut self, scene: &mut Scene) {
		let ids: HashSet<LogicalId> = self
			.elements
			.iter()
			.filter(|(_, e)| !e.is_absent())
			.map(|(id, _)| id.clone())
			.collect();
		for (id, element) in &mut self.elements {
			let sibling = id.reversed_link().ok().filter(|r| ids.contains(r));
			element.set_sibling(scene, sibling);
		}
	}
}

/// Outline containers shared by a link and its reverse.
#[derive(Debug, Default)]
pub struct Outlines {
	containers: BTreeMap<(LogicalId, LogicalId), GraphicsId>,
}

impl Outlines {
	fn key(a: &LogicalId, b: &LogicalId) -> (LogicalId, LogicalId) {
		if a <= b {
			(a.clone(), b.clone())
		} else {
			(b.clone(), a.clone())
		}
	}

	/// The container shared by `id` and `sibling`, in either order.
	pub fn container(&self, id: &LogicalId, sibling: &LogicalId) -> Option<GraphicsId> {
		self.containers.get(&Self::key(id, sibling)).copied()
	}

	/// Live pairs.
	pub fn len(&self) -> usize {
		self.containers.len()
	}

	/// True when no pair is outlined.
	pub fn is_empty(&self) -> bool {
		self.containers.is_empty()
	}

	/// Keeps one live container per bound sibling pair, dropping the rest.
	pub fn sync(&mut self, scene: &mut Scene, links: &ElementSet<CoreLink>, outline: Color) {
		let mut wanted = BTreeMap::new();
		for link in links.iter().filter(|l| l.is_active()) {
			let (Some(sibling), Some(core)) = (link.sibling(), link.core()) else {
				continue;
			};
			let Some(parent) = scene.parent(core.line) else {
				continue;
			};
			wanted.entry(Self::key(link.id(), sibling)).or_insert(parent);
		}

		let stale: Vec<_> = self
			.containers
			.iter()
			.filter(|(k, g)| !wanted.contains_key(*k) || !scene.is_alive(**g))
			.map(|(k, g)| (k.clone(), *g))
			.collect();
		for (key, container) in stale {
			scene.destroy_tree(container);
			self.containers.remove(&key);
		}

		for (key, parent) in wanted {
			if self.containers.contains_key(&key) {
				continue;
			}
			let container = scene.create(GraphicsKind::Container);
			if let Some(obj) = scene.get_mut(container) {
				obj.owner = Some(key.0.clone());
			}
			for id in [&key.0, &key.1] {
				let line = scene.create(GraphicsKind::Line);
				if let Some(obj) = scene.get_mut(line) {
					obj.owner = Some(id.clone());
					obj.tint = outline;
				}
				let _ = scene.add_child(container, line);
			}
			if let Err(err) = scene.add_child(parent, container) {
				warn!("{}: outline not attached: {err}", key.0);
				scene.destroy_tree(container);
				continue;
			}
			self.containers.insert(key, container);
		}
	}

	/// Destroys every outline.
	pub fn clear(&mut self, scene: &mut Scene) {
		for (_, container) in std::mem::take(&mut self.containers) {
			scene.destroy_tree(container);
		}
	}
}

#[cfg(test)]
mod tests {
	use rstest::{fixture, rstest};

	use super::*;
	use crate::overlay::element::SIBLING_BEND;
	use crate::overlay::host::{CoreNode, Host, MemoryHost, NodeKind};
	use crate::overlay::interactive::InteractiveManager;
	use crate::overlay::metadata::InMemoryVault;
	use crate::overlay::settings::CategorySettings;

	struct World {
		host: MemoryHost,
		vault: InMemoryVault,
		managers: Managers,
		features: Features,
		nodes: ElementSet<CoreNode>,
		links: ElementSet<CoreLink>,
		grace: u32,
	}

	impl World {
		fn sync_nodes(&mut self) -> SyncReport {
			let mut ctx = SyncContext {
				metadata: &self.vault,
				managers: &mut self.managers,
				features: &self.features,
				background: Color::BLACK,
				grace_ticks: self.grace,
			};
			let frame = self.host.frame();
			self.nodes.sync(frame.scene, frame.live, &mut ctx)
		}

		fn sync_links(&mut self) -> SyncReport {
			let mut ctx = SyncContext {
				metadata: &self.vault,
				managers: &mut self.managers,
				features: &self.features,
				background: Color::BLACK,
				grace_ticks: self.grace,
			};
			let frame = self.host.frame();
			self.links.sync(frame.scene, frame.live, &mut ctx)
		}
	}

	#[fixture]
	fn world() -> World {
		let mut host = MemoryHost::new();
		host.add_node("a.md", NodeKind::File);
		host.add_node("b.md", NodeKind::File);
		host.add_link("a.md", "b.md", true);
		let vault = InMemoryVault::new()
			.with_tags("a.md", &["x", "y"])
			.with_tags("b.md", &["y"])
			.with_property("a.md", "parent", &["[[b]]"]);
		let managers = ["tag", "link"]
			.into_iter()
			.map(|k| (k.to_owned(), InteractiveManager::new(k, &CategorySettings::default())))
			.collect();
		World {
			host,
			vault,
			managers,
			features: Features::default(),
			nodes: ElementSet::new(),
			links: ElementSet::new(),
			grace: 0,
		}
	}

	#[rstest]
	fn first_sync_creates_and_registers_types(mut world: World) {
		let report = world.sync_nodes();
		assert_eq!(report.created.len(), 2);
		let tags = &world.managers["tag"];
		assert_eq!(tags.types().collect::<Vec<_>>(), vec!["x", "y"]);

		let report = world.sync_links();
		assert_eq!(report.created, vec![LogicalId::link("a.md", "b.md")]);
		assert!(world.managers["link"].contains("parent"));
	}

	#[rstest]
	fn second_sync_without_changes_is_quiet(mut world: World) {
		world.sync_nodes();
		world.sync_links();
		assert!(world.sync_nodes().is_quiet());
		assert!(world.sync_links().is_quiet());
	}

	#[rstest]
	fn recreated_core_is_rebound_and_memberships_survive(mut world: World) {
		world.sync_nodes();
		let id = LogicalId::node("a.md");
		let before = world.nodes.get(&id).expect("a").types().clone();

		world.host.recreate_node("a.md");
		let report = world.sync_nodes();
		assert_eq!(report.rebound, vec![id.clone()]);
		assert!(report.created.is_empty());

		let a = world.nodes.get(&id).expect("a");
		assert_eq!(a.types(), &before);
		assert!(a.is_active());
		let circle = world.host.node("a.md").expect("node").circle;
		let container = a.decoration().expect("decoration").container();
		assert_eq!(world.host.scene().parent(container), Some(circle));
	}

	#[rstest]
	fn absent_identity_is_deactivated_then_resurrected(mut world: World) {
		world.grace = 1;
		world.sync_nodes();
		world.host.remove_node("b.md");
		let id = LogicalId::node("b.md");

		assert!(world.sync_nodes().deactivated.is_empty());
		assert_eq!(world.sync_nodes().deactivated, vec![id.clone()]);
		assert_eq!(world.nodes.get(&id).expect("kept").state(), ElementState::Disabled);

		world.host.add_node("b.md", NodeKind::File);
		let report = world.sync_nodes();
		assert_eq!(report.reactivated, vec![id.clone()]);
		assert!(report.created.is_empty());
		assert!(world.nodes.get(&id).expect("b").is_active());
	}

	#[rstest]
	fn siblings_share_one_outline(mut world: World) {
		world.host.add_link("b.md", "a.md", false);
		world.sync_links();
		world.links.refresh_siblings(world.host.scene_mut());
		let forward = LogicalId::link("a.md", "b.md");
		let back = LogicalId::link("b.md", "a.md");
		assert_eq!(world.links.get(&forward).and_then(|l| l.sibling()), Some(&back));

		let mut outlines = Outlines::default();
		outlines.sync(world.host.scene_mut(), &world.links, Color::WHITE);
		assert_eq!(outlines.len(), 1);
		assert_eq!(outlines.container(&forward, &back), outlines.container(&back, &forward));

		world.host.remove_link("b.md", "a.md");
		world.sync_links();
		world.links.refresh_siblings(world.host.scene_mut());
		outlines.sync(world.host.scene_mut(), &world.links, Color::WHITE);
		assert!(outlines.is_empty());
	}

	#[rstest]
	fn sibling_decorations_bow_apart(mut world: World) {
		world.vault = std::mem::take(&mut world.vault).with_property("b.md", "child", &["[[a]]"]);
		world.host.add_link("b.md", "a.md", false);
		world.sync_links();
		world.links.refresh_siblings(world.host.scene_mut());
		let bend = |world: &World, id: &LogicalId| {
			let container = world
				.links
				.get(id)
				.and_then(|l| l.decoration())
				.expect("decorated")
				.container();
			world.host.scene().get(container).expect("container").bend
		};
		let forward = LogicalId::link("a.md", "b.md");
		assert_eq!(bend(&world, &forward), SIBLING_BEND);
		assert_eq!(bend(&world, &LogicalId::link("b.md", "a.md")), SIBLING_BEND);

		world.host.remove_link("b.md", "a.md");
		world.sync_links();
		world.links.refresh_siblings(world.host.scene_mut());
		assert_eq!(bend(&world, &forward), 0.0);
	}
}
