//! Everything one graph view owns, from first sync to teardown.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use super::assets::{self, AssetLoader, Delivery, QueuedLoader};
use super::color::{Color, Palette};
use super::element::{Decoratable, DecorationContext};
use super::element_set::{ElementSet, Outlines, SyncContext, SyncReport};
use super::host::{CoreLink, CoreNode, Host, HostFilter, LiveCollections, WorkerMessage};
use super::identity::LogicalId;
use super::interactive::{InteractiveManager, ManagerEvent, Managers};
use super::layers::{GraphicsRole, LayersEngine};
use super::metadata::{Category, MetadataSource};
use super::scene::{GraphicsId, Scene};
use super::settings::{EngineOptions, Features, OverlaySettings, Point, ViewState};

/// Light or dark app chrome; decides backdrop and outline colours.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Theme {
	#[default]
	Light,
	Dark,
}

impl Theme {
	/// Canvas colour, used for backdrop discs.
	pub fn background(&self) -> Color {
		match self {
			Theme::Light => Color::WHITE,
			Theme::Dark => Color::rgb(30, 30, 30),
		}
	}

	/// Outline colour.
	pub fn foreground(&self) -> Color {
		match self {
			Theme::Light => Color::rgb(34, 34, 34),
			Theme::Dark => Color::rgb(220, 220, 220),
		}
	}
}

/// Passive messages for the embedder; never block the render loop.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Notice {
	StateSaved { view: String },
	AssetUnavailable { id: LogicalId, reason: String },
}

/// The overlay of one graph view.
pub struct GraphInstance<L: AssetLoader = QueuedLoader> {
	settings: OverlaySettings,
	managers: Managers,
	nodes: ElementSet<CoreNode>,
	links: ElementSet<CoreLink>,
	outlines: Outlines,
	layers: LayersEngine,
	pins: BTreeMap<String, Point>,
	last_dragged: Option<String>,
	theme: Theme,
	notices: Vec<Notice>,
	filter: HostFilter,
	loader: L,
	ready: bool,
}

impl GraphInstance<QueuedLoader> {
	/// Images wait in a [`QueuedLoader`] until the embedder resolves them.
	pub fn new(settings: OverlaySettings) -> Self {
		Self::with_loader(settings, QueuedLoader::new())
	}
}

impl<L: AssetLoader> GraphInstance<L> {
	/// Builds one manager per enabled category. Nothing is drawn before
	/// [`on_graph_ready`](Self::on_graph_ready).
	pub fn with_loader(settings: OverlaySettings, loader: L) -> Self {
		let managers = settings
			.categories
			.iter()
			.filter(|(_, c)| c.enabled)
			.map(|(key, c)| (key.clone(), InteractiveManager::new(key.as_str(), c)))
			.collect();
		let layers = LayersEngine::new(settings.layers.clone());
		Self {
			settings,
			managers,
			nodes: ElementSet::new(),
			links: ElementSet::new(),
			outlines: Outlines::default(),
			layers,
			pins: BTreeMap::new(),
			last_dragged: None,
			theme: Theme::default(),
			notices: Vec::new(),
			filter: HostFilter::default(),
			loader,
			ready: false,
		}
	}

	/// Current settings, views included.
	pub fn settings(&self) -> &OverlaySettings {
		&self.settings
	}

	#[allow(missing_docs)]
	pub fn managers(&self) -> &Managers {
		&self.managers
	}

	#[allow(missing_docs)]
	pub fn manager(&self, category: &str) -> Option<&InteractiveManager> {
		self.managers.get(category)
	}

	/// Changes made here reach the decorations on the next sync.
	pub fn manager_mut(&mut self, category: &str) -> Option<&mut InteractiveManager> {
		self.managers.get_mut(category)
	}

	/// Extended nodes, absent ones included.
	pub fn nodes(&self) -> &ElementSet<CoreNode> {
		&self.nodes
	}

	/// Extended links, absent ones included.
	pub fn links(&self) -> &ElementSet<CoreLink> {
		&self.links
	}

	#[allow(missing_docs)]
	pub fn outlines(&self) -> &Outlines {
		&self.outlines
	}

	#[allow(missing_docs)]
	pub fn layers(&self) -> &LayersEngine {
		&self.layers
	}

	/// Pinned node paths and where they were pinned.
	pub fn pins(&self) -> &BTreeMap<String, Point> {
		&self.pins
	}

	/// Node last reported by [`note_dragged`](Self::note_dragged).
	pub fn last_dragged(&self) -> Option<&str> {
		self.last_dragged.as_deref()
	}

	#[allow(missing_docs)]
	pub fn theme(&self) -> Theme {
		self.theme
	}

	/// The host reported its graph built.
	pub fn is_ready(&self) -> bool {
		self.ready
	}

	/// For resolving queued image loads.
	pub fn loader_mut(&mut self) -> &mut L {
		&mut self.loader
	}

	/// Notices since the last call.
	pub fn take_notices(&mut self) -> Vec<Notice> {
		std::mem::take(&mut self.notices)
	}

	/// First sync once the host has built its graph.
	pub fn on_graph_ready(&mut self, host: &mut dyn Host, meta: &dyn MetadataSource) -> SyncReport {
		self.ready = true;
		let report = self.sync(host, meta);
		if self.settings.layers.enabled {
			self.enable_layers(host, meta);
		}
		info!(
			"graph ready: {} nodes, {} links, {} categories",
			self.nodes.len(),
			self.links.len(),
			self.managers.len()
		);
		report
	}

	fn reconcile(&mut self, host: &mut dyn Host, meta: &dyn MetadataSource) -> SyncReport {
		let frame = host.frame();
		let mut ctx = SyncContext {
			metadata: meta,
			managers: &mut self.managers,
			features: &self.settings.features,
			background: self.theme.background(),
			grace_ticks: self.settings.absent_grace_ticks,
		};
		let mut report = self.nodes.sync(frame.scene, frame.live, &mut ctx);
		report.merge(self.links.sync(frame.scene, frame.live, &mut ctx));
		report
	}

	/// One tick: reconcile, route manager events, then relayer and load.
	pub fn sync(&mut self, host: &mut dyn Host, meta: &dyn MetadataSource) -> SyncReport {
		let mut report = self.reconcile(host, meta);
		let retyped = !report.retyped.is_empty();
		if retyped {
			self.prune_values();
		}
		let filter = {
			let frame = host.frame();
			self.route_events(frame.scene, frame.live, retyped);
			self.current_filter()
		};
		if filter != self.filter {
			debug!(
				"host filter now hides {} nodes, {} links",
				filter.nodes.len(),
				filter.links.len()
			);
			host.apply_filter(&filter);
			self.filter = filter;
			report.merge(self.reconcile(host, meta));
			let frame = host.frame();
			self.route_events(frame.scene, frame.live, false);
		}

		let frame = host.frame();
		self.links.refresh_siblings(frame.scene);
		if self.settings.features.outlines {
			self.outlines
				.sync(frame.scene, &self.links, self.theme.foreground());
		} else {
			self.outlines.clear(frame.scene);
		}
		self.refresh_forced_colors();
		self.relayer(frame.scene, frame.stage, meta);
		self.load_assets(frame.scene, meta);
		report
	}

	/// Drops values that no element carries any more.
	fn prune_values(&mut self) {
		for (category, manager) in &mut self.managers {
			let stale: Vec<String> = manager
				.types()
				.filter(|v| !self.nodes.carries(category, v) && !self.links.carries(category, v))
				.map(str::to_owned)
				.collect();
			if stale.is_empty() {
				continue;
			}
			debug!("{category}: pruning {stale:?}");
			manager.remove_types(stale.iter().map(String::as_str));
		}
	}

	fn route_events(&mut self, scene: &mut Scene, live: LiveCollections<'_>, refilter: bool) {
		let events: Vec<ManagerEvent> = self
			.managers
			.values_mut()
			.flat_map(|m| m.drain_events())
			.collect();
		if events.is_empty() && !refilter {
			return;
		}
		let mut toggled = refilter;
		for event in events {
			match event {
				ManagerEvent::TypesAdded { category, values } => {
					debug!("{category}: {} new values", values.len());
				}
				ManagerEvent::TypesRemoved { category, values } => {
					debug!("{category}: {} values removed", values.len());
					for value in &values {
						refresh_channel(&mut self.nodes, scene, &category, value, false);
						refresh_channel(&mut self.links, scene, &category, value, false);
					}
				}
				ManagerEvent::ColorsChanged { category, colors } => {
					for (value, color) in &colors {
						recolor(&mut self.nodes, scene, &category, value, *color);
						recolor(&mut self.links, scene, &category, value, *color);
					}
				}
				ManagerEvent::Toggled {
					category,
					value,
					active,
				} => {
					refresh_channel(&mut self.nodes, scene, &category, &value, active);
					refresh_channel(&mut self.links, scene, &category, &value, active);
					toggled = true;
				}
			}
		}
		if toggled {
			let ctx = DecorationContext {
				managers: &self.managers,
				features: &self.settings.features,
				background: self.theme.background(),
			};
			refresh_filters(&mut self.nodes, scene, live, &ctx);
			refresh_filters(&mut self.links, scene, live, &ctx);
		}
	}

	fn current_filter(&self) -> HostFilter {
		HostFilter {
			nodes: self
				.nodes
				.iter()
				.filter(|e| e.is_filtered())
				.map(|e| e.id().as_str().to_owned())
				.collect(),
			links: self
				.links
				.iter()
				.filter(|e| e.is_filtered())
				.map(|e| e.id().clone())
				.collect(),
		}
	}

	fn refresh_forced_colors(&self) {
		let node_category = self.settings.features.force_node_color.as_deref();
		for element in self.nodes.iter() {
			let color = node_category.and_then(|c| element.leading_color(&self.managers, c));
			element.set_forced_color(color);
		}
		let link_category = Category::Link.key();
		let force_links = self.settings.features.force_link_color;
		for element in self.links.iter() {
			let color = force_links
				.then(|| element.leading_color(&self.managers, &link_category))
				.flatten();
			element.set_forced_color(color);
		}
	}

	fn link_layer_graphics(&self, id: &LogicalId) -> Vec<(GraphicsRole, GraphicsId)> {
		let Some(element) = self.links.get(id) else {
			return Vec::new();
		};
		let mut graphics = element.layer_graphics();
		let outline = element
			.sibling()
			.filter(|sibling| id < *sibling)
			.and_then(|sibling| self.outlines.container(id, sibling));
		graphics.extend(outline.map(|o| (GraphicsRole::LinkDecorationContainer, o)));
		graphics
	}

	/// Keeps every active element in its band. Known ones only reconnect.
	fn relayer(&mut self, scene: &mut Scene, stage: GraphicsId, meta: &dyn MetadataSource) {
		if !self.layers.is_enabled() {
			return;
		}
		if self.layers.needs_rebuild(scene, stage) {
			self.layers.rebuild_containers(scene, stage);
		}
		let nodes: Vec<(LogicalId, Vec<(GraphicsRole, GraphicsId)>)> = self
			.nodes
			.iter()
			.filter(|e| e.is_active())
			.map(|e| (e.id().clone(), e.layer_graphics()))
			.collect();
		for (id, graphics) in nodes {
			self.layers.add_node(scene, meta, &id, graphics);
		}
		let links: Vec<LogicalId> = self
			.links
			.iter()
			.filter(|e| e.is_active())
			.map(|e| e.id().clone())
			.collect();
		for id in links {
			let Ok((source, target)) = id.link_endpoints() else {
				continue;
			};
			let (source, target) = (LogicalId::node(source), LogicalId::node(target));
			let graphics = self.link_layer_graphics(&id);
			self.layers.add_link(scene, &id, &source, &target, graphics);
		}
	}

	fn load_assets(&mut self, scene: &mut Scene, meta: &dyn MetadataSource) {
		if !self.settings.features.images {
			return;
		}
		assets::request_images(&mut self.nodes, meta, &mut self.loader);
		let completions = self.loader.poll();
		if completions.is_empty() {
			return;
		}
		let ctx = DecorationContext {
			managers: &self.managers,
			features: &self.settings.features,
			background: self.theme.background(),
		};
		for completion in completions {
			let id = completion.request.id.clone();
			if let Delivery::Failed(reason) = assets::deliver(&mut self.nodes, scene, completion, &ctx) {
				self.notices.push(Notice::AssetUnavailable { id, reason });
			}
		}
	}

	/// Switches a value on; decorations follow on the next sync.
	pub fn enable_type(&mut self, category: &str, value: &str) {
		if let Some(manager) = self.managers.get_mut(category) {
			manager.enable(value);
		}
	}

	/// Switches a value off; decorations and the host filter follow on the
	/// next sync.
	pub fn disable_type(&mut self, category: &str, value: &str) {
		if let Some(manager) = self.managers.get_mut(category) {
			manager.disable(value);
		}
	}

	/// User colour for one value.
	pub fn set_color(&mut self, category: &str, value: &str, color: Color) {
		if let Some(manager) = self.managers.get_mut(category) {
			manager.set_color(value, color);
		}
	}

	/// Changes a category's palette and keeps it in the settings.
	pub fn set_palette(&mut self, category: &str, palette: Palette) {
		if let Some(settings) = self.settings.categories.get_mut(category) {
			settings.palette = palette.clone();
		}
		if let Some(manager) = self.managers.get_mut(category) {
			manager.set_palette(palette);
		}
	}

	/// Hides or shows one membership on one element only.
	pub fn toggle_element_type(
		&mut self,
		host: &mut dyn Host,
		id: &LogicalId,
		category: &str,
		value: &str,
		enabled: bool,
	) -> bool {
		let frame = host.frame();
		let manager_active = self
			.managers
			.get(category)
			.is_some_and(|m| m.is_active(value));
		if let Some(element) = self.nodes.get_mut(id) {
			toggle_channel(element, frame.scene, category, value, enabled, manager_active);
			return true;
		}
		if let Some(element) = self.links.get_mut(id) {
			toggle_channel(element, frame.scene, category, value, enabled, manager_active);
			return true;
		}
		false
	}

	/// Turns the arrow of `id` around without touching the host's own writes.
	pub fn set_link_inverted(&mut self, id: &LogicalId, inverted: bool) -> bool {
		match self.links.get(id) {
			Some(element) => {
				element.set_direction_inverted(inverted);
				true
			}
			None => false,
		}
	}

	/// Rebuilds every decoration to match new feature flags.
	pub fn set_features(&mut self, host: &mut dyn Host, features: Features) {
		self.settings.features = features;
		let frame = host.frame();
		if !self.settings.features.outlines {
			self.outlines.clear(frame.scene);
		}
		let ctx = DecorationContext {
			managers: &self.managers,
			features: &self.settings.features,
			background: self.theme.background(),
		};
		rebuild_all(&mut self.nodes, frame.scene, &ctx);
		rebuild_all(&mut self.links, frame.scene, &ctx);
		self.refresh_forced_colors();
	}

	/// Repaints backdrops and drops outlines, which the next sync redraws.
	pub fn on_theme_change(&mut self, host: &mut dyn Host, theme: Theme) {
		if theme == self.theme {
			return;
		}
		self.theme = theme;
		let frame = host.frame();
		if self.settings.features.opacity_layer {
			let background = theme.background();
			for element in self.nodes.iter_mut() {
				element.set_background(frame.scene, background);
			}
			for element in self.links.iter_mut() {
				element.set_background(frame.scene, background);
			}
		}
		self.outlines.clear(frame.scene);
		debug!("theme changed to {theme:?}");
	}

	/// Bands every active element and opens the window on the first level.
	pub fn enable_layers(&mut self, host: &mut dyn Host, meta: &dyn MetadataSource) {
		self.settings.layers.enabled = true;
		let frame = host.frame();
		self.layers.enable(frame.scene, frame.stage);
		self.relayer(frame.scene, frame.stage, meta);
		if self.layers.current_level().is_none() {
			let first = self.layers.groups().find_map(|g| g.level());
			if let Some(level) = first {
				self.layers.set_current_level(frame.scene, level);
			}
		}
	}

	/// Hands every graphic back to the host's stage.
	pub fn disable_layers(&mut self, host: &mut dyn Host) {
		self.settings.layers.enabled = false;
		let frame = host.frame();
		self.layers.disable(frame.scene);
	}

	/// Number of bands visible at once; never below one.
	pub fn set_layer_window(&mut self, host: &mut dyn Host, window_size: usize) {
		self.settings.layers.window_size = window_size.max(1);
		let frame = host.frame();
		self.layers
			.update_settings(frame.scene, self.settings.layers.clone());
	}

	#[allow(missing_docs)]
	pub fn set_current_level(&mut self, host: &mut dyn Host, level: i32) {
		let frame = host.frame();
		self.layers.set_current_level(frame.scene, level);
	}

	/// Next band; `None` at the last one.
	pub fn level_up(&mut self, host: &mut dyn Host) -> Option<i32> {
		let frame = host.frame();
		self.layers.level_up(frame.scene)
	}

	/// Previous band; `None` at the first one.
	pub fn level_down(&mut self, host: &mut dyn Host) -> Option<i32> {
		let frame = host.frame();
		self.layers.level_down(frame.scene)
	}

	/// Opacity of the band holding `id`.
	pub fn layer_opacity(&self, id: &LogicalId) -> Option<f64> {
		self.layers.layer_opacity(id)
	}

	/// Fixes a node in place. The worker picks it up on its own schedule.
	pub fn pin(&mut self, host: &mut dyn Host, id: &str, x: f64, y: f64) {
		self.pins.insert(id.to_owned(), Point { x, y });
		host.post(WorkerMessage::pin(id, x, y));
	}

	/// False when `id` was not pinned.
	pub fn unpin(&mut self, host: &mut dyn Host, id: &str) -> bool {
		if self.pins.remove(id).is_none() {
			return false;
		}
		if self.last_dragged.as_deref() == Some(id) {
			self.last_dragged = None;
		}
		host.post(WorkerMessage::unpin(id));
		true
	}

	/// Releases every pin and forgets the last drag.
	pub fn unpin_all(&mut self, host: &mut dyn Host) {
		for id in std::mem::take(&mut self.pins).into_keys() {
			host.post(WorkerMessage::unpin(&id));
		}
		self.last_dragged = None;
	}

	/// Remembers a drag for [`pin_last_dragged`](Self::pin_last_dragged).
	pub fn note_dragged(&mut self, id: &str) {
		self.last_dragged = Some(id.to_owned());
	}

	/// Pins the last dragged node where the host currently has it.
	pub fn pin_last_dragged(&mut self, host: &mut dyn Host) -> bool {
		let Some(id) = self.last_dragged.clone() else {
			return false;
		};
		let position = {
			let frame = host.frame();
			frame
				.live
				.nodes
				.iter()
				.find(|n| n.id == id)
				.map(|n| (n.x, n.y))
		};
		match position {
			Some((x, y)) => {
				self.pin(host, &id, x, y);
				true
			}
			None => false,
		}
	}

	/// Snapshots toggles, pins and the current level as a named view.
	pub fn save_view(&mut self, id: &str, name: &str, engine_options: EngineOptions) -> ViewState {
		let toggle_types = self
			.managers
			.iter()
			.map(|(key, manager)| {
				let mut deselected: Vec<String> = manager.deselected().map(str::to_owned).collect();
				deselected.sort();
				(key.clone(), deselected)
			})
			.collect();
		let view = ViewState {
			id: id.to_owned(),
			name: name.to_owned(),
			toggle_types,
			pin_nodes: self.pins.clone(),
			engine_options,
			current_layer_level: self.layers.current_level(),
		};
		self.settings.upsert_view(view.clone());
		self.notices.push(Notice::StateSaved {
			view: id.to_owned(),
		});
		view
	}

	/// A saved view by id.
	pub fn view(&self, id: &str) -> Option<&ViewState> {
		self.settings.views.iter().find(|v| v.id == id)
	}

	/// Restores toggles, pins and the layer window, then syncs.
	pub fn apply_view(&mut self, host: &mut dyn Host, meta: &dyn MetadataSource, view: &ViewState) -> SyncReport {
		for (key, manager) in &mut self.managers {
			let deselected = view.toggle_types.get(key).into_iter().flatten();
			manager.set_deselected(deselected.map(String::as_str));
		}
		self.unpin_all(host);
		for (id, point) in &view.pin_nodes {
			self.pin(host, id, point.x, point.y);
		}
		if let Some(level) = view.current_layer_level {
			self.set_current_level(host, level);
		}
		debug!("applied view `{}`", view.name);
		self.sync(host, meta)
	}

	/// Releases everything this instance added to the host's scene.
	pub fn teardown(mut self, host: &mut dyn Host) {
		let frame = host.frame();
		self.layers.disable(frame.scene);
		self.outlines.clear(frame.scene);
		self.nodes.clear(frame.scene);
		self.links.clear(frame.scene);
		if !self.filter.is_empty() {
			host.apply_filter(&HostFilter::default());
		}
	}
}

fn recolor<C: Decoratable>(set: &mut ElementSet<C>, scene: &mut Scene, category: &str, value: &str, color: Color) {
	for element in set.members_mut(category, value) {
		element.recolor(scene, category, value, color);
	}
}

fn refresh_channel<C: Decoratable>(
	set: &mut ElementSet<C>,
	scene: &mut Scene,
	category: &str,
	value: &str,
	active: bool,
) {
	for element in set.members_mut(category, value) {
		element.refresh_channel(scene, category, value, active);
	}
}

/// Filters elements whose every membership in some category is off, and
/// lets the others back in.
fn refresh_filters<C: Decoratable>(
	set: &mut ElementSet<C>,
	scene: &mut Scene,
	live: LiveCollections<'_>,
	ctx: &DecorationContext<'_>,
) {
	for element in set.iter_mut() {
		let disabled = element.is_any_manager_disabled(ctx.managers);
		if disabled == element.is_filtered() {
			continue;
		}
		element.mark_filtered(scene, disabled);
		if !disabled {
			if let Err(err) = element.enable(scene, live, ctx) {
				warn!("{}: could not re-enable: {err}", element.id());
			}
		}
	}
}

fn rebuild_all<C: Decoratable>(set: &mut ElementSet<C>, scene: &mut Scene, ctx: &DecorationContext<'_>) {
	for element in set.iter_mut() {
		if let Err(err) = element.rebuild_decoration(scene, ctx) {
			warn!("{}: decoration rebuild failed: {err}", element.id());
		}
	}
}

fn toggle_channel<C: Decoratable>(
	element: &mut super::element::ExtendedElement<C>,
	scene: &mut Scene,
	category: &str,
	value: &str,
	enabled: bool,
	manager_active: bool,
) {
	if enabled {
		element.enable_type(scene, category, value, manager_active);
	} else {
		element.disable_type(scene, category, value);
	}
}

#[cfg(test)]
mod tests {
	use rstest::{fixture, rstest};

	use super::*;
	use crate::overlay::host::{MemoryHost, NodeKind};
	use crate::overlay::metadata::InMemoryVault;

	struct Graph {
		host: MemoryHost,
		vault: InMemoryVault,
		instance: GraphInstance,
	}

	impl Graph {
		fn sync(&mut self) -> SyncReport {
			self.instance.sync(&mut self.host, &self.vault)
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

	#[rstest]
	fn disabling_a_whole_membership_filters_the_node(mut graph: Graph) {
		graph.instance.disable_type("tag", "x");
		graph.sync();
		let a = LogicalId::node("a.md");
		assert!(graph.instance.nodes().get(&a).expect("a").is_filtered());
		assert!(graph.host.is_hidden("a.md"));
		assert!(graph.host.link("a.md", "b.md").is_none());
		let b = graph.instance.nodes().get(&LogicalId::node("b.md")).expect("b");
		assert!(b.is_active());
		let arc = b.decoration().and_then(|d| d.channel("tag", "x")).expect("arc");
		assert!(!graph.host.scene().get(arc).expect("arc").visible);

		graph.instance.enable_type("tag", "x");
		let report = graph.sync();
		assert!(report.reactivated.contains(&a));
		assert!(graph.instance.nodes().get(&a).expect("a").is_active());
		assert!(graph.host.link("a.md", "b.md").is_some());
		assert!(graph.instance.links().get(&LogicalId::link("a.md", "b.md")).expect("link").is_active());
	}

	#[rstest]
	fn forced_node_colour_rewrites_host_tint(mut graph: Graph) {
		let mut features = graph.instance.settings().features.clone();
		features.force_node_color = Some("tag".to_owned());
		graph.instance.set_features(&mut graph.host, features);
		graph.sync();
		graph.host.tick();

		let x = graph.instance.manager("tag").expect("tags").color("x");
		let circle = graph.host.node("a.md").expect("a").circle;
		assert_eq!(graph.host.scene().get(circle).expect("circle").tint, x);
	}

	#[rstest]
	fn inverted_link_arrow_points_back(mut graph: Graph) {
		graph.host.tick();
		let arrow = graph.host.link("a.md", "b.md").and_then(|l| l.arrow).expect("arrow");
		let before = graph.host.scene().get(arrow).expect("arrow").rotation;

		assert!(graph.instance.set_link_inverted(&LogicalId::link("a.md", "b.md"), true));
		graph.host.tick();
		let after = graph.host.scene().get(arrow).expect("arrow").rotation;
		assert!((after - before - std::f64::consts::PI).abs() < 1e-9);
	}

	#[rstest]
	fn pins_post_to_the_worker_and_track_the_last_drag(mut graph: Graph) {
		graph.instance.note_dragged("b.md");
		assert!(graph.instance.pin_last_dragged(&mut graph.host));
		graph.instance.pin(&mut graph.host, "c.md", 4.0, 2.0);
		assert_eq!(graph.host.inbox.len(), 2);

		graph.instance.unpin_all(&mut graph.host);
		assert!(graph.instance.pins().is_empty());
		assert_eq!(graph.instance.last_dragged(), None);
		let unpins = graph.host.inbox[2..]
			.iter()
			.filter(|m| m.force_node.as_ref().is_some_and(|f| f.x.is_none()))
			.count();
		assert_eq!(unpins, 2);
	}

	#[rstest]
	fn saved_view_round_trips_through_apply(mut graph: Graph) {
		graph.instance.disable_type("tag", "y");
		graph.instance.pin(&mut graph.host, "a.md", 1.0, 1.0);
		let view = graph.instance.save_view("v1", "Only x", EngineOptions::new());
		assert_eq!(view.toggle_types["tag"], vec!["y".to_owned()]);
		assert_eq!(
			graph.instance.take_notices(),
			vec![Notice::StateSaved {
				view: "v1".to_owned()
			}]
		);

		graph.instance.enable_type("tag", "y");
		graph.instance.unpin_all(&mut graph.host);
		graph.sync();

		let saved = graph.instance.view("v1").cloned().expect("saved");
		graph.instance.apply_view(&mut graph.host, &graph.vault, &saved);
		assert!(!graph.instance.manager("tag").expect("tags").is_active("y"));
		assert_eq!(graph.instance.pins().len(), 1);
		assert!(graph.host.is_hidden("c.md"));
	}

	#[test]
	fn teardown_leaves_only_host_objects() {
		let mut host = MemoryHost::new();
		for id in ["a.md", "b.md"] {
			host.add_node(id, NodeKind::File);
		}
		host.add_link("a.md", "b.md", true);
		let bare = host.scene().len();
		let vault = InMemoryVault::new().with_tags("a.md", &["x"]).with_tags("b.md", &["y"]);

		let mut instance = GraphInstance::new(OverlaySettings::default());
		instance.on_graph_ready(&mut host, &vault);
		instance.disable_type("tag", "x");
		instance.sync(&mut host, &vault);
		assert!(host.is_hidden("a.md"));

		instance.teardown(&mut host);
		assert!(!host.is_hidden("a.md"));
		assert_eq!(host.links().len(), 1);
		assert_eq!(host.scene().len(), bare);
		assert!(host.scene().interceptors().is_empty());
	}

	#[rstest]
	fn values_nobody_carries_are_pruned(mut graph: Graph) {
		graph.vault.file_mut("b.md").tags = vec!["x".to_owned()];
		graph.vault.file_mut("c.md").tags = vec!["z".to_owned()];
		let report = graph.sync();
		let c = LogicalId::node("c.md");
		assert!(report.retyped.contains(&c));

		let tags = graph.instance.manager("tag").expect("tags");
		assert!(!tags.contains("y"));
		assert!(tags.contains("z"));
		let decoration = graph.instance.nodes().get(&c).and_then(|e| e.decoration()).expect("decoration");
		assert!(decoration.channel("tag", "z").is_some());
		assert!(decoration.channel("tag", "y").is_none());
		assert!(graph.sync().retyped.is_empty());
	}

	#[rstest]
	fn theme_change_repaints_backgrounds(mut graph: Graph) {
		let mut features = graph.instance.settings().features.clone();
		features.opacity_layer = true;
		graph.instance.set_features(&mut graph.host, features);
		let b = LogicalId::node("b.md");
		let tint = |graph: &Graph| {
			let disc = graph
				.instance
				.nodes()
				.get(&b)
				.and_then(|e| e.decoration())
				.and_then(|d| d.background())
				.expect("background");
			graph.host.scene().get(disc).expect("disc").tint
		};
		assert_eq!(tint(&graph), Theme::Light.background());

		graph.instance.on_theme_change(&mut graph.host, Theme::Dark);
		assert_eq!(tint(&graph), Theme::Dark.background());
	}

	#[rstest]
	fn new_palette_recolours_existing_arcs(mut graph: Graph) {
		let b = LogicalId::node("b.md");
		let arc = graph
			.instance
			.nodes()
			.get(&b)
			.and_then(|e| e.decoration())
			.and_then(|d| d.channel("tag", "y"))
			.expect("arc");
		let before = graph.host.scene().get(arc).expect("arc").tint;

		graph.instance.set_palette("tag", Palette::Grayscale);
		graph.sync();
		let after = graph.host.scene().get(arc).expect("arc").tint;
		assert_ne!(after, before);
		assert_eq!(after, graph.instance.manager("tag").expect("tags").color("y"));
	}

	#[test]
	fn host_teardown_gets_fresh_layer_bands() {
		let mut host = MemoryHost::new();
		for id in ["a.md", "b.md"] {
			host.add_node(id, NodeKind::File);
		}
		host.add_link("a.md", "b.md", true);
		let vault = InMemoryVault::new()
			.with_property("a.md", "layer", &["0_Inbox"])
			.with_property("b.md", "layer", &["1_Notes"]);
		let mut settings = OverlaySettings::default();
		settings.layers.enabled = true;
		let mut instance = GraphInstance::new(settings);
		instance.on_graph_ready(&mut host, &vault);
		assert_eq!(instance.layers().groups().count(), 2);

		host.teardown();
		instance.sync(&mut host, &vault);
		let stage = host.stage();
		assert!(!instance.layers().needs_rebuild(host.scene(), stage));
		for group in instance.layers().groups() {
			let root = group.container().expect("band");
			assert_eq!(host.scene().parent(root), Some(stage));
		}
		let band = instance.layers().groups().next().and_then(|g| g.container()).expect("band");
		let circle = host.node("a.md").expect("a").circle;
		assert!(host.scene().is_descendant_of(circle, band));
	}

	#[rstest]
	fn image_failures_surface_one_notice(mut graph: Graph) {
		let mut features = graph.instance.settings().features.clone();
		features.images = true;
		graph.instance.set_features(&mut graph.host, features);
		graph.vault.file_mut("a.md").image = Some("missing.png".to_owned());
		graph.sync();

		graph
			.instance
			.loader_mut()
			.complete("missing.png", Err("404".to_owned()));
		graph.sync();
		graph.sync();
		let notices = graph.instance.take_notices();
		assert_eq!(
			notices,
			vec![Notice::AssetUnavailable {
				id: LogicalId::node("a.md"),
				reason: "404".to_owned()
			}]
		);
	}
}
