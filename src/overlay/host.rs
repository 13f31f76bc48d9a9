//! What the overlay sees of the renderer it decorates.
//!
//! Core elements are owned by the host and may be replaced at any time. The
//! overlay never keeps one as a source of truth: it remembers the handle it
//! last bound to and re-finds the live object by identity on every sync.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::color::Color;
use super::identity::LogicalId;
use super::intercept::{Property, PropertyValue};
use super::scene::{GraphicsId, GraphicsKind, Scene};

/// Generation stamp of one host object; a recreated element gets a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoreHandle(pub u64);

/// What a node stands for in the vault.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
	/// A note.
	#[default]
	File,
	/// A tag shown as its own node.
	Tag,
	/// A non-note file.
	Attachment,
	/// A link target that does not exist yet.
	Unresolved,
}

/// The host's current object for one node.
#[derive(Clone, Debug)]
pub struct CoreNode {
	/// Changes whenever the host recreates the node.
	pub handle: CoreHandle,
	/// Vault path.
	pub id: String,
	/// What the node stands for.
	pub kind: NodeKind,
	/// Disc the node is drawn with.
	pub circle: GraphicsId,
	/// Label, when the host draws one.
	pub text: Option<GraphicsId>,
	/// Simulation position.
	pub x: f64,
	/// Simulation position.
	pub y: f64,
}

/// The host's current object for one link.
#[derive(Clone, Debug)]
pub struct CoreLink {
	/// Changes whenever the host recreates the link.
	pub handle: CoreHandle,
	/// Path of the linking note.
	pub source: String,
	/// Path of the linked note.
	pub target: String,
	/// Stroke between the endpoints.
	pub line: GraphicsId,
	/// Arrow head, on directed graphs.
	pub arrow: Option<GraphicsId>,
}

/// Borrowed views of the host's live arrays.
#[derive(Clone, Copy, Debug)]
pub struct LiveCollections<'a> {
	/// Drawn nodes.
	pub nodes: &'a [CoreNode],
	/// Drawn links.
	pub links: &'a [CoreLink],
}

/// One tick's view of the host: live arrays plus the graphics tree.
pub struct HostFrame<'a> {
	/// Objects the host currently draws.
	pub live: LiveCollections<'a>,
	/// Everything drawn, host and overlay alike.
	pub scene: &'a mut Scene,
	/// The host's single shared container.
	pub stage: GraphicsId,
}

/// Shared view of [`CoreNode`] and [`CoreLink`].
pub trait CoreElement: Sized {
	/// Generation of this object.
	fn handle(&self) -> CoreHandle;
	/// Key the overlay follows it by.
	fn identity(&self) -> LogicalId;
	/// The graphics object decorations hang off.
	fn graphics(&self) -> GraphicsId;
	/// The live array this kind lives in.
	fn collection<'a>(live: LiveCollections<'a>) -> &'a [Self];

	/// The live object for `id`, if the host draws one.
	fn find<'a>(live: LiveCollections<'a>, id: &LogicalId) -> Option<&'a Self> {
		Self::collection(live).iter().find(|c| c.identity() == *id)
	}
}

impl CoreElement for CoreNode {
	fn handle(&self) -> CoreHandle {
		self.handle
	}

	fn identity(&self) -> LogicalId {
		LogicalId::node(self.id.as_str())
	}

	fn graphics(&self) -> GraphicsId {
		self.circle
	}

	fn collection<'a>(live: LiveCollections<'a>) -> &'a [Self] {
		live.nodes
	}

	fn find<'a>(live: LiveCollections<'a>, id: &LogicalId) -> Option<&'a Self> {
		live.nodes.iter().find(|n| n.id == id.as_str())
	}
}

impl CoreElement for CoreLink {
	fn handle(&self) -> CoreHandle {
		self.handle
	}

	fn identity(&self) -> LogicalId {
		LogicalId::link(&self.source, &self.target)
	}

	fn graphics(&self) -> GraphicsId {
		self.line
	}

	fn collection<'a>(live: LiveCollections<'a>) -> &'a [Self] {
		live.links
	}

	fn find<'a>(live: LiveCollections<'a>, id: &LogicalId) -> Option<&'a Self> {
		let (source, target) = id.link_endpoints().ok()?;
		live.links
			.iter()
			.find(|l| l.source == source && l.target == target)
	}
}

/// Fixed position for one node; both coordinates unset releases it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ForceNode {
	pub id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub x: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub y: Option<f64>,
}

/// Fire-and-forget message for the host's physics worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerMessage {
	/// Simulation heat to restart with.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub alpha: Option<f64>,
	/// Heat the simulation cools towards.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub alpha_target: Option<f64>,
	/// Keep the simulation running.
	pub run: bool,
	/// Node to pin or release.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub force_node: Option<ForceNode>,
}

impl WorkerMessage {
	/// Fixes `id` at (`x`, `y`) and reheats the simulation.
	pub fn pin(id: &str, x: f64, y: f64) -> Self {
		Self {
			alpha: Some(0.3),
			alpha_target: Some(0.0),
			run: true,
			force_node: Some(ForceNode {
				id: id.to_owned(),
				x: Some(x),
				y: Some(y),
			}),
		}
	}

	/// Releases `id`.
	pub fn unpin(id: &str) -> Self {
		Self {
			alpha: Some(0.3),
			alpha_target: Some(0.0),
			run: true,
			force_node: Some(ForceNode {
				id: id.to_owned(),
				x: None,
				y: None,
			}),
		}
	}
}

/// Elements the host should stop drawing because a category switched them off.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostFilter {
	/// Node paths.
	pub nodes: BTreeSet<String>,
	/// Links hidden on their own account.
	pub links: BTreeSet<LogicalId>,
}

impl HostFilter {
	/// Hides nothing.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty() && self.links.is_empty()
	}

	/// A link is hidden with either endpoint.
	pub fn hides_link(&self, link: &CoreLink) -> bool {
		self.nodes.contains(&link.source)
			|| self.nodes.contains(&link.target)
			|| self.links.contains(&link.identity())
	}
}

/// The renderer being decorated.
pub trait Host {
	/// Borrows the live arrays and scene for one step.
	fn frame(&mut self) -> HostFrame<'_>;
	/// Never awaited; the worker converges on its own schedule.
	fn post(&mut self, message: WorkerMessage);
	/// Replaces the current filter. Unfiltered elements come back as new
	/// core objects.
	fn apply_filter(&mut self, filter: &HostFilter);
}

/// A host that keeps everything in memory and churns objects on request.
#[derive(Debug)]
pub struct MemoryHost {
	scene: Scene,
	stage: GraphicsId,
	nodes: Vec<CoreNode>,
	links: Vec<CoreLink>,
	next_handle: u64,
	hidden_nodes: Vec<CoreNode>,
	hidden_links: Vec<CoreLink>,
	/// Tint restated on every circle each tick.
	pub node_color: Color,
	/// Tint restated on every line each tick.
	pub link_color: Color,
	/// Everything posted, oldest first.
	pub inbox: Vec<WorkerMessage>,
}

impl Default for MemoryHost {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryHost {
	/// An empty stage.
	pub fn new() -> Self {
		let mut scene = Scene::new();
		let stage = scene.create(GraphicsKind::Container);
		Self {
			scene,
			stage,
			nodes: Vec::new(),
			links: Vec::new(),
			next_handle: 0,
			hidden_nodes: Vec::new(),
			hidden_links: Vec::new(),
			node_color: Color::rgb(200, 200, 200),
			link_color: Color::rgb(120, 120, 120),
			inbox: Vec::new(),
		}
	}

	/// Host and overlay graphics.
	pub fn scene(&self) -> &Scene {
		&self.scene
	}

	/// Mutable scene, for tests that tamper with graphics directly.
	pub fn scene_mut(&mut self) -> &mut Scene {
		&mut self.scene
	}

	/// Container every host object sits in.
	pub fn stage(&self) -> GraphicsId {
		self.stage
	}

	/// Nodes currently drawn.
	pub fn nodes(&self) -> &[CoreNode] {
		&self.nodes
	}

	/// Links currently drawn.
	pub fn links(&self) -> &[CoreLink] {
		&self.links
	}

	/// The drawn node at `id`.
	pub fn node(&self, id: &str) -> Option<&CoreNode> {
		self.nodes.iter().find(|n| n.id == id)
	}

	/// The drawn link from `source` to `target`.
	pub fn link(&self, source: &str, target: &str) -> Option<&CoreLink> {
		self.links
			.iter()
			.find(|l| l.source == source && l.target == target)
	}

	/// Held back by the current filter.
	pub fn is_hidden(&self, id: &str) -> bool {
		self.hidden_nodes.iter().any(|n| n.id == id)
	}

	fn next_handle(&mut self) -> CoreHandle {
		self.next_handle += 1;
		CoreHandle(self.next_handle)
	}

	fn spawn_node(&mut self, id: &str, kind: NodeKind, x: f64, y: f64) -> CoreNode {
		let circle = self.scene.create(GraphicsKind::Circle);
		let text = self.scene.create(GraphicsKind::Text);
		if let Some(t) = self.scene.get_mut(text) {
			t.text = Some(id.to_owned());
		}
		let _ = self.scene.add_child(self.stage, circle);
		let _ = self.scene.add_child(self.stage, text);
		CoreNode {
			handle: self.next_handle(),
			id: id.to_owned(),
			kind,
			circle,
			text: Some(text),
			x,
			y,
		}
	}

	fn spawn_link(&mut self, source: &str, target: &str, arrow: bool) -> CoreLink {
		let line = self.scene.create(GraphicsKind::Line);
		let _ = self.scene.add_child(self.stage, line);
		let arrow = arrow.then(|| {
			let a = self.scene.create(GraphicsKind::Arrow);
			let _ = self.scene.add_child(self.stage, a);
			a
		});
		CoreLink {
			handle: self.next_handle(),
			source: source.to_owned(),
			target: target.to_owned(),
			line,
			arrow,
		}
	}

	fn destroy_node_graphics(&mut self, node: &CoreNode) {
		self.scene.destroy(node.circle);
		if let Some(text) = node.text {
			self.scene.destroy(text);
		}
	}

	fn destroy_link_graphics(&mut self, link: &CoreLink) {
		self.scene.destroy(link.line);
		if let Some(arrow) = link.arrow {
			self.scene.destroy(arrow);
		}
	}

	/// Spawns a node; positions are spread along the x axis.
	pub fn add_node(&mut self, id: &str, kind: NodeKind) -> CoreHandle {
		let n = self.nodes.len() as f64;
		let node = self.spawn_node(id, kind, 10.0 * n, 0.0);
		let handle = node.handle;
		self.nodes.push(node);
		handle
	}

	/// Destroys the node's graphics; false when unknown.
	pub fn remove_node(&mut self, id: &str) -> bool {
		let Some(pos) = self.nodes.iter().position(|n| n.id == id) else {
			return false;
		};
		let node = self.nodes.remove(pos);
		self.destroy_node_graphics(&node);
		true
	}

	/// Destroys the node's graphics and replaces it with a fresh object.
	pub fn recreate_node(&mut self, id: &str) -> Option<CoreHandle> {
		let pos = self.nodes.iter().position(|n| n.id == id)?;
		let old = self.nodes[pos].clone();
		self.destroy_node_graphics(&old);
		let node = self.spawn_node(id, old.kind, old.x, old.y);
		let handle = node.handle;
		self.nodes[pos] = node;
		Some(handle)
	}

	/// Spawns a link, with an arrow head when `arrow`.
	pub fn add_link(&mut self, source: &str, target: &str, arrow: bool) -> CoreHandle {
		let link = self.spawn_link(source, target, arrow);
		let handle = link.handle;
		self.links.push(link);
		handle
	}

	/// Destroys the link's graphics; false when unknown.
	pub fn remove_link(&mut self, source: &str, target: &str) -> bool {
		let Some(pos) = self
			.links
			.iter()
			.position(|l| l.source == source && l.target == target)
		else {
			return false;
		};
		let link = self.links.remove(pos);
		self.destroy_link_graphics(&link);
		true
	}

	/// Link counterpart of [`recreate_node`](Self::recreate_node).
	pub fn recreate_link(&mut self, source: &str, target: &str) -> Option<CoreHandle> {
		let pos = self
			.links
			.iter()
			.position(|l| l.source == source && l.target == target)?;
		let old = self.links[pos].clone();
		self.destroy_link_graphics(&old);
		let link = self.spawn_link(source, target, old.arrow.is_some());
		let handle = link.handle;
		self.links[pos] = link;
		Some(handle)
	}

	/// Tears down the whole stage and rebuilds every core element.
	pub fn teardown(&mut self) {
		self.scene.destroy_tree(self.stage);
		self.stage = self.scene.create(GraphicsKind::Container);
		let nodes = std::mem::take(&mut self.nodes);
		for old in nodes {
			let node = self.spawn_node(&old.id, old.kind, old.x, old.y);
			self.nodes.push(node);
		}
		let links = std::mem::take(&mut self.links);
		for old in links {
			let link = self.spawn_link(&old.source, &old.target, old.arrow.is_some());
			self.links.push(link);
		}
	}

	/// One render tick: the host restates its own defaults on every object.
	pub fn tick(&mut self) {
		for msg in std::mem::take(&mut self.inbox) {
			let Some(force) = msg.force_node else {
				continue;
			};
			if let (Some(x), Some(y)) = (force.x, force.y) {
				if let Some(node) = self.nodes.iter_mut().find(|n| n.id == force.id) {
					node.x = x;
					node.y = y;
				}
			}
		}
		for node in &self.nodes {
			if let Some(obj) = self.scene.get_mut(node.circle) {
				obj.x = node.x;
				obj.y = node.y;
			}
			self.scene
				.write(node.circle, Property::Tint, PropertyValue::Color(self.node_color));
			self.scene
				.write(node.circle, Property::Alpha, PropertyValue::Number(1.0));
			if let Some(text) = node.text {
				self.scene
					.write(text, Property::Alpha, PropertyValue::Number(1.0));
			}
		}
		for link in &self.links {
			let angle = match (
				self.nodes.iter().find(|n| n.id == link.source),
				self.nodes.iter().find(|n| n.id == link.target),
			) {
				(Some(s), Some(t)) => (t.y - s.y).atan2(t.x - s.x),
				_ => 0.0,
			};
			self.scene
				.write(link.line, Property::Tint, PropertyValue::Color(self.link_color));
			self.scene
				.write(link.line, Property::Alpha, PropertyValue::Number(1.0));
			if let Some(arrow) = link.arrow {
				self.scene
					.write(arrow, Property::Rotation, PropertyValue::Number(angle));
				self.scene
					.write(arrow, Property::Visible, PropertyValue::Flag(true));
			}
		}
	}
}

impl Host for MemoryHost {
	fn frame(&mut self) -> HostFrame<'_> {
		HostFrame {
			live: LiveCollections {
				nodes: &self.nodes,
				links: &self.links,
			},
			scene: &mut self.scene,
			stage: self.stage,
		}
	}

	fn post(&mut self, message: WorkerMessage) {
		self.inbox.push(message);
	}

	fn apply_filter(&mut self, filter: &HostFilter) {
		let (hide, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.nodes)
			.into_iter()
			.partition(|n| filter.nodes.contains(&n.id));
		self.nodes = keep;
		for node in &hide {
			self.destroy_node_graphics(node);
		}
		self.hidden_nodes.extend(hide);

		let (hide, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.links)
			.into_iter()
			.partition(|l| filter.hides_link(l));
		self.links = keep;
		for link in &hide {
			self.destroy_link_graphics(link);
		}
		self.hidden_links.extend(hide);

		let (back, still): (Vec<_>, Vec<_>) = std::mem::take(&mut self.hidden_nodes)
			.into_iter()
			.partition(|n| !filter.nodes.contains(&n.id));
		self.hidden_nodes = still;
		for old in back {
			let node = self.spawn_node(&old.id, old.kind, old.x, old.y);
			self.nodes.push(node);
		}

		let (back, still): (Vec<_>, Vec<_>) = std::mem::take(&mut self.hidden_links)
			.into_iter()
			.partition(|l| !filter.hides_link(l));
		self.hidden_links = still;
		for old in back {
			let link = self.spawn_link(&old.source, &old.target, old.arrow.is_some());
			self.links.push(link);
		}
	}
}
