use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use slotmap::SecondaryMap;

use crate::overlay::{
	Color, CoreHandle, CoreLink, CoreNode, GraphicsId, GraphicsKind, Host, HostFilter, HostFrame,
	LiveCollections, NodeKind, Property, PropertyValue, Scene, WorkerMessage,
};

use super::types::GraphData;

pub const NODE_RADIUS: f64 = 5.0;
pub const HIT_RADIUS: f64 = 12.0;
/// Screen-space slack around the viewport before a node is culled.
const CULL_MARGIN: f64 = 80.0;

#[derive(Clone, Debug, Default)]
pub struct NodeInfo {
	pub id: String,
	pub label: Option<String>,
	pub kind: NodeKind,
}

/// What a host-owned graphics object draws.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostGraphic {
	Circle(String),
	Label(String),
	Line(String, String),
	Arrow(String, String),
}

#[derive(Clone, Debug, Default)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub node_idx: Option<DefaultNodeIdx>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f32,
	pub node_start_y: f32,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<DefaultNodeIdx>,
	pub neighbors: HashSet<DefaultNodeIdx>,
	pub highlight_t: f64,
	pub prev_node: Option<DefaultNodeIdx>,
	pub prev_neighbors: HashSet<DefaultNodeIdx>,
	delay_t: f64,
}

/// Physics simulation plus the culled set of core elements it exposes.
///
/// Only nodes inside the viewport (and not filtered) have core elements.
/// A node scrolling back into view gets brand new graphics and a new handle.
pub struct ForceGraphState {
	pub graph: ForceGraph<NodeInfo, ()>,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub hover: HoverState,
	pub width: f64,
	pub height: f64,
	pub animation_running: bool,
	pub flow_time: f64,
	pub node_color: Color,
	pub link_color: Color,
	edges: Vec<(DefaultNodeIdx, DefaultNodeIdx)>,
	edge_ids: Vec<(String, String)>,
	order: Vec<String>,
	info: HashMap<String, NodeInfo>,
	index_of: HashMap<String, DefaultNodeIdx>,
	id_of: HashMap<DefaultNodeIdx, String>,
	positions: HashMap<String, (f64, f64)>,
	scene: Scene,
	stage: GraphicsId,
	live_nodes: Vec<CoreNode>,
	live_links: Vec<CoreLink>,
	graphics: SecondaryMap<GraphicsId, HostGraphic>,
	filter: HostFilter,
	inbox: Vec<WorkerMessage>,
	next_handle: u64,
}

impl ForceGraphState {
	pub fn new(data: &GraphData, width: f64, height: f64) -> Self {
		let mut graph = ForceGraph::new(SimulationParameters {
			force_charge: 150.0,
			force_spring: 0.05,
			force_max: 100.0,
			node_speed: 3000.0,
			damping_factor: 0.9,
		});
		let mut index_of = HashMap::new();
		let mut id_of = HashMap::new();
		let mut info = HashMap::new();
		let mut order = Vec::new();
		let mut edges = Vec::new();
		let mut edge_ids = Vec::new();

		for (i, node) in data.nodes.iter().enumerate() {
			let angle = (i as f64) * 2.0 * PI / data.nodes.len() as f64;
			let (x, y) = ((100.0 * angle.cos()) as f32, (100.0 * angle.sin()) as f32);
			let user_data = NodeInfo {
				id: node.id.clone(),
				label: node.label.clone(),
				kind: node.kind,
			};
			let idx = graph.add_node(NodeData {
				x,
				y,
				mass: 10.0,
				is_anchor: false,
				user_data: user_data.clone(),
			});
			index_of.insert(node.id.clone(), idx);
			id_of.insert(idx, node.id.clone());
			info.insert(node.id.clone(), user_data);
			order.push(node.id.clone());
		}

		for link in &data.links {
			if let (Some(&src), Some(&tgt)) = (index_of.get(&link.source), index_of.get(&link.target)) {
				graph.add_edge(src, tgt, EdgeData::default());
				edges.push((src, tgt));
				edge_ids.push((link.source.clone(), link.target.clone()));
			}
		}

		let mut scene = Scene::new();
		let stage = scene.create(GraphicsKind::Container);
		let mut state = Self {
			graph,
			edges,
			edge_ids,
			order,
			info,
			index_of,
			id_of,
			positions: HashMap::new(),
			scene,
			stage,
			live_nodes: Vec::new(),
			live_links: Vec::new(),
			graphics: SecondaryMap::new(),
			filter: HostFilter::default(),
			inbox: Vec::new(),
			next_handle: 0,
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			width,
			height,
			animation_running: true,
			flow_time: 0.0,
			node_color: Color::rgb(100, 180, 255),
			link_color: Color::rgb(100, 180, 255),
		};
		state.refresh_positions();
		state.cull();
		state
	}

	pub fn scene(&self) -> &Scene {
		&self.scene
	}

	pub fn stage(&self) -> GraphicsId {
		self.stage
	}

	pub fn graphic(&self, id: GraphicsId) -> Option<&HostGraphic> {
		self.graphics.get(id)
	}

	pub fn position(&self, id: &str) -> Option<(f64, f64)> {
		self.positions.get(id).copied()
	}

	pub fn node_id(&self, idx: DefaultNodeIdx) -> Option<&str> {
		self.id_of.get(&idx).map(String::as_str)
	}

	pub fn index(&self, id: &str) -> Option<DefaultNodeIdx> {
		self.index_of.get(id).copied()
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	fn in_viewport(&self, x: f64, y: f64) -> bool {
		let (sx, sy) = (x * self.transform.k + self.transform.x, y * self.transform.k + self.transform.y);
		(-CULL_MARGIN..=self.width + CULL_MARGIN).contains(&sx)
			&& (-CULL_MARGIN..=self.height + CULL_MARGIN).contains(&sy)
	}

	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<DefaultNodeIdx> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let mut found = None;
		self.graph.visit_nodes(|node| {
			if self.filter.nodes.contains(&node.data.user_data.id) {
				return;
			}
			let (dx, dy) = (node.x() as f64 - gx, node.y() as f64 - gy);
			// HIT_RADIUS is in world-space, scales with zoom like nodes
			if (dx * dx + dy * dy).sqrt() < HIT_RADIUS {
				found = Some(node.index());
			}
		});
		found
	}

	pub fn set_hover(&mut self, node: Option<DefaultNodeIdx>) {
		if self.hover.node == node {
			return;
		}
		let was_hovering = self.hover.node.is_some();

		// Keep the previous highlight around for the fade-out
		if was_hovering && node.is_none() {
			self.hover.prev_node = self.hover.node.take();
			self.hover.prev_neighbors = std::mem::take(&mut self.hover.neighbors);
		} else {
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}

		self.hover.node = node;
		self.hover.neighbors.clear();

		if let Some(idx) = node {
			if !was_hovering {
				self.hover.delay_t = 0.0;
			}
			for &(src, tgt) in &self.edges {
				if src == idx {
					self.hover.neighbors.insert(tgt);
				} else if tgt == idx {
					self.hover.neighbors.insert(src);
				}
			}
		}
	}

	pub fn is_highlighted(&self, idx: DefaultNodeIdx) -> bool {
		self.hover.node == Some(idx)
			|| self.hover.neighbors.contains(&idx)
			|| self.hover.prev_node == Some(idx)
			|| self.hover.prev_neighbors.contains(&idx)
	}

	pub fn is_hovered(&self, idx: DefaultNodeIdx) -> bool {
		self.hover.node == Some(idx) || self.hover.prev_node == Some(idx)
	}

	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some() || self.hover.prev_node.is_some()
	}

	fn next_handle(&mut self) -> CoreHandle {
		self.next_handle += 1;
		CoreHandle(self.next_handle)
	}

	fn refresh_positions(&mut self) {
		let positions = &mut self.positions;
		self.graph.visit_nodes(|node| {
			positions.insert(
				node.data.user_data.id.clone(),
				(node.x() as f64, node.y() as f64),
			);
		});
	}

	/// Applies posted worker messages: a position pins, no position releases.
	fn drain_inbox(&mut self) {
		for message in std::mem::take(&mut self.inbox) {
			if message.run {
				self.animation_running = true;
			}
			let Some(force) = message.force_node else {
				continue;
			};
			let Some(&idx) = self.index_of.get(&force.id) else {
				continue;
			};
			let pinned = force.x.zip(force.y);
			self.graph.visit_nodes_mut(|node| {
				if node.index() != idx {
					return;
				}
				match pinned {
					Some((x, y)) => {
						node.data.x = x as f32;
						node.data.y = y as f32;
						node.data.is_anchor = true;
					}
					None => node.data.is_anchor = false,
				}
			});
		}
	}

	fn spawn_node(&mut self, id: &str) -> Option<CoreNode> {
		let info = self.info.get(id)?.clone();
		let (x, y) = self.position(id)?;
		let circle = self.scene.create(GraphicsKind::Circle);
		let text = self.scene.create(GraphicsKind::Text);
		if let Some(t) = self.scene.get_mut(text) {
			t.text = Some(info.label.unwrap_or_else(|| id.to_owned()));
		}
		let _ = self.scene.add_child(self.stage, circle);
		let _ = self.scene.add_child(self.stage, text);
		self.graphics.insert(circle, HostGraphic::Circle(id.to_owned()));
		self.graphics.insert(text, HostGraphic::Label(id.to_owned()));
		Some(CoreNode {
			handle: self.next_handle(),
			id: id.to_owned(),
			kind: info.kind,
			circle,
			text: Some(text),
			x,
			y,
		})
	}

	fn spawn_link(&mut self, source: &str, target: &str) -> CoreLink {
		let line = self.scene.create(GraphicsKind::Line);
		let arrow = self.scene.create(GraphicsKind::Arrow);
		let _ = self.scene.add_child(self.stage, line);
		let _ = self.scene.add_child(self.stage, arrow);
		self.graphics
			.insert(line, HostGraphic::Line(source.to_owned(), target.to_owned()));
		self.graphics
			.insert(arrow, HostGraphic::Arrow(source.to_owned(), target.to_owned()));
		CoreLink {
			handle: self.next_handle(),
			source: source.to_owned(),
			target: target.to_owned(),
			line,
			arrow: Some(arrow),
		}
	}

	fn destroy(&mut self, ids: impl IntoIterator<Item = GraphicsId>) {
		for id in ids {
			self.graphics.remove(id);
			self.scene.destroy(id);
		}
	}

	/// Destroys core elements that left the viewport or got filtered and
	/// creates fresh ones for those that came back.
	fn cull(&mut self) {
		let wanted: HashSet<String> = self
			.positions
			.iter()
			.filter(|(id, (x, y))| !self.filter.nodes.contains(*id) && self.in_viewport(*x, *y))
			.map(|(id, _)| id.clone())
			.collect();

		let (keep, gone): (Vec<_>, Vec<_>) = std::mem::take(&mut self.live_nodes)
			.into_iter()
			.partition(|n| wanted.contains(&n.id));
		self.live_nodes = keep;
		for node in gone {
			self.destroy(std::iter::once(node.circle).chain(node.text));
		}
		let present: HashSet<String> = self.live_nodes.iter().map(|n| n.id.clone()).collect();
		for id in self.order.clone() {
			if wanted.contains(&id) && !present.contains(&id) {
				if let Some(node) = self.spawn_node(&id) {
					self.live_nodes.push(node);
				}
			}
		}

		let (keep, gone): (Vec<_>, Vec<_>) = std::mem::take(&mut self.live_links)
			.into_iter()
			.partition(|l| wanted.contains(&l.source) && wanted.contains(&l.target) && !self.filter.hides_link(l));
		self.live_links = keep;
		for link in gone {
			self.destroy(std::iter::once(link.line).chain(link.arrow));
		}
		let present: HashSet<(String, String)> = self
			.live_links
			.iter()
			.map(|l| (l.source.clone(), l.target.clone()))
			.collect();
		for (source, target) in self.edge_ids.clone() {
			if !wanted.contains(&source) || !wanted.contains(&target) {
				continue;
			}
			if present.contains(&(source.clone(), target.clone())) {
				continue;
			}
			let link = self.spawn_link(&source, &target);
			if self.filter.hides_link(&link) {
				self.destroy(std::iter::once(link.line).chain(link.arrow));
				continue;
			}
			self.live_links.push(link);
		}
	}

	/// The host restates its own defaults every frame; overrides may rewrite them.
	fn write_defaults(&mut self) {
		for node in &mut self.live_nodes {
			if let Some(&(x, y)) = self.positions.get(&node.id) {
				node.x = x;
				node.y = y;
			}
			if let Some(obj) = self.scene.get_mut(node.circle) {
				obj.x = node.x;
				obj.y = node.y;
			}
			self.scene
				.write(node.circle, Property::Tint, PropertyValue::Color(self.node_color));
			self.scene
				.write(node.circle, Property::Alpha, PropertyValue::Number(1.0));
		}
		for link in &self.live_links {
			let angle = match (self.positions.get(&link.source), self.positions.get(&link.target)) {
				(Some((x1, y1)), Some((x2, y2))) => (y2 - y1).atan2(x2 - x1),
				_ => 0.0,
			};
			self.scene
				.write(link.line, Property::Tint, PropertyValue::Color(self.link_color));
			if let Some(arrow) = link.arrow {
				self.scene
					.write(arrow, Property::Rotation, PropertyValue::Number(angle));
				self.scene
					.write(arrow, Property::Visible, PropertyValue::Flag(true));
			}
		}
	}

	pub fn tick(&mut self, dt: f32) {
		self.drain_inbox();
		if self.animation_running {
			self.graph.update(dt);
		}
		self.flow_time += dt as f64;
		self.refresh_positions();
		self.cull();
		self.write_defaults();

		let (target, delay, speed) = if self.hover.node.is_some() {
			(1.0, 0.08, 1.8)
		} else {
			(0.0, 0.0, 1.26)
		};

		if self.hover.node.is_some() {
			self.hover.delay_t = (self.hover.delay_t + dt as f64).min(delay);
			if self.hover.delay_t >= delay {
				self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt as f64;
			}
		} else {
			self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt as f64;
			if self.hover.highlight_t < 0.01 {
				self.hover.highlight_t = 0.0;
				self.hover.prev_node = None;
				self.hover.prev_neighbors.clear();
			}
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

impl Host for ForceGraphState {
	fn frame(&mut self) -> HostFrame<'_> {
		HostFrame {
			live: LiveCollections {
				nodes: &self.live_nodes,
				links: &self.live_links,
			},
			scene: &mut self.scene,
			stage: self.stage,
		}
	}

	fn post(&mut self, message: WorkerMessage) {
		self.inbox.push(message);
	}

	fn apply_filter(&mut self, filter: &HostFilter) {
		self.filter = filter.clone();
		self.cull();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::force_graph::types::{GraphLink, GraphNode};

	fn data() -> GraphData {
		let node = |id: &str| GraphNode {
			id: id.to_owned(),
			label: None,
			kind: NodeKind::File,
		};
		GraphData {
			nodes: vec![node("a.md"), node("b.md")],
			links: vec![GraphLink {
				source: "a.md".to_owned(),
				target: "b.md".to_owned(),
			}],
		}
	}

	#[test]
	fn panning_away_culls_and_panning_back_recreates() {
		let mut state = ForceGraphState::new(&data(), 800.0, 600.0);
		let first = state.frame().live.nodes[0].handle;
		assert_eq!(state.frame().live.links.len(), 1);

		state.transform.x += 10_000.0;
		state.tick(0.0);
		assert!(state.frame().live.nodes.is_empty());
		assert!(state.frame().live.links.is_empty());

		state.transform.x -= 10_000.0;
		state.tick(0.0);
		let frame = state.frame();
		assert_eq!(frame.live.nodes.len(), 2);
		assert!(frame.live.nodes.iter().all(|n| n.handle != first));
	}

	#[test]
	fn pin_message_anchors_the_node() {
		let mut state = ForceGraphState::new(&data(), 800.0, 600.0);
		state.post(WorkerMessage::pin("a.md", 12.0, -3.0));
		state.tick(0.0);
		assert_eq!(state.position("a.md"), Some((12.0, -3.0)));
	}
}
