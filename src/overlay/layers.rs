//! Z-ordered visibility bands.
//!
//! Every tracked graphics object lives in one band container while layering
//! is on. Each band holds one sub-container per [`GraphicsRole`] so that,
//! inside a band, links always draw under circles and circles under names.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use super::identity::LogicalId;
use super::metadata::MetadataSource;
use super::scene::{GraphicsId, GraphicsKind, Scene};
use super::settings::{LayerOrder, LayerSettings};

const UNASSIGNED_LAYER: &str = "";

/// Which sub-container of a band a graphic goes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum GraphicsRole {
	Link,
	Arrow,
	LinkDecoration,
	LinkDecorationContainer,
	Circle,
	Name,
}

impl GraphicsRole {
	/// Draw order inside a band, and the order graphics go back to the host in.
	pub const ORDER: [GraphicsRole; 6] = [
		GraphicsRole::Link,
		GraphicsRole::Arrow,
		GraphicsRole::LinkDecoration,
		GraphicsRole::LinkDecorationContainer,
		GraphicsRole::Circle,
		GraphicsRole::Name,
	];

	fn slot(self) -> usize {
		self as usize
	}
}

/// Splits a `level_label` value such as `2_Sources` into its parts.
///
/// A bare number is its own label.
pub fn parse_level_label(raw: &str) -> Option<(i32, String)> {
	let raw = raw.trim();
	let (level, label) = match raw.split_once('_') {
		Some((level, label)) => (level.trim(), label.trim()),
		None => (raw, raw),
	};
	let level = level.parse().ok()?;
	Some((level, label.to_owned()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Assignment {
	layer: String,
	level: Option<i32>,
	label: String,
}

/// Elements sharing one raw layer value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer {
	/// The raw value, such as `2_Sources`.
	pub id: String,
	/// `None` when unassigned.
	pub level: Option<i32>,
	/// Display name.
	pub label: String,
	members: BTreeSet<LogicalId>,
}

impl Layer {
	#[allow(missing_docs)]
	pub fn members(&self) -> impl Iterator<Item = &LogicalId> {
		self.members.iter()
	}

	#[allow(missing_docs)]
	pub fn len(&self) -> usize {
		self.members.len()
	}

	#[allow(missing_docs)]
	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}
}

#[derive(Clone, Copy, Debug)]
struct Containers {
	root: GraphicsId,
	roles: [GraphicsId; 6],
}

impl Containers {
	fn build(scene: &mut Scene) -> Self {
		let root = scene.create(GraphicsKind::Container);
		let roles = GraphicsRole::ORDER.map(|_| {
			let c = scene.create(GraphicsKind::Container);
			let _ = scene.add_child(root, c);
			c
		});
		Self { root, roles }
	}

	fn is_intact(&self, scene: &Scene) -> bool {
		scene.is_alive(self.root)
			&& self
				.roles
				.iter()
				.all(|r| scene.parent(*r) == Some(self.root))
	}

	/// Destroys the containers only; anything still inside is orphaned.
	fn destroy(self, scene: &mut Scene) {
		for role in self.roles {
			scene.destroy(role);
		}
		scene.destroy(self.root);
	}
}

/// All layers sharing one level, drawn as one band.
#[derive(Debug)]
pub struct LayerGroup {
	level: Option<i32>,
	layers: BTreeMap<String, Layer>,
	containers: Option<Containers>,
	opacity: f64,
}

impl LayerGroup {
	/// `None` for the band of elements without a level.
	pub fn level(&self) -> Option<i32> {
		self.level
	}

	/// Alpha applied to the whole band.
	pub fn opacity(&self) -> f64 {
		self.opacity
	}

	/// Root container of the band.
	pub fn container(&self) -> Option<GraphicsId> {
		self.containers.map(|c| c.root)
	}

	#[allow(missing_docs)]
	pub fn layers(&self) -> impl Iterator<Item = &Layer> {
		self.layers.values()
	}

	/// Labels of every layer in the band, comma separated.
	pub fn label(&self) -> String {
		self.layers
			.values()
			.map(|l| l.label.as_str())
			.collect::<Vec<_>>()
			.join(", ")
	}

	fn is_empty(&self) -> bool {
		self.layers.values().all(Layer::is_empty)
	}
}

#[derive(Debug)]
struct Member {
	assignment: Assignment,
	graphics: Vec<(GraphicsRole, GraphicsId)>,
	endpoints: Option<(LogicalId, LogicalId)>,
}

/// Sorts elements into level bands and fades bands outside the window.
#[derive(Debug)]
pub struct LayersEngine {
	settings: LayerSettings,
	/// The host's shared container while layering is on.
	stage: Option<GraphicsId>,
	groups: Vec<LayerGroup>,
	members: BTreeMap<LogicalId, Member>,
	current: Option<i32>,
}

impl LayersEngine {
	/// Disabled until [`enable`](Self::enable).
	pub fn new(settings: LayerSettings) -> Self {
		Self {
			settings,
			stage: None,
			groups: Vec::new(),
			members: BTreeMap::new(),
			current: None,
		}
	}

	#[allow(missing_docs)]
	pub fn settings(&self) -> &LayerSettings {
		&self.settings
	}

	#[allow(missing_docs)]
	pub fn is_enabled(&self) -> bool {
		self.stage.is_some()
	}

	/// Level at the front of the window.
	pub fn current_level(&self) -> Option<i32> {
		self.current
	}

	/// Bands in rank order, the unassigned one last.
	pub fn groups(&self) -> impl Iterator<Item = &LayerGroup> {
		self.groups.iter()
	}

	/// Layer `id` was sorted into.
	pub fn layer_of(&self, id: &LogicalId) -> Option<&Layer> {
		let member = self.members.get(id)?;
		let group = &self.groups[self.group_index(member.assignment.level)?];
		group.layers.get(&member.assignment.layer)
	}

	/// Level of `id`; `None` when unassigned or unknown.
	pub fn level_of(&self, id: &LogicalId) -> Option<i32> {
		self.members.get(id)?.assignment.level
	}

	/// Opacity of the band `id` currently sits in.
	pub fn layer_opacity(&self, id: &LogicalId) -> Option<f64> {
		let member = self.members.get(id)?;
		let index = self.group_index(member.assignment.level)?;
		Some(self.groups[index].opacity)
	}

	fn rank(&self, level: Option<i32>) -> (bool, i64) {
		match level {
			None => (true, 0),
			Some(l) => match self.settings.order {
				LayerOrder::Ascending => (false, i64::from(l)),
				LayerOrder::Descending => (false, -i64::from(l)),
			},
		}
	}

	fn group_index(&self, level: Option<i32>) -> Option<usize> {
		self.groups.iter().position(|g| g.level == level)
	}

	/// Index of the band nearest to the current level.
	fn current_index(&self) -> Option<usize> {
		if self.groups.is_empty() {
			return None;
		}
		let assigned = self
			.groups
			.iter()
			.enumerate()
			.filter_map(|(i, g)| g.level.map(|l| (i, l)));
		let nearest = match self.current {
			Some(current) => assigned.min_by_key(|(_, l)| (i64::from(*l) - i64::from(current)).abs()),
			None => assigned.min_by_key(|(i, _)| *i),
		};
		Some(nearest.map_or(0, |(i, _)| i))
	}

	/// Opacity of a band `shift` places after the current one.
	pub fn opacity_at(&self, shift: isize) -> f64 {
		let window = self.settings.window_size as isize;
		if shift < 0 || shift >= window {
			return 0.0;
		}
		let custom = &self.settings.custom_opacity;
		if custom.is_empty() {
			return (window - shift) as f64 / window as f64;
		}
		let at = |s: isize| i32::try_from(s).ok().and_then(|s| custom.get(&s)).copied();

		let lower = (0..=shift)
			.rev()
			.find_map(|s| at(s).map(|v| (s, v)))
			.unwrap_or((0, 1.0));
		let upper = (shift..window)
			.find_map(|s| at(s).map(|v| (s, v)))
			.unwrap_or((window, 0.0));
		if upper.0 == lower.0 {
			return lower.1.clamp(0.0, 1.0);
		}
		let t = (shift - lower.0) as f64 / (upper.0 - lower.0) as f64;
		(lower.1 + (upper.1 - lower.1) * t).clamp(0.0, 1.0)
	}

	/// Starts layering against the host container `stage`.
	///
	/// The caller re-adds every element afterwards.
	pub fn enable(&mut self, scene: &mut Scene, stage: GraphicsId) {
		if self.stage.is_some() {
			self.rebuild_containers(scene, stage);
			return;
		}
		self.stage = Some(stage);
		debug!("layers on, window {}", self.settings.window_size);
	}

	/// Hands every graphic back to the host container and forgets all bands.
	pub fn disable(&mut self, scene: &mut Scene) {
		let Some(stage) = self.stage.take() else {
			return;
		};
		for role in GraphicsRole::ORDER {
			for (id, member) in &self.members {
				for (_, g) in member.graphics.iter().filter(|(r, _)| *r == role) {
					if !scene.is_alive(*g) {
						continue;
					}
					if let Err(err) = scene.add_child(stage, *g) {
						warn!("{id}: could not return graphics to the stage: {err}");
					}
				}
			}
		}
		for group in self.groups.drain(..) {
			if let Some(containers) = group.containers {
				containers.destroy(scene);
			}
		}
		self.members.clear();
		debug!("layers off");
	}

	/// Replaces the band configuration, re-sorting and recolouring bands.
	pub fn update_settings(&mut self, scene: &mut Scene, settings: LayerSettings) {
		self.settings = settings;
		self.sort_groups();
		if self.stage.is_some() {
			self.restack(scene);
			self.refresh_opacity(scene);
		}
	}

	fn resolve(&self, meta: &dyn MetadataSource, path: &str) -> Assignment {
		let raw = self
			.settings
			.property_keys
			.iter()
			.find_map(|key| meta.property(path, key).into_iter().next());
		if let Some(raw) = &raw {
			match parse_level_label(raw) {
				Some((level, label)) => {
					return Assignment {
						layer: raw.trim().to_owned(),
						level: Some(level),
						label,
					};
				}
				None => debug!("{path}: `{raw}` is not a level label"),
			}
		}
		match self.settings.default_level {
			Some(level) => Assignment {
				layer: level.to_string(),
				level: Some(level),
				label: level.to_string(),
			},
			None => self.unassigned(),
		}
	}

	fn unassigned(&self) -> Assignment {
		Assignment {
			layer: UNASSIGNED_LAYER.to_owned(),
			level: None,
			label: self.settings.unassigned_label.clone(),
		}
	}

	/// Links sit in the band of whichever endpoint comes later.
	fn link_assignment(&self, source: &LogicalId, target: &LogicalId) -> Assignment {
		let (Some(s), Some(t)) = (self.members.get(source), self.members.get(target)) else {
			return self.unassigned();
		};
		if self.rank(t.assignment.level) > self.rank(s.assignment.level) {
			t.assignment.clone()
		} else {
			s.assignment.clone()
		}
	}

	/// Tracks a node, or reconnects its graphics when already known.
	pub fn add_node(
		&mut self,
		scene: &mut Scene,
		meta: &dyn MetadataSource,
		id: &LogicalId,
		graphics: Vec<(GraphicsRole, GraphicsId)>,
	) {
		if self.stage.is_none() {
			return;
		}
		if let Some(member) = self.members.get_mut(id) {
			member.graphics = graphics;
			self.place(scene, id);
			return;
		}
		let assignment = self.resolve(meta, id.as_str());
		self.join(scene, id, assignment, graphics, None);
		self.relevel_links(scene, id);
	}

	/// Tracks a link in the band of its later-ranked endpoint.
	pub fn add_link(
		&mut self,
		scene: &mut Scene,
		id: &LogicalId,
		source: &LogicalId,
		target: &LogicalId,
		graphics: Vec<(GraphicsRole, GraphicsId)>,
	) {
		if self.stage.is_none() {
			return;
		}
		let assignment = self.link_assignment(source, target);
		let endpoints = Some((source.clone(), target.clone()));
		match self.members.get_mut(id) {
			Some(member) if member.assignment == assignment => {
				member.graphics = graphics;
				self.place(scene, id);
			}
			Some(_) => {
				self.leave(scene, id);
				self.join(scene, id, assignment, graphics, endpoints);
			}
			None => self.join(scene, id, assignment, graphics, endpoints),
		}
	}

	fn relevel_links(&mut self, scene: &mut Scene, node: &LogicalId) {
		let touching: Vec<(LogicalId, LogicalId, LogicalId)> = self
			.members
			.iter()
			.filter_map(|(id, m)| {
				let (s, t) = m.endpoints.as_ref()?;
				(s == node || t == node).then(|| (id.clone(), s.clone(), t.clone()))
			})
			.collect();
		for (id, source, target) in touching {
			let graphics = self
				.members
				.get(&id)
				.map(|m| m.graphics.clone())
				.unwrap_or_default();
			self.add_link(scene, &id, &source, &target, graphics);
		}
	}

	fn join(
		&mut self,
		scene: &mut Scene,
		id: &LogicalId,
		assignment: Assignment,
		graphics: Vec<(GraphicsRole, GraphicsId)>,
		endpoints: Option<(LogicalId, LogicalId)>,
	) {
		let index = self.ensure_group(scene, assignment.level);
		self.groups[index]
			.layers
			.entry(assignment.layer.clone())
			.or_insert_with(|| Layer {
				id: assignment.layer.clone(),
				level: assignment.level,
				label: assignment.label.clone(),
				members: BTreeSet::new(),
			})
			.members
			.insert(id.clone());
		self.members.insert(
			id.clone(),
			Member {
				assignment,
				graphics,
				endpoints,
			},
		);
		self.place(scene, id);
	}

	fn leave(&mut self, scene: &mut Scene, id: &LogicalId) {
		let Some(member) = self.members.remove(id) else {
			return;
		};
		let Some(index) = self.group_index(member.assignment.level) else {
			return;
		};
		let group = &mut self.groups[index];
		if let Some(layer) = group.layers.get_mut(&member.assignment.layer) {
			layer.members.remove(id);
			if layer.is_empty() {
				group.layers.remove(&member.assignment.layer);
			}
		}
		if group.is_empty() {
			let group = self.groups.remove(index);
			if let Some(containers) = group.containers {
				containers.destroy(scene);
			}
			self.refresh_opacity(scene);
		}
	}

	fn ensure_group(&mut self, scene: &mut Scene, level: Option<i32>) -> usize {
		if let Some(index) = self.group_index(level) {
			return index;
		}
		self.groups.push(LayerGroup {
			level,
			layers: BTreeMap::new(),
			containers: self.stage.map(|_| Containers::build(scene)),
			opacity: 0.0,
		});
		self.sort_groups();
		self.restack(scene);
		self.refresh_opacity(scene);
		self.group_index(level).unwrap_or(0)
	}

	fn sort_groups(&mut self) {
		let mut groups = std::mem::take(&mut self.groups);
		groups.sort_by_key(|g| self.rank(g.level));
		self.groups = groups;
	}

	/// Moves a member's live graphics into its band's role containers.
	fn place(&self, scene: &mut Scene, id: &LogicalId) {
		let Some(member) = self.members.get(id) else {
			return;
		};
		let Some(containers) = self
			.group_index(member.assignment.level)
			.and_then(|i| self.groups[i].containers)
		else {
			return;
		};
		for (role, g) in &member.graphics {
			let target = containers.roles[role.slot()];
			if !scene.is_alive(*g) || scene.parent(*g) == Some(target) {
				continue;
			}
			if let Err(err) = scene.add_child(target, *g) {
				warn!("{id}: could not move {role:?} into its layer: {err}");
			}
		}
	}

	/// Band roots go onto the stage last to first, so nearer bands draw on top.
	fn restack(&self, scene: &mut Scene) {
		let Some(stage) = self.stage else {
			return;
		};
		for group in self.groups.iter().rev() {
			let Some(containers) = group.containers else {
				continue;
			};
			if let Err(err) = scene.add_child(stage, containers.root) {
				warn!("layer {:?}: band not attached: {err}", group.level);
			}
		}
	}

	fn refresh_opacity(&mut self, scene: &mut Scene) {
		let Some(current) = self.current_index() else {
			return;
		};
		let opacities: Vec<f64> = (0..self.groups.len())
			.map(|i| self.opacity_at(i as isize - current as isize))
			.collect();
		for (group, opacity) in self.groups.iter_mut().zip(opacities) {
			group.opacity = opacity;
			if let Some(obj) = group.containers.and_then(|c| scene.get_mut(c.root)) {
				obj.alpha = opacity;
				obj.visible = opacity > 0.0;
			}
		}
	}

	/// Recreates any destroyed band container and reattaches its members.
	///
	/// Safe to call when nothing was torn down.
	pub fn rebuild_containers(&mut self, scene: &mut Scene, stage: GraphicsId) {
		if self.stage.is_none() {
			return;
		}
		self.stage = Some(stage);
		for group in &mut self.groups {
			if group.containers.is_some_and(|c| c.is_intact(scene)) {
				continue;
			}
			if let Some(old) = group.containers.take() {
				old.destroy(scene);
			}
			group.containers = Some(Containers::build(scene));
		}
		let ids: Vec<LogicalId> = self.members.keys().cloned().collect();
		for id in &ids {
			self.place(scene, id);
		}
		self.restack(scene);
		self.refresh_opacity(scene);
	}

	/// True when some band container was destroyed or left the stage.
	pub fn needs_rebuild(&self, scene: &Scene, stage: GraphicsId) -> bool {
		self.stage.is_some_and(|s| s != stage)
			|| self.groups.iter().any(|g| {
				g.containers
					.is_some_and(|c| !c.is_intact(scene) || scene.parent(c.root) != Some(stage))
			})
	}

	/// Moves the window to `level` and refreshes band opacity.
	pub fn set_current_level(&mut self, scene: &mut Scene, level: i32) {
		self.current = Some(level);
		self.refresh_opacity(scene);
	}

	/// Moves the window one band forward; `None` at the last band.
	pub fn level_up(&mut self, scene: &mut Scene) -> Option<i32> {
		let next = self.current_index()? + 1;
		let level = self.groups.get(next)?.level?;
		self.set_current_level(scene, level);
		Some(level)
	}

	/// Moves the window one band back; `None` at the first band.
	pub fn level_down(&mut self, scene: &mut Scene) -> Option<i32> {
		let previous = self.current_index()?.checked_sub(1)?;
		let level = self.groups.get(previous)?.level?;
		self.set_current_level(scene, level);
		Some(level)
	}
}
