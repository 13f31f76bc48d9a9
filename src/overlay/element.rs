//! One logical node or link, tracked across host object churn.
//!
//! ```text
//! Uninitialized --bind--> Bound --new core--> Rebinding --> Bound
//!                           |  ^
//!                 disable   v  |  enable
//!                         Disabled
//! ```

use std::cell::Cell;
use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::rc::Rc;

use log::{debug, warn};

use super::color::Color;
use super::decoration::{Channel, ChannelShape, Decoration, DecorationStyle};
use super::error::{OverlayError, Result};
use super::host::{CoreElement, CoreHandle, CoreLink, CoreNode, LiveCollections, NodeKind};
use super::identity::LogicalId;
use super::intercept::{Override, Property, PropertyValue};
use super::interactive::Managers;
use super::layers::GraphicsRole;
use super::metadata::{node_values, Category, MetadataSource, TypeMap};
use super::scene::{GraphicsId, Scene};
use super::settings::Features;

/// Sideways bow of a link decoration whose reverse link is also drawn.
pub const SIBLING_BEND: f64 = 0.15;

/// Where an element is in its bind cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementState {
	/// Never bound.
	Uninitialized,
	/// Decorating a live core.
	Bound,
	/// Between cores, or waiting for one to show up.
	Rebinding,
	/// Absent or filtered; holds no overrides.
	Disabled,
}

/// Closed set of element kinds, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
	/// A node of the given host kind.
	Node(NodeKind),
	/// An edge.
	Link,
}

impl ElementKind {
	/// Whether an element of this kind gets its own decoration container.
	pub fn needs_graphics_wrapper(&self, features: &Features, has_channels: bool, has_image: bool) -> bool {
		match self {
			ElementKind::Node(NodeKind::File | NodeKind::Attachment) => {
				(features.arcs && has_channels)
					|| features.opacity_layer
					|| (features.images && has_image)
			}
			ElementKind::Node(NodeKind::Tag | NodeKind::Unresolved) => features.opacity_layer,
			ElementKind::Link => features.link_types && has_channels,
		}
	}
}

/// Progress of a node's image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageState {
	/// Nothing asked for yet.
	Unrequested,
	/// Requested while bound to this core; results for any other core are stale.
	Pending(CoreHandle),
	/// Texture key ready for the icon.
	Loaded(String),
	/// Gave up; no icon.
	Failed,
}

/// Values shared with the interceptors installed on the current core.
#[derive(Clone, Debug, Default)]
pub struct OverrideCells {
	/// Tint forced over whatever the host writes.
	pub color: Rc<Cell<Option<Color>>>,
	/// Turns arrows half a circle.
	pub inverted: Rc<Cell<bool>>,
}

/// Everything a decoration needs from the graph instance at build time.
pub struct DecorationContext<'a> {
	/// Colours and active state per category.
	pub managers: &'a Managers,
	/// Which decoration parts are on.
	pub features: &'a Features,
	/// Fill behind node decorations.
	pub background: Color,
}

/// Host objects the overlay knows how to decorate.
pub trait Decoratable: CoreElement + Clone {
	/// How memberships are drawn.
	const SHAPE: ChannelShape;

	/// Kind discriminator.
	fn kind(&self) -> ElementKind;

	/// Container the decoration joins, `None` while the core is detached.
	fn decoration_parent(&self, scene: &Scene) -> Option<GraphicsId>;

	/// Host graphics the layers engine moves, tagged with their role.
	fn layer_graphics(&self) -> Vec<(GraphicsRole, GraphicsId)>;

	/// Every host graphic interceptors may sit on.
	fn all_graphics(&self) -> Vec<GraphicsId> {
		self.layer_graphics().into_iter().map(|(_, g)| g).collect()
	}

	/// Memberships for every category with a manager.
	fn derive_types(&self, meta: &dyn MetadataSource, managers: &Managers) -> TypeMap;

	/// Puts the override chains for this core in front of host writes.
	fn install_overrides(&self, owner: &LogicalId, scene: &mut Scene, cells: &OverrideCells);
}

fn with_none(values: BTreeSet<String>, none: &str) -> BTreeSet<String> {
	if values.is_empty() {
		BTreeSet::from([none.to_owned()])
	} else {
		values
	}
}

fn force_color(cell: &Rc<Cell<Option<Color>>>) -> Override {
	let (when, to) = (cell.clone(), cell.clone());
	Override::rewrite(
		"force color",
		move |_| when.get().is_some(),
		move |v| to.get().map(PropertyValue::Color).unwrap_or(*v),
	)
}

impl Decoratable for CoreNode {
	const SHAPE: ChannelShape = ChannelShape::Arc;

	fn kind(&self) -> ElementKind {
		ElementKind::Node(self.kind)
	}

	fn decoration_parent(&self, scene: &Scene) -> Option<GraphicsId> {
		scene.is_alive(self.circle).then_some(self.circle)
	}

	fn layer_graphics(&self) -> Vec<(GraphicsRole, GraphicsId)> {
		let mut out = vec![(GraphicsRole::Circle, self.circle)];
		out.extend(self.text.map(|t| (GraphicsRole::Name, t)));
		out
	}

	fn derive_types(&self, meta: &dyn MetadataSource, managers: &Managers) -> TypeMap {
		managers
			.iter()
			.filter_map(|(key, manager)| {
				let category = Category::parse(key);
				if category.is_link_category() {
					return None;
				}
				let values = node_values(meta, &self.id, self.kind, &category);
				Some((key.clone(), with_none(values, manager.none_value())))
			})
			.collect()
	}

	fn install_overrides(&self, owner: &LogicalId, scene: &mut Scene, cells: &OverrideCells) {
		scene.intercept(self.circle, Property::Tint, owner, vec![force_color(&cells.color)]);
	}
}

impl Decoratable for CoreLink {
	const SHAPE: ChannelShape = ChannelShape::Segment;

	fn kind(&self) -> ElementKind {
		ElementKind::Link
	}

	fn decoration_parent(&self, scene: &Scene) -> Option<GraphicsId> {
		scene.parent(self.line)
	}

	fn layer_graphics(&self) -> Vec<(GraphicsRole, GraphicsId)> {
		let mut out = vec![(GraphicsRole::Link, self.line)];
		out.extend(self.arrow.map(|a| (GraphicsRole::Arrow, a)));
		out
	}

	fn derive_types(&self, meta: &dyn MetadataSource, managers: &Managers) -> TypeMap {
		let key = Category::Link.key();
		let Some(manager) = managers.get(&key) else {
			return TypeMap::new();
		};
		let values = meta
			.link_types(&self.source, &self.target)
			.into_iter()
			.collect();
		TypeMap::from([(key, with_none(values, manager.none_value()))])
	}

	fn install_overrides(&self, owner: &LogicalId, scene: &mut Scene, cells: &OverrideCells) {
		scene.intercept(self.line, Property::Tint, owner, vec![force_color(&cells.color)]);
		if let Some(arrow) = self.arrow {
			let when = cells.inverted.clone();
			scene.intercept(
				arrow,
				Property::Rotation,
				owner,
				vec![Override::rewrite(
					"invert direction",
					move |_| when.get(),
					|v| PropertyValue::Number(v.as_number().unwrap_or(0.0) + PI),
				)],
			);
		}
	}
}

/// Overlay-side state for one logical identity.
#[derive(Debug)]
pub struct ExtendedElement<C: Decoratable> {
	id: LogicalId,
	kind: ElementKind,
	core: Option<C>,
	types: TypeMap,
	disabled_channels: BTreeSet<(String, String)>,
	state: ElementState,
	absent: bool,
	filtered: bool,
	missed_ticks: u32,
	decoration: Option<Decoration>,
	cells: OverrideCells,
	rebinds: u32,
	sibling: Option<LogicalId>,
	pub(crate) image: ImageState,
}

impl<C: Decoratable> ExtendedElement<C> {
	/// An unbound element with the given memberships.
	pub fn new(id: LogicalId, kind: ElementKind, types: TypeMap) -> Self {
		Self {
			id,
			kind,
			core: None,
			types,
			disabled_channels: BTreeSet::new(),
			state: ElementState::Uninitialized,
			absent: false,
			filtered: false,
			missed_ticks: 0,
			decoration: None,
			cells: OverrideCells::default(),
			rebinds: 0,
			sibling: None,
			image: ImageState::Unrequested,
		}
	}

	/// The identity this element follows.
	pub fn id(&self) -> &LogicalId {
		&self.id
	}

	/// Kind fixed at construction.
	pub fn kind(&self) -> ElementKind {
		self.kind
	}

	/// Current bind state.
	pub fn state(&self) -> ElementState {
		self.state
	}

	/// Bound to a live core.
	pub fn is_active(&self) -> bool {
		self.state == ElementState::Bound
	}

	/// Last core bound, if any.
	pub fn core(&self) -> Option<&C> {
		self.core.as_ref()
	}

	/// Generation stamp of the bound core.
	pub fn core_handle(&self) -> Option<CoreHandle> {
		self.core.as_ref().map(|c| c.handle())
	}

	/// Memberships per category.
	pub fn types(&self) -> &TypeMap {
		&self.types
	}

	/// Memberships in one category.
	pub fn values(&self, category: &str) -> impl Iterator<Item = &str> {
		self.types
			.get(category)
			.into_iter()
			.flatten()
			.map(String::as_str)
	}

	/// Overlay graphics, while the element needs them.
	pub fn decoration(&self) -> Option<&Decoration> {
		self.decoration.as_ref()
	}

	/// Completed rebinds to a replacement core.
	pub fn rebinds(&self) -> u32 {
		self.rebinds
	}

	/// For links, the reverse link when the host has it too.
	pub fn sibling(&self) -> Option<&LogicalId> {
		self.sibling.as_ref()
	}

	pub(crate) fn set_sibling(&mut self, scene: &mut Scene, sibling: Option<LogicalId>) {
		let bend = if sibling.is_some() { SIBLING_BEND } else { 0.0 };
		if let Some(decoration) = &self.decoration {
			decoration.set_bend(scene, bend);
		}
		self.sibling = sibling;
	}

	/// Hidden by a category filter.
	pub fn is_filtered(&self) -> bool {
		self.filtered
	}

	/// Deactivated after going missing from the host.
	pub fn is_absent(&self) -> bool {
		self.absent
	}

	/// False after [`ExtendedElement::disable_type`] for this pair.
	pub fn is_channel_enabled(&self, category: &str, value: &str) -> bool {
		!self
			.disabled_channels
			.contains(&(category.to_owned(), value.to_owned()))
	}

	/// Compares generation stamps, not identities.
	pub fn is_same_core_element(&self, core: &C) -> bool {
		self.core_handle() == Some(core.handle())
	}

	pub(crate) fn set_direction_inverted(&self, inverted: bool) {
		self.cells.inverted.set(inverted);
	}

	pub(crate) fn set_forced_color(&self, color: Option<Color>) {
		self.cells.color.set(color);
	}

	pub(crate) fn note_missing(&mut self) -> u32 {
		self.missed_ticks += 1;
		self.missed_ticks
	}

	pub(crate) fn note_present(&mut self) {
		self.missed_ticks = 0;
	}

	fn channels(&self, ctx: &DecorationContext<'_>) -> Vec<Channel> {
		let mut out = Vec::new();
		for (category, values) in &self.types {
			let Some(manager) = ctx.managers.get(category) else {
				continue;
			};
			for value in values {
				if value == manager.none_value() {
					continue;
				}
				out.push(Channel {
					category: category.clone(),
					value: value.clone(),
					color: manager.color(value),
					active: manager.is_active(value) && self.is_channel_enabled(category, value),
				});
			}
		}
		out
	}

	fn image_texture(&self) -> Option<String> {
		match &self.image {
			ImageState::Loaded(texture) => Some(texture.clone()),
			_ => None,
		}
	}

	fn needs_decoration(&self, ctx: &DecorationContext<'_>) -> bool {
		let has_channels = !self.channels(ctx).is_empty();
		let has_image = self.image_texture().is_some();
		self.kind
			.needs_graphics_wrapper(ctx.features, has_channels, has_image)
	}

	fn build_decoration(&self, scene: &mut Scene, ctx: &DecorationContext<'_>) -> Decoration {
		let style = DecorationStyle {
			background: ctx.features.opacity_layer.then_some(ctx.background),
			icon: if ctx.features.images {
				self.image_texture()
			} else {
				None
			},
		};
		let decoration = Decoration::create(scene, &self.id, C::SHAPE, &self.channels(ctx), &style);
		if self.sibling.is_some() {
			decoration.set_bend(scene, SIBLING_BEND);
		}
		decoration
	}

	fn release_overrides(&self, scene: &mut Scene) {
		if let Some(core) = &self.core {
			for g in core.all_graphics() {
				scene.interceptors_mut().unregister(g);
			}
		}
	}

	/// Binds to `core`, moving the decoration off the previous one.
	///
	/// Returns `Ok(true)` when the core actually changed. A conflict on the
	/// new anchor drops this element's decoration and reports the error.
	pub fn set_core_element(
		&mut self,
		scene: &mut Scene,
		core: &C,
		ctx: &DecorationContext<'_>,
	) -> Result<bool> {
		let same = self.is_same_core_element(core);
		if same && self.state == ElementState::Bound {
			return Ok(false);
		}
		let was_bound = self.core.is_some() && !same;
		self.state = ElementState::Rebinding;

		if let Some(decoration) = &mut self.decoration {
			decoration.disconnect(scene);
		}
		self.release_overrides(scene);
		self.core = Some(core.clone());
		core.install_overrides(&self.id, scene, &self.cells);
		if was_bound {
			self.rebinds += 1;
			if matches!(self.image, ImageState::Pending(_)) {
				self.image = ImageState::Unrequested;
			}
		}

		let result = self.attach_decoration(scene, ctx);
		self.state = ElementState::Bound;
		result.map(|_| !same)
	}

	/// Re-finds the live core by identity. A missing core is not an error;
	/// the element waits undecorated for the next sync.
	pub fn update_core_element(
		&mut self,
		scene: &mut Scene,
		live: LiveCollections<'_>,
		ctx: &DecorationContext<'_>,
	) -> Result<bool> {
		match C::find(live, &self.id) {
			Some(core) => self.set_core_element(scene, core, ctx),
			None => {
				debug!("{}: core element not live yet", self.id);
				if let Some(decoration) = &mut self.decoration {
					decoration.disconnect(scene);
				}
				self.release_overrides(scene);
				self.core = None;
				self.state = ElementState::Rebinding;
				Ok(false)
			}
		}
	}

	fn attach_decoration(&mut self, scene: &mut Scene, ctx: &DecorationContext<'_>) -> Result<()> {
		if !self.needs_decoration(ctx) {
			if let Some(decoration) = self.decoration.take() {
				decoration.destroy(scene);
			}
			return Ok(());
		}
		let Some(core) = &self.core else {
			return Err(OverlayError::MissingCoreElement(self.id.clone()));
		};
		let Some(parent) = core.decoration_parent(scene) else {
			return Ok(());
		};
		let anchor = core.graphics();

		let mut decoration = match self.decoration.take() {
			Some(d) if d.is_alive(scene) => d,
			Some(d) => {
				d.destroy(scene);
				self.build_decoration(scene, ctx)
			}
			None => self.build_decoration(scene, ctx),
		};
		match decoration.connect(scene, parent, anchor) {
			Ok(()) => {
				self.decoration = Some(decoration);
				Ok(())
			}
			Err(err) => {
				warn!("{}: dropping decoration: {err}", self.id);
				decoration.destroy(scene);
				Err(err)
			}
		}
	}

	/// Tears the decoration down and builds it again from current state.
	pub fn rebuild_decoration(&mut self, scene: &mut Scene, ctx: &DecorationContext<'_>) -> Result<()> {
		if let Some(decoration) = self.decoration.take() {
			decoration.destroy(scene);
		}
		if self.state != ElementState::Bound {
			return Ok(());
		}
		self.attach_decoration(scene, ctx)
	}

	/// Replaces the memberships and redraws the decoration to match.
	/// Per-element hides survive for values the element still carries.
	pub fn set_types(&mut self, scene: &mut Scene, types: TypeMap, ctx: &DecorationContext<'_>) -> Result<()> {
		self.disabled_channels
			.retain(|(category, value)| types.get(category).is_some_and(|v| v.contains(value)));
		self.types = types;
		self.rebuild_decoration(scene, ctx)
	}

	/// Deactivates after the host stopped listing this identity.
	pub fn mark_absent(&mut self, scene: &mut Scene) {
		self.absent = true;
		self.disable(scene);
	}

	/// Sets or clears the filter flag. Setting it disables the element;
	/// clearing it leaves re-enabling to [`ExtendedElement::enable`].
	pub fn mark_filtered(&mut self, scene: &mut Scene, filtered: bool) {
		self.filtered = filtered;
		if filtered {
			self.disable(scene);
		}
	}

	fn disable(&mut self, scene: &mut Scene) {
		if self.state == ElementState::Disabled {
			return;
		}
		if let Some(decoration) = &mut self.decoration {
			decoration.disconnect(scene);
		}
		self.release_overrides(scene);
		self.state = ElementState::Disabled;
	}

	/// Leaves `Disabled` once neither absence nor a filter holds it there.
	pub fn enable(
		&mut self,
		scene: &mut Scene,
		live: LiveCollections<'_>,
		ctx: &DecorationContext<'_>,
	) -> Result<bool> {
		if self.filtered || self.state != ElementState::Disabled {
			return Ok(false);
		}
		let Some(core) = C::find(live, &self.id) else {
			return Ok(false);
		};
		self.absent = false;
		self.missed_ticks = 0;
		self.set_core_element(scene, core, ctx)?;
		Ok(true)
	}

	/// Hides one membership on this element only.
	pub fn disable_type(&mut self, scene: &mut Scene, category: &str, value: &str) {
		self.disabled_channels
			.insert((category.to_owned(), value.to_owned()));
		if let Some(decoration) = &self.decoration {
			decoration.set_channel_active(scene, category, value, false);
		}
	}

	/// Undoes [`ExtendedElement::disable_type`]; the channel shows again if
	/// its manager has it active.
	pub fn enable_type(&mut self, scene: &mut Scene, category: &str, value: &str, manager_active: bool) {
		self.disabled_channels
			.remove(&(category.to_owned(), value.to_owned()));
		if let Some(decoration) = &self.decoration {
			decoration.set_channel_active(scene, category, value, manager_active);
		}
	}

	/// Re-reads a channel after its manager toggled `value`.
	pub fn refresh_channel(&self, scene: &mut Scene, category: &str, value: &str, manager_active: bool) {
		if let Some(decoration) = &self.decoration {
			let active = manager_active && self.is_channel_enabled(category, value);
			decoration.set_channel_active(scene, category, value, active);
		}
	}

	/// Repaints one channel.
	pub fn recolor(&self, scene: &mut Scene, category: &str, value: &str, color: Color) {
		if let Some(decoration) = &self.decoration {
			decoration.set_channel_color(scene, category, value, color);
		}
	}

	/// Refills the backdrop disc, creating it if needed.
	pub fn set_background(&mut self, scene: &mut Scene, color: Color) {
		if let Some(decoration) = &mut self.decoration {
			decoration.set_background(scene, color);
		}
	}

	pub(crate) fn set_icon(&mut self, scene: &mut Scene, texture: &str) {
		if let Some(decoration) = &mut self.decoration {
			decoration.set_icon(scene, texture);
		}
	}

	/// True when, for some category this element belongs to, every one of
	/// its values is switched off.
	pub fn is_any_manager_disabled(&self, managers: &Managers) -> bool {
		self.types.iter().any(|(category, values)| {
			let Some(manager) = managers.get(category) else {
				return false;
			};
			!values.is_empty() && values.iter().all(|v| !manager.is_active(v))
		})
	}

	/// First active membership colour of `category`.
	pub fn leading_color(&self, managers: &Managers, category: &str) -> Option<Color> {
		let manager = managers.get(category)?;
		self.values(category)
			.filter(|v| *v != manager.none_value() && manager.is_active(v))
			.find_map(|v| manager.try_color(v))
	}

	/// Core graphics plus, for links, the decoration container.
	pub fn layer_graphics(&self) -> Vec<(GraphicsRole, GraphicsId)> {
		let mut out = self
			.core
			.as_ref()
			.map(|c| c.layer_graphics())
			.unwrap_or_default();
		if self.kind == ElementKind::Link {
			if let Some(d) = &self.decoration {
				out.push((GraphicsRole::LinkDecoration, d.container()));
			}
		}
		out
	}

	/// Drops everything this element owns in the scene.
	pub fn destroy(mut self, scene: &mut Scene) {
		self.release_overrides(scene);
		if let Some(decoration) = self.decoration.take() {
			decoration.destroy(scene);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::overlay::host::{Host, MemoryHost};
	use crate::overlay::interactive::InteractiveManager;
	use crate::overlay::settings::CategorySettings;

	fn managers() -> Managers {
		let mut managers = Managers::new();
		let mut tags = InteractiveManager::new("tag", &CategorySettings::default());
		tags.add_types(["x", "y"]);
		managers.insert("tag".to_owned(), tags);
		managers
	}

	fn node(host: &mut MemoryHost, types: &[&str]) -> ExtendedElement<CoreNode> {
		host.add_node("a.md", NodeKind::File);
		let types = TypeMap::from([(
			"tag".to_owned(),
			types.iter().map(|t| t.to_string()).collect(),
		)]);
		ExtendedElement::new(LogicalId::node("a.md"), ElementKind::Node(NodeKind::File), types)
	}

	#[test]
	fn rebind_moves_decoration_to_new_circle() {
		let mut host = MemoryHost::new();
		let mut element = node(&mut host, &["x", "y"]);
		let managers = managers();
		let features = Features::default();
		let ctx = DecorationContext {
			managers: &managers,
			features: &features,
			background: Color::BLACK,
		};

		let frame = host.frame();
		assert!(element.update_core_element(frame.scene, frame.live, &ctx).expect("bind"));
		assert_eq!(element.state(), ElementState::Bound);
		assert_eq!(element.rebinds(), 0);
		let container = element.decoration().expect("decoration").container();

		let old_circle = host.node("a.md").expect("node").circle;
		host.recreate_node("a.md");
		let new_circle = host.node("a.md").expect("node").circle;
		let frame = host.frame();
		assert!(element.update_core_element(frame.scene, frame.live, &ctx).expect("rebind"));

		assert_eq!(element.rebinds(), 1);
		assert_eq!(host.scene().parent(container), Some(new_circle));
		assert!(!host.scene().is_alive(old_circle));
		assert_eq!(element.decoration().expect("decoration").container(), container);
	}

	#[test]
	fn whole_category_off_means_manager_disabled() {
		let mut host = MemoryHost::new();
		let element = node(&mut host, &["x", "y"]);
		let mut managers = managers();
		assert!(!element.is_any_manager_disabled(&managers));

		let tags = managers.get_mut("tag").expect("tags");
		tags.disable("x");
		assert!(!element.is_any_manager_disabled(&managers));
		managers.get_mut("tag").expect("tags").disable("y");
		assert!(element.is_any_manager_disabled(&managers));
	}

	#[test]
	fn channel_toggle_leaves_the_element_active() {
		let mut host = MemoryHost::new();
		let mut element = node(&mut host, &["x", "y"]);
		let managers = managers();
		let features = Features::default();
		let ctx = DecorationContext {
			managers: &managers,
			features: &features,
			background: Color::BLACK,
		};
		let frame = host.frame();
		element
			.update_core_element(frame.scene, frame.live, &ctx)
			.expect("bind");

		element.disable_type(frame.scene, "tag", "x");
		let arc = element.decoration().and_then(|d| d.channel("tag", "x")).expect("arc");
		assert!(!frame.scene.get(arc).expect("arc").visible);
		assert!(element.is_active());

		element.enable_type(frame.scene, "tag", "x", true);
		assert!(frame.scene.get(arc).expect("arc").visible);
	}

	#[test]
	fn missing_core_waits_undecorated() {
		let mut host = MemoryHost::new();
		let mut element = node(&mut host, &["x"]);
		let managers = managers();
		let features = Features::default();
		let ctx = DecorationContext {
			managers: &managers,
			features: &features,
			background: Color::BLACK,
		};
		let frame = host.frame();
		element
			.update_core_element(frame.scene, frame.live, &ctx)
			.expect("bind");
		host.remove_node("a.md");

		let frame = host.frame();
		assert!(!element.update_core_element(frame.scene, frame.live, &ctx).expect("no error"));
		assert!(element.core().is_none());
		assert!(!element.decoration().expect("kept").is_connected(frame.scene));
	}
}
