//! Retained graphics tree shared by the host renderer and the overlay.
//!
//! The host creates and destroys its own objects at will. Destroying an object
//! detaches its children without destroying them, so decorations parented to a
//! host circle survive the circle and can be moved to its replacement.

use slotmap::{SecondaryMap, SlotMap, new_key_type};

use super::color::Color;
use super::error::{OverlayError, Result};
use super::identity::LogicalId;
use super::intercept::{InterceptorRegistry, Override, Property, PropertyValue, Registration};

new_key_type! {
	/// Handle to an object in a [`Scene`]. A destroyed handle never aliases a
	/// later object, even when its slot is reused.
	pub struct GraphicsId;
}

/// What an object draws as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum GraphicsKind {
	Container,
	Circle,
	Line,
	Arrow,
	Text,
	Arc,
	Sprite,
}

/// One node of the scene tree.
#[derive(Clone, Debug)]
pub struct GraphicsObject {
	/// Fixed at creation.
	pub kind: GraphicsKind,
	/// Own alpha, before ancestors are multiplied in.
	pub alpha: f64,
	/// Fill or stroke colour.
	pub tint: Color,
	/// Hidden objects hide their whole subtree.
	pub visible: bool,
	/// Heading in radians; arrows point along it.
	pub rotation: f64,
	/// Position in graph space, for objects the host places itself.
	pub x: f64,
	/// See [`GraphicsObject::x`].
	pub y: f64,
	/// Label text.
	pub text: Option<String>,
	/// Image source for sprites.
	pub texture: Option<String>,
	/// Start and end angle for arcs, in turns.
	pub span: Option<(f64, f64)>,
	/// Sideways bow of a line-shaped subtree, as a fraction of its length.
	/// Zero draws straight.
	pub bend: f64,
	/// Identity of the overlay element that created this object.
	pub owner: Option<LogicalId>,
	anchor: Option<GraphicsId>,
	parent: Option<GraphicsId>,
	children: Vec<GraphicsId>,
}

impl GraphicsObject {
	fn new(kind: GraphicsKind) -> Self {
		Self {
			kind,
			alpha: 1.0,
			tint: Color::WHITE,
			visible: true,
			rotation: 0.0,
			x: 0.0,
			y: 0.0,
			text: None,
			texture: None,
			span: None,
			bend: 0.0,
			owner: None,
			anchor: None,
			parent: None,
			children: Vec::new(),
		}
	}

	/// Container this object is drawn in, if attached.
	pub fn parent(&self) -> Option<GraphicsId> {
		self.parent
	}

	/// Children in draw order.
	pub fn children(&self) -> &[GraphicsId] {
		&self.children
	}

	/// Host object this decoration belongs to. Set through [`Scene::set_anchor`].
	pub fn anchor(&self) -> Option<GraphicsId> {
		self.anchor
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DestroyHook {
	ReleaseInterceptors,
}

/// Arena of graphics objects plus the interceptors installed on them.
#[derive(Debug, Default)]
pub struct Scene {
	objects: SlotMap<GraphicsId, GraphicsObject>,
	hooks: SecondaryMap<GraphicsId, Vec<DestroyHook>>,
	anchored: SecondaryMap<GraphicsId, Vec<GraphicsId>>,
	interceptors: InterceptorRegistry,
	destroyed: Vec<GraphicsId>,
}

impl Scene {
	/// An empty scene.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a detached object with default properties.
	pub fn create(&mut self, kind: GraphicsKind) -> GraphicsId {
		self.objects.insert(GraphicsObject::new(kind))
	}

	/// `None` once `id` has been destroyed.
	pub fn get(&self, id: GraphicsId) -> Option<&GraphicsObject> {
		self.objects.get(id)
	}

	/// Direct mutable access. Bypasses interceptors; host writes go through
	/// [`Scene::write`].
	pub fn get_mut(&mut self, id: GraphicsId) -> Option<&mut GraphicsObject> {
		self.objects.get_mut(id)
	}

	/// False for destroyed handles, including ones whose slot was reused.
	pub fn is_alive(&self, id: GraphicsId) -> bool {
		self.objects.contains_key(id)
	}

	/// Live objects.
	pub fn len(&self) -> usize {
		self.objects.len()
	}

	/// True when nothing is alive.
	pub fn is_empty(&self) -> bool {
		self.objects.is_empty()
	}

	/// Parent of a live object.
	pub fn parent(&self, id: GraphicsId) -> Option<GraphicsId> {
		self.objects.get(id).and_then(|o| o.parent)
	}

	/// Children of `id` in draw order; empty for dead handles.
	pub fn children(&self, id: GraphicsId) -> &[GraphicsId] {
		self.objects.get(id).map(|o| o.children()).unwrap_or(&[])
	}

	/// Appends `child` as the last child of `parent`.
	pub fn add_child(&mut self, parent: GraphicsId, child: GraphicsId) -> Result<()> {
		let at = self.children(parent).len();
		self.add_child_at(parent, child, at)
	}

	/// Moves `child` under `parent` at `index`, leaving its old parent.
	pub fn add_child_at(&mut self, parent: GraphicsId, child: GraphicsId, index: usize) -> Result<()> {
		if !self.is_alive(parent) {
			return Err(OverlayError::DeadGraphics(parent));
		}
		if !self.is_alive(child) {
			return Err(OverlayError::DeadGraphics(child));
		}
		self.remove_from_parent(child);
		let siblings = &mut self.objects.get_mut(parent).ok_or(OverlayError::DeadGraphics(parent))?.children;
		let index = index.min(siblings.len());
		siblings.insert(index, child);
		if let Some(obj) = self.objects.get_mut(child) {
			obj.parent = Some(parent);
		}
		Ok(())
	}

	/// Detaches `child`; it stays alive.
	pub fn remove_from_parent(&mut self, child: GraphicsId) {
		let Some(parent) = self.parent(child) else {
			return;
		};
		if let Some(p) = self.objects.get_mut(parent) {
			p.children.retain(|c| *c != child);
		}
		if let Some(obj) = self.objects.get_mut(child) {
			obj.parent = None;
		}
	}

	/// Records `id` as decorating `anchor`, or clears it with `None`.
	pub fn set_anchor(&mut self, id: GraphicsId, anchor: Option<GraphicsId>) {
		let Some(obj) = self.objects.get_mut(id) else {
			return;
		};
		let previous = std::mem::replace(&mut obj.anchor, anchor);
		if let Some(list) = previous.and_then(|old| self.anchored.get_mut(old)) {
			list.retain(|d| *d != id);
		}
		let Some(anchor) = anchor.filter(|a| self.objects.contains_key(*a)) else {
			return;
		};
		match self.anchored.get_mut(anchor) {
			Some(list) if list.contains(&id) => {}
			Some(list) => list.push(id),
			None => {
				self.anchored.insert(anchor, vec![id]);
			}
		}
	}

	/// Objects decorating `anchor`, wherever in the tree they are parented.
	pub fn anchored_to(&self, anchor: GraphicsId) -> &[GraphicsId] {
		self.anchored.get(anchor).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Destroys one object. Children are orphaned, not destroyed.
	pub fn destroy(&mut self, id: GraphicsId) {
		self.remove_from_parent(id);
		let Some(obj) = self.objects.remove(id) else {
			return;
		};
		if let Some(list) = obj.anchor.and_then(|a| self.anchored.get_mut(a)) {
			list.retain(|d| *d != id);
		}
		self.anchored.remove(id);
		for child in obj.children {
			if let Some(c) = self.objects.get_mut(child) {
				c.parent = None;
			}
		}
		for hook in self.hooks.remove(id).unwrap_or_default() {
			match hook {
				DestroyHook::ReleaseInterceptors => {
					self.interceptors.unregister(id);
				}
			}
		}
		self.destroyed.push(id);
	}

	/// Destroys an object and everything below it.
	pub fn destroy_tree(&mut self, id: GraphicsId) {
		let mut stack = vec![id];
		let mut order = Vec::new();
		while let Some(next) = stack.pop() {
			order.push(next);
			stack.extend_from_slice(self.children(next));
		}
		for id in order.into_iter().rev() {
			self.destroy(id);
		}
	}

	/// Ids destroyed since the last call.
	pub fn take_destroyed(&mut self) -> Vec<GraphicsId> {
		std::mem::take(&mut self.destroyed)
	}

	/// Every override chain installed on this scene.
	pub fn interceptors(&self) -> &InterceptorRegistry {
		&self.interceptors
	}

	/// Direct access, for removing chains before their target dies.
	pub fn interceptors_mut(&mut self) -> &mut InterceptorRegistry {
		&mut self.interceptors
	}

	/// Registers an override chain and ties its lifetime to `target`.
	pub fn intercept(
		&mut self,
		target: GraphicsId,
		property: Property,
		owner: &LogicalId,
		overrides: Vec<Override>,
	) -> Registration {
		if !self.is_alive(target) {
			return Registration::AlreadyRegistered;
		}
		let registration = self.interceptors.register(target, property, owner, overrides);
		if registration == Registration::Installed {
			match self.hooks.get_mut(target) {
				Some(hooks) if hooks.contains(&DestroyHook::ReleaseInterceptors) => {}
				Some(hooks) => hooks.push(DestroyHook::ReleaseInterceptors),
				None => {
					self.hooks.insert(target, vec![DestroyHook::ReleaseInterceptors]);
				}
			}
		}
		registration
	}

	/// A host-side property write, routed through any installed override.
	pub fn write(&mut self, target: GraphicsId, property: Property, value: PropertyValue) -> bool {
		let Some(value) = self.interceptors.apply(target, property, value) else {
			return false;
		};
		let Some(obj) = self.objects.get_mut(target) else {
			return false;
		};
		match (property, value) {
			(Property::Tint, PropertyValue::Color(c)) => obj.tint = c,
			(Property::Alpha, PropertyValue::Number(a)) => obj.alpha = a.clamp(0.0, 1.0),
			(Property::Visible, PropertyValue::Flag(v)) => obj.visible = v,
			(Property::Rotation, PropertyValue::Number(r)) => obj.rotation = r,
			_ => return false,
		}
		true
	}

	/// Alpha after multiplying through every ancestor.
	pub fn world_alpha(&self, id: GraphicsId) -> f64 {
		let mut alpha = 1.0;
		let mut cursor = Some(id);
		while let Some(current) = cursor {
			let Some(obj) = self.objects.get(current) else {
				break;
			};
			alpha *= obj.alpha;
			cursor = obj.parent;
		}
		alpha
	}

	/// False when `id` or any ancestor is hidden.
	pub fn world_visible(&self, id: GraphicsId) -> bool {
		let mut cursor = Some(id);
		while let Some(current) = cursor {
			match self.objects.get(current) {
				Some(obj) if obj.visible => cursor = obj.parent,
				_ => return false,
			}
		}
		true
	}

	/// True when `root` is an ancestor of `id`.
	pub fn is_descendant_of(&self, id: GraphicsId, root: GraphicsId) -> bool {
		let mut cursor = self.parent(id);
		while let Some(current) = cursor {
			if current == root {
				return true;
			}
			cursor = self.parent(current);
		}
		false
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reparenting_moves_the_child() {
		let mut scene = Scene::new();
		let a = scene.create(GraphicsKind::Container);
		let b = scene.create(GraphicsKind::Container);
		let c = scene.create(GraphicsKind::Circle);

		scene.add_child(a, c).expect("attach");
		scene.add_child(b, c).expect("move");
		assert!(scene.children(a).is_empty());
		assert_eq!(scene.children(b), &[c]);
		assert_eq!(scene.parent(c), Some(b));
	}

	#[test]
	fn destroy_orphans_children_and_reports() {
		let mut scene = Scene::new();
		let circle = scene.create(GraphicsKind::Circle);
		let deco = scene.create(GraphicsKind::Container);
		scene.add_child(circle, deco).expect("attach");

		scene.destroy(circle);
		assert!(!scene.is_alive(circle));
		assert!(scene.is_alive(deco));
		assert_eq!(scene.parent(deco), None);
		assert_eq!(scene.take_destroyed(), vec![circle]);
		assert!(scene.take_destroyed().is_empty());
		assert!(matches!(
			scene.add_child(circle, deco),
			Err(OverlayError::DeadGraphics(_))
		));
	}

	#[test]
	fn world_alpha_multiplies_ancestors() {
		let mut scene = Scene::new();
		let band = scene.create(GraphicsKind::Container);
		let circle = scene.create(GraphicsKind::Circle);
		scene.add_child(band, circle).expect("attach");
		scene.get_mut(band).expect("band").alpha = 0.5;
		scene.write(circle, Property::Alpha, PropertyValue::Number(0.5));
		assert!((scene.world_alpha(circle) - 0.25).abs() < 1e-9);
		assert!(scene.is_descendant_of(circle, band));

		assert!(scene.world_visible(circle));
		scene.get_mut(band).expect("band").visible = false;
		assert!(!scene.world_visible(circle));
	}

	#[test]
	fn stale_handle_survives_slot_reuse() {
		let mut scene = Scene::new();
		let old = scene.create(GraphicsKind::Circle);
		scene.destroy(old);
		let new = scene.create(GraphicsKind::Circle);
		assert_ne!(old, new);
		assert!(!scene.is_alive(old));
		assert!(scene.get(old).is_none());
		assert!(scene.is_alive(new));
		assert!(!scene.write(old, Property::Alpha, PropertyValue::Number(0.2)));
		assert_eq!(scene.get(new).expect("new").alpha, 1.0);
	}

	#[test]
	fn anchors_are_found_after_reparenting() {
		let mut scene = Scene::new();
		let line = scene.create(GraphicsKind::Line);
		let stage = scene.create(GraphicsKind::Container);
		let band = scene.create(GraphicsKind::Container);
		let deco = scene.create(GraphicsKind::Container);
		scene.add_child(stage, deco).expect("attach");
		scene.set_anchor(deco, Some(line));

		scene.add_child(band, deco).expect("move");
		assert_eq!(scene.anchored_to(line), &[deco]);
		assert_eq!(scene.get(deco).and_then(GraphicsObject::anchor), Some(line));

		scene.set_anchor(deco, None);
		assert!(scene.anchored_to(line).is_empty());
		scene.set_anchor(deco, Some(line));
		scene.destroy(deco);
		assert!(scene.anchored_to(line).is_empty());
	}

	#[test]
	fn destroy_tree_removes_everything_below() {
		let mut scene = Scene::new();
		let root = scene.create(GraphicsKind::Container);
		let mid = scene.create(GraphicsKind::Container);
		let leaf = scene.create(GraphicsKind::Arc);
		scene.add_child(root, mid).expect("attach");
		scene.add_child(mid, leaf).expect("attach");
		scene.destroy_tree(root);
		assert!(scene.is_empty());
	}
}
