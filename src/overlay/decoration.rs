//! Overlay-owned graphics hung off a host object.
//!
//! A decoration is built once and moved between host objects as they are
//! replaced. It is never parented to two anchors at once.

use std::collections::BTreeMap;

use log::warn;

use super::color::Color;
use super::error::{OverlayError, Result};
use super::identity::LogicalId;
use super::scene::{GraphicsId, GraphicsKind, Scene};

/// How a decoration draws one membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelShape {
	/// Ring segment around a node circle.
	Arc,
	/// Stripe along a link line.
	Segment,
}

/// One membership to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
	/// Category key.
	pub category: String,
	/// Value within the category.
	pub value: String,
	/// Manager colour at build time.
	pub color: Color,
	/// Starts hidden when false.
	pub active: bool,
}

/// Optional parts of a decoration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecorationStyle {
	/// Backdrop disc colour.
	pub background: Option<Color>,
	/// Texture for the icon sprite.
	pub icon: Option<String>,
}

/// Container of channel graphics plus an optional backdrop and icon.
#[derive(Debug)]
pub struct Decoration {
	owner: LogicalId,
	container: GraphicsId,
	background: Option<GraphicsId>,
	icon: Option<GraphicsId>,
	channels: BTreeMap<(String, String), GraphicsId>,
	anchor: Option<GraphicsId>,
}

impl Decoration {
	/// Builds a detached decoration. Channels of one category share the
	/// full turn or length evenly.
	pub fn create(
		scene: &mut Scene,
		owner: &LogicalId,
		shape: ChannelShape,
		channels: &[Channel],
		style: &DecorationStyle,
	) -> Self {
		let container = scene.create(GraphicsKind::Container);
		if let Some(c) = scene.get_mut(container) {
			c.owner = Some(owner.clone());
		}
		let mut decoration = Self {
			owner: owner.clone(),
			container,
			background: None,
			icon: None,
			channels: BTreeMap::new(),
			anchor: None,
		};
		if let Some(color) = style.background {
			decoration.set_background(scene, color);
		}

		let mut per_category: BTreeMap<&str, Vec<&Channel>> = BTreeMap::new();
		for channel in channels {
			per_category.entry(&channel.category).or_default().push(channel);
		}
		for group in per_category.values() {
			let n = group.len() as f64;
			for (i, channel) in group.iter().enumerate() {
				let kind = match shape {
					ChannelShape::Arc => GraphicsKind::Arc,
					ChannelShape::Segment => GraphicsKind::Line,
				};
				let g = scene.create(kind);
				if let Some(obj) = scene.get_mut(g) {
					obj.owner = Some(owner.clone());
					obj.tint = channel.color;
					obj.visible = channel.active;
					obj.span = Some((i as f64 / n, (i + 1) as f64 / n));
				}
				let _ = scene.add_child(container, g);
				decoration
					.channels
					.insert((channel.category.clone(), channel.value.clone()), g);
			}
		}
		if let Some(texture) = &style.icon {
			decoration.set_icon(scene, texture);
		}
		decoration
	}

	/// Element that built this decoration.
	pub fn owner(&self) -> &LogicalId {
		&self.owner
	}

	/// Root of the decoration's subtree.
	pub fn container(&self) -> GraphicsId {
		self.container
	}

	/// Host object currently decorated.
	pub fn anchor(&self) -> Option<GraphicsId> {
		self.anchor
	}

	/// False once the container was destroyed from outside.
	pub fn is_alive(&self, scene: &Scene) -> bool {
		scene.is_alive(self.container)
	}

	/// Anchored and attached somewhere in the tree.
	pub fn is_connected(&self, scene: &Scene) -> bool {
		self.anchor.is_some() && scene.parent(self.container).is_some()
	}

	/// Graphic drawing `value` of `category`.
	pub fn channel(&self, category: &str, value: &str) -> Option<GraphicsId> {
		self.channels
			.get(&(category.to_owned(), value.to_owned()))
			.copied()
	}

	/// Drawn memberships.
	pub fn channel_count(&self) -> usize {
		self.channels.len()
	}

	/// Attaches under `parent` on behalf of host object `anchor`.
	///
	/// Refuses when another element already decorates `anchor`, wherever its
	/// container currently sits; the caller is expected to drop this (newer)
	/// decoration.
	pub fn connect(&mut self, scene: &mut Scene, parent: GraphicsId, anchor: GraphicsId) -> Result<()> {
		let other = scene
			.anchored_to(anchor)
			.iter()
			.filter(|c| **c != self.container)
			.find_map(|c| scene.get(*c)?.owner.clone().filter(|o| *o != self.owner));
		if let Some(other) = other {
			return Err(OverlayError::DecorationConflict { owner: other, anchor });
		}
		if self.anchor == Some(anchor) && scene.parent(self.container) == Some(parent) {
			return Ok(());
		}
		self.disconnect(scene);
		scene.add_child(parent, self.container)?;
		scene.set_anchor(self.container, Some(anchor));
		self.anchor = Some(anchor);
		Ok(())
	}

	/// Detaches from the current anchor, keeping every graphic alive.
	pub fn disconnect(&mut self, scene: &mut Scene) {
		scene.remove_from_parent(self.container);
		scene.set_anchor(self.container, None);
		self.anchor = None;
	}

	/// Destroys the container and everything in it.
	pub fn destroy(self, scene: &mut Scene) {
		scene.destroy_tree(self.container);
	}

	/// Bows line channels sideways; see [`GraphicsObject::bend`](super::scene::GraphicsObject::bend).
	pub fn set_bend(&self, scene: &mut Scene, bend: f64) {
		if let Some(c) = scene.get_mut(self.container) {
			c.bend = bend;
		}
	}

	/// Shows or hides one membership.
	pub fn set_channel_active(&self, scene: &mut Scene, category: &str, value: &str, active: bool) {
		if let Some(obj) = self.channel(category, value).and_then(|g| scene.get_mut(g)) {
			obj.visible = active;
		}
	}

	/// Repaints one membership.
	pub fn set_channel_color(&self, scene: &mut Scene, category: &str, value: &str, color: Color) {
		if let Some(obj) = self.channel(category, value).and_then(|g| scene.get_mut(g)) {
			obj.tint = color;
		}
	}

	/// Backdrop disc drawn first, creating it on first use.
	pub fn set_background(&mut self, scene: &mut Scene, color: Color) {
		let background = match self.background.filter(|b| scene.is_alive(*b)) {
			Some(b) => b,
			None => {
				let b = scene.create(GraphicsKind::Circle);
				if let Some(obj) = scene.get_mut(b) {
					obj.owner = Some(self.owner.clone());
				}
				if let Err(err) = scene.add_child_at(self.container, b, 0) {
					warn!("{}: background not attached: {err}", self.owner);
				}
				self.background = Some(b);
				b
			}
		};
		if let Some(obj) = scene.get_mut(background) {
			obj.tint = color;
		}
	}

	/// Image sprite drawn last, creating it on first use.
	pub fn set_icon(&mut self, scene: &mut Scene, texture: &str) {
		let icon = match self.icon.filter(|i| scene.is_alive(*i)) {
			Some(i) => i,
			None => {
				let i = scene.create(GraphicsKind::Sprite);
				if let Some(obj) = scene.get_mut(i) {
					obj.owner = Some(self.owner.clone());
				}
				let _ = scene.add_child(self.container, i);
				self.icon = Some(i);
				i
			}
		};
		if let Some(obj) = scene.get_mut(icon) {
			obj.texture = Some(texture.to_owned());
		}
	}

	/// Backdrop disc, when the opacity layer is on.
	pub fn background(&self) -> Option<GraphicsId> {
		self.background
	}

	/// The sprite, once an image has loaded.
	pub fn icon(&self) -> Option<GraphicsId> {
		self.icon
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn channel(category: &str, value: &str) -> Channel {
		Channel {
			category: category.to_owned(),
			value: value.to_owned(),
			color: Color::rgb(10, 20, 30),
			active: true,
		}
	}

	#[test]
	fn arcs_split_each_category_evenly() {
		let mut scene = Scene::new();
		let owner = LogicalId::node("a.md");
		let deco = Decoration::create(
			&mut scene,
			&owner,
			ChannelShape::Arc,
			&[channel("tag", "x"), channel("tag", "y"), channel("folder", "notes")],
			&DecorationStyle::default(),
		);
		let y = deco.channel("tag", "y").expect("arc");
		assert_eq!(scene.get(y).expect("arc").span, Some((0.5, 1.0)));
		let folder = deco.channel("folder", "notes").expect("arc");
		assert_eq!(scene.get(folder).expect("arc").span, Some((0.0, 1.0)));
		assert_eq!(deco.channel_count(), 3);
	}

	#[test]
	fn second_owner_on_same_anchor_is_refused() {
		let mut scene = Scene::new();
		let circle = scene.create(GraphicsKind::Circle);
		let style = DecorationStyle {
			background: Some(Color::BLACK),
			icon: None,
		};
		let mut first = Decoration::create(&mut scene, &"a".into(), ChannelShape::Arc, &[], &style);
		let mut second = Decoration::create(&mut scene, &"b".into(), ChannelShape::Arc, &[], &style);

		first.connect(&mut scene, circle, circle).expect("first");
		let err = second.connect(&mut scene, circle, circle).expect_err("conflict");
		assert!(matches!(err, OverlayError::DecorationConflict { .. }));
		assert_eq!(scene.children(circle), &[first.container()]);

		first.connect(&mut scene, circle, circle).expect("reconnect is a no-op");
		assert_eq!(scene.children(circle).len(), 1);
	}

	#[test]
	fn owner_is_seen_after_the_container_moves_to_a_band() {
		let mut scene = Scene::new();
		let stage = scene.create(GraphicsKind::Container);
		let band = scene.create(GraphicsKind::Container);
		let line = scene.create(GraphicsKind::Line);
		scene.add_child(stage, line).expect("attach");
		let style = DecorationStyle::default();
		let mut first = Decoration::create(&mut scene, &"a--to--b".into(), ChannelShape::Segment, &[], &style);
		let mut second = Decoration::create(&mut scene, &"c--to--d".into(), ChannelShape::Segment, &[], &style);

		first.connect(&mut scene, stage, line).expect("first");
		scene.add_child(band, first.container()).expect("layered");
		let err = second.connect(&mut scene, stage, line).expect_err("conflict");
		assert!(matches!(err, OverlayError::DecorationConflict { .. }));
		assert!(scene.parent(second.container()).is_none());

		first.disconnect(&mut scene);
		second.connect(&mut scene, stage, line).expect("free again");
	}

	#[test]
	fn disconnect_keeps_the_graphics() {
		let mut scene = Scene::new();
		let circle = scene.create(GraphicsKind::Circle);
		let mut deco = Decoration::create(
			&mut scene,
			&"a".into(),
			ChannelShape::Arc,
			&[channel("tag", "x")],
			&DecorationStyle::default(),
		);
		deco.connect(&mut scene, circle, circle).expect("connect");
		deco.disconnect(&mut scene);
		assert!(deco.is_alive(&scene));
		assert!(!deco.is_connected(&scene));
		assert!(scene.children(circle).is_empty());

		deco.destroy(&mut scene);
		assert_eq!(scene.len(), 1);
	}
}
