//! Override table for property writes on host-owned graphics.
//!
//! The host keeps writing its own values every frame. A registration sits in
//! front of one `(target, property)` pair and decides, first match wins, what
//! actually lands on the object.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use super::color::Color;
use super::identity::LogicalId;
use super::scene::GraphicsId;

/// Host-written properties an override can sit in front of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Property {
	Tint,
	Alpha,
	Visible,
	Rotation,
}

/// A value on its way to a [`Property`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
	/// Tints.
	Color(Color),
	/// Alpha and rotation.
	Number(f64),
	/// Visibility.
	Flag(bool),
}

impl PropertyValue {
	/// The number inside, if this is one.
	pub fn as_number(&self) -> Option<f64> {
		match self {
			PropertyValue::Number(v) => Some(*v),
			_ => None,
		}
	}
}

type Predicate = Box<dyn Fn(&PropertyValue) -> bool>;
type Rewrite = Box<dyn Fn(&PropertyValue) -> PropertyValue>;

/// What a matching override does with the write.
pub enum OverrideAction {
	/// Drop the write; the object keeps its old value.
	Suppress,
	/// Replace the value.
	Rewrite(Rewrite),
	/// Let the value through untouched and stop the chain.
	PassThrough,
}

/// One predicate/action pair in a chain.
pub struct Override {
	name: &'static str,
	predicate: Predicate,
	action: OverrideAction,
}

impl Override {
	/// Replaces matching values with `rewrite(value)`.
	pub fn rewrite(
		name: &'static str,
		predicate: impl Fn(&PropertyValue) -> bool + 'static,
		rewrite: impl Fn(&PropertyValue) -> PropertyValue + 'static,
	) -> Self {
		Self {
			name,
			predicate: Box::new(predicate),
			action: OverrideAction::Rewrite(Box::new(rewrite)),
		}
	}

	/// Drops matching writes.
	pub fn suppress(name: &'static str, predicate: impl Fn(&PropertyValue) -> bool + 'static) -> Self {
		Self {
			name,
			predicate: Box::new(predicate),
			action: OverrideAction::Suppress,
		}
	}

	/// Lets matching writes through unchanged, shadowing later overrides.
	pub fn pass(name: &'static str, predicate: impl Fn(&PropertyValue) -> bool + 'static) -> Self {
		Self {
			name,
			predicate: Box::new(predicate),
			action: OverrideAction::PassThrough,
		}
	}

	/// Label used in logs.
	pub fn name(&self) -> &'static str {
		self.name
	}
}

impl fmt::Debug for Override {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let action = match self.action {
			OverrideAction::Suppress => "suppress",
			OverrideAction::Rewrite(_) => "rewrite",
			OverrideAction::PassThrough => "pass",
		};
		f.debug_struct("Override")
			.field("name", &self.name)
			.field("action", &action)
			.finish()
	}
}

#[derive(Debug)]
struct Chain {
	owner: LogicalId,
	overrides: Vec<Override>,
}

/// Outcome of [`InterceptorRegistry::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
	/// The chain is now active.
	Installed,
	/// Another chain already holds the pair, or the target is gone. Nothing changed.
	AlreadyRegistered,
}

/// At most one override chain per `(target, property)`.
#[derive(Debug, Default)]
pub struct InterceptorRegistry {
	chains: HashMap<(GraphicsId, Property), Chain>,
}

impl InterceptorRegistry {
	/// A second registration on the same pair is refused rather than nested.
	pub fn register(
		&mut self,
		target: GraphicsId,
		property: Property,
		owner: &LogicalId,
		overrides: Vec<Override>,
	) -> Registration {
		if let Some(chain) = self.chains.get(&(target, property)) {
			debug!(
				"interceptor on {target:?}.{property:?} already held by `{}`, `{owner}` refused",
				chain.owner
			);
			return Registration::AlreadyRegistered;
		}
		self.chains.insert(
			(target, property),
			Chain {
				owner: owner.clone(),
				overrides,
			},
		);
		Registration::Installed
	}

	/// Drops every chain on `target`; returns how many were removed.
	pub fn unregister(&mut self, target: GraphicsId) -> usize {
		let before = self.chains.len();
		self.chains.retain(|(t, _), _| *t != target);
		before - self.chains.len()
	}

	/// Drops one chain, restoring plain passthrough for that property.
	pub fn unregister_property(&mut self, target: GraphicsId, property: Property) -> bool {
		self.chains.remove(&(target, property)).is_some()
	}

	/// True while a chain sits on the pair.
	pub fn is_registered(&self, target: GraphicsId, property: Property) -> bool {
		self.chains.contains_key(&(target, property))
	}

	/// Element that installed the chain on the pair.
	pub fn owner(&self, target: GraphicsId, property: Property) -> Option<&LogicalId> {
		self.chains.get(&(target, property)).map(|c| &c.owner)
	}

	/// Installed chains.
	pub fn len(&self) -> usize {
		self.chains.len()
	}

	/// True when nothing is intercepted.
	pub fn is_empty(&self) -> bool {
		self.chains.is_empty()
	}

	/// Runs a host write through the chain. `None` means the write is dropped.
	pub fn apply(
		&self,
		target: GraphicsId,
		property: Property,
		value: PropertyValue,
	) -> Option<PropertyValue> {
		let Some(chain) = self.chains.get(&(target, property)) else {
			return Some(value);
		};
		for o in &chain.overrides {
			if !(o.predicate)(&value) {
				continue;
			}
			return match &o.action {
				OverrideAction::Suppress => None,
				OverrideAction::Rewrite(f) => Some(f(&value)),
				OverrideAction::PassThrough => Some(value),
			};
		}
		Some(value)
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;
	use std::rc::Rc;

	use super::*;
	use crate::overlay::scene::{GraphicsKind, Scene};

	fn clamp_alpha(max: f64) -> Override {
		Override::rewrite(
			"clamp alpha",
			move |v| v.as_number().is_some_and(|a| a > max),
			move |_| PropertyValue::Number(max),
		)
	}

	#[test]
	fn first_matching_override_wins() {
		let mut registry = InterceptorRegistry::default();
		let target = Scene::new().create(GraphicsKind::Circle);
		let owner = LogicalId::node("a.md");
		let forced = Rc::new(Cell::new(Color::rgb(9, 9, 9)));
		let cell = forced.clone();
		registry.register(
			target,
			Property::Tint,
			&owner,
			vec![
				Override::pass("keep white", |v| *v == PropertyValue::Color(Color::WHITE)),
				Override::rewrite("force color", |_| true, move |_| PropertyValue::Color(cell.get())),
			],
		);

		let white = PropertyValue::Color(Color::WHITE);
		assert_eq!(registry.apply(target, Property::Tint, white), Some(white));
		assert_eq!(
			registry.apply(target, Property::Tint, PropertyValue::Color(Color::BLACK)),
			Some(PropertyValue::Color(Color::rgb(9, 9, 9)))
		);
		forced.set(Color::rgb(1, 1, 1));
		assert_eq!(
			registry.apply(target, Property::Tint, PropertyValue::Color(Color::BLACK)),
			Some(PropertyValue::Color(Color::rgb(1, 1, 1)))
		);
		assert_eq!(
			registry.apply(target, Property::Alpha, PropertyValue::Number(0.8)),
			Some(PropertyValue::Number(0.8))
		);
	}

	#[test]
	fn double_registration_keeps_one_chain() {
		let mut registry = InterceptorRegistry::default();
		let target = Scene::new().create(GraphicsKind::Arrow);
		let a = LogicalId::node("a.md");
		let b = LogicalId::node("b.md");

		assert_eq!(
			registry.register(target, Property::Alpha, &a, vec![clamp_alpha(0.5)]),
			Registration::Installed
		);
		assert_eq!(
			registry.register(target, Property::Alpha, &b, vec![clamp_alpha(0.1)]),
			Registration::AlreadyRegistered
		);
		assert_eq!(registry.len(), 1);
		assert_eq!(registry.owner(target, Property::Alpha), Some(&a));
		assert_eq!(
			registry.apply(target, Property::Alpha, PropertyValue::Number(1.0)),
			Some(PropertyValue::Number(0.5))
		);

		assert_eq!(registry.unregister(target), 1);
		assert_eq!(
			registry.apply(target, Property::Alpha, PropertyValue::Number(1.0)),
			Some(PropertyValue::Number(1.0))
		);
		assert_eq!(
			registry.register(target, Property::Alpha, &b, vec![clamp_alpha(0.1)]),
			Registration::Installed
		);
	}

	#[test]
	fn suppression_drops_the_write() {
		let mut scene = Scene::new();
		let arrow = scene.create(GraphicsKind::Arrow);
		let owner = LogicalId::link("a", "b");
		scene.intercept(
			arrow,
			Property::Visible,
			&owner,
			vec![Override::suppress("hidden arrow", |v| *v == PropertyValue::Flag(true))],
		);
		scene.write(arrow, Property::Visible, PropertyValue::Flag(false));
		scene.write(arrow, Property::Visible, PropertyValue::Flag(true));
		assert!(!scene.get(arrow).expect("arrow").visible);
	}

	#[test]
	fn destroying_the_target_releases_its_chains() {
		let mut scene = Scene::new();
		let circle = scene.create(GraphicsKind::Circle);
		let owner = LogicalId::node("a.md");
		scene.intercept(circle, Property::Alpha, &owner, vec![clamp_alpha(0.2)]);
		scene.intercept(circle, Property::Tint, &owner, vec![]);
		assert_eq!(scene.interceptors().len(), 2);

		scene.destroy(circle);
		assert!(scene.interceptors().is_empty());
	}
}
