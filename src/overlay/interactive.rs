//! Per-category registry of values, colours and active state.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;

use super::color::{Color, Palette};
use super::events::{EventBus, ListenerId};
use super::settings::CategorySettings;

/// Value given to elements with nothing in a category.
pub const DEFAULT_NONE_VALUE: &str = "none";

/// One manager per category key, shared by every element of the graph.
pub type Managers = BTreeMap<String, InteractiveManager>;

/// Something changed in one manager; drained by the graph instance.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum ManagerEvent {
	TypesAdded {
		category: String,
		values: Vec<String>,
	},
	TypesRemoved {
		category: String,
		values: Vec<String>,
	},
	ColorsChanged {
		category: String,
		colors: Vec<(String, Color)>,
	},
	Toggled {
		category: String,
		value: String,
		active: bool,
	},
}

/// Values are kept in slots. A removed value frees its slot and the next new
/// value reuses it, so unrelated values keep their colours. Only growing the
/// slot count re-indexes the auto-assigned colours.
#[derive(Debug)]
pub struct InteractiveManager {
	category: String,
	palette: Palette,
	none_value: String,
	slots: Vec<Option<String>>,
	slot_of: HashMap<String, usize>,
	colors: HashMap<String, Color>,
	overrides: HashMap<String, Color>,
	active: HashSet<String>,
	deselected: HashSet<String>,
	events: EventBus<ManagerEvent>,
}

impl InteractiveManager {
	/// An empty manager for `category`, configured by `settings`.
	pub fn new(category: impl Into<String>, settings: &CategorySettings) -> Self {
		Self {
			category: category.into(),
			palette: settings.palette.clone(),
			none_value: settings
				.none_value
				.clone()
				.unwrap_or_else(|| DEFAULT_NONE_VALUE.to_owned()),
			slots: Vec::new(),
			slot_of: HashMap::new(),
			colors: HashMap::new(),
			overrides: settings.colors.clone().into_iter().collect(),
			active: HashSet::new(),
			deselected: settings.deselected.iter().cloned().collect(),
			events: EventBus::new(),
		}
	}

	#[allow(missing_docs)]
	pub fn category(&self) -> &str {
		&self.category
	}

	/// Sentinel for elements with no value here.
	pub fn none_value(&self) -> &str {
		&self.none_value
	}

	#[allow(missing_docs)]
	pub fn palette(&self) -> &Palette {
		&self.palette
	}

	/// Known and holding a slot.
	pub fn contains(&self, value: &str) -> bool {
		self.slot_of.contains_key(value)
	}

	/// Known values in slot order.
	pub fn types(&self) -> impl Iterator<Item = &str> {
		self.slots.iter().filter_map(|s| s.as_deref())
	}

	/// Number of known values.
	pub fn len(&self) -> usize {
		self.slot_of.len()
	}

	/// No known values.
	pub fn is_empty(&self) -> bool {
		self.slot_of.is_empty()
	}

	/// Known and switched on.
	pub fn is_active(&self, value: &str) -> bool {
		self.active.contains(value)
	}

	/// Grey for unknown values.
	pub fn color(&self, value: &str) -> Color {
		self.try_color(value).unwrap_or(Color::GREY)
	}

	/// Current colour, override or automatic.
	pub fn try_color(&self, value: &str) -> Option<Color> {
		self.colors.get(value).copied()
	}

	/// Values the user deselected, whether or not they have been seen yet.
	pub fn deselected(&self) -> impl Iterator<Item = &str> {
		self.deselected.iter().map(String::as_str)
	}

	/// Single-value [`add_types`](Self::add_types).
	pub fn add_type(&mut self, value: &str) {
		self.add_types([value]);
	}

	/// Registers new values; known ones are skipped.
	pub fn add_types<'a>(&mut self, values: impl IntoIterator<Item = &'a str>) {
		let mut added = Vec::new();
		let mut grew = false;
		for value in values {
			if self.slot_of.contains_key(value) || added.iter().any(|v: &String| v == value) {
				continue;
			}
			let slot = match self.slots.iter().position(Option::is_none) {
				Some(free) => {
					self.slots[free] = Some(value.to_owned());
					free
				}
				None => {
					grew = true;
					self.slots.push(Some(value.to_owned()));
					self.slots.len() - 1
				}
			};
			self.slot_of.insert(value.to_owned(), slot);
			if !self.deselected.contains(value) {
				self.active.insert(value.to_owned());
			}
			added.push(value.to_owned());
		}
		if added.is_empty() {
			return;
		}

		let recolor: Vec<String> = if grew {
			self.slots.iter().flatten().cloned().collect()
		} else {
			added.clone()
		};
		self.events.emit(ManagerEvent::TypesAdded {
			category: self.category.clone(),
			values: added,
		});
		self.recolor(recolor);
	}

	/// Forgets values and frees their slots. Unknown values are skipped.
	pub fn remove_types<'a>(&mut self, values: impl IntoIterator<Item = &'a str>) {
		let mut removed = Vec::new();
		for value in values {
			let Some(slot) = self.slot_of.remove(value) else {
				continue;
			};
			self.slots[slot] = None;
			self.colors.remove(value);
			self.active.remove(value);
			removed.push(value.to_owned());
		}
		if self.slot_of.is_empty() {
			self.slots.clear();
		}
		if !removed.is_empty() {
			self.events.emit(ManagerEvent::TypesRemoved {
				category: self.category.clone(),
				values: removed,
			});
		}
	}

	/// User override; sticks across re-indexing.
	pub fn set_color(&mut self, value: &str, color: Color) {
		if !self.contains(value) {
			debug!("{}: set_color on unknown value `{value}` ignored", self.category);
			return;
		}
		self.overrides.insert(value.to_owned(), color);
		self.recolor(vec![value.to_owned()]);
	}

	/// Drops a user override, going back to the palette colour.
	pub fn reset_color(&mut self, value: &str) {
		if self.overrides.remove(value).is_some() && self.contains(value) {
			self.recolor(vec![value.to_owned()]);
		}
	}

	/// Recolours every value without an override.
	pub fn set_palette(&mut self, palette: Palette) {
		self.palette = palette;
		let all = self.slots.iter().flatten().cloned().collect();
		self.recolor(all);
	}

	/// Switches `value` on and clears its deselection.
	pub fn enable(&mut self, value: &str) {
		self.deselected.remove(value);
		self.toggle(value, true);
	}

	/// Switches `value` off and remembers it as deselected.
	pub fn disable(&mut self, value: &str) {
		if self.contains(value) {
			self.deselected.insert(value.to_owned());
		}
		self.toggle(value, false);
	}

	#[allow(missing_docs)]
	pub fn enable_all(&mut self) {
		let values: Vec<String> = self.slots.iter().flatten().cloned().collect();
		for value in values {
			self.enable(&value);
		}
	}

	#[allow(missing_docs)]
	pub fn disable_all(&mut self) {
		let values: Vec<String> = self.slots.iter().flatten().cloned().collect();
		for value in values {
			self.disable(&value);
		}
	}

	/// Replaces the deselection preference and toggles known values to match.
	pub fn set_deselected<'a>(&mut self, values: impl IntoIterator<Item = &'a str>) {
		self.deselected = values.into_iter().map(str::to_owned).collect();
		let known: Vec<String> = self.slots.iter().flatten().cloned().collect();
		for value in known {
			let wanted = !self.deselected.contains(&value);
			self.toggle(&value, wanted);
		}
	}

	/// Listener called synchronously on every event.
	pub fn subscribe(&mut self, listener: impl FnMut(&ManagerEvent) + 'static) -> ListenerId {
		self.events.subscribe(listener)
	}

	#[allow(missing_docs)]
	pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
		self.events.unsubscribe(id)
	}

	/// Events since the last drain, oldest first.
	pub fn drain_events(&mut self) -> Vec<ManagerEvent> {
		self.events.drain()
	}

	fn toggle(&mut self, value: &str, active: bool) {
		if !self.contains(value) {
			debug!("{}: toggle on unknown value `{value}` ignored", self.category);
			return;
		}
		let changed = if active {
			self.active.insert(value.to_owned())
		} else {
			self.active.remove(value)
		};
		if changed {
			self.events.emit(ManagerEvent::Toggled {
				category: self.category.clone(),
				value: value.to_owned(),
				active,
			});
		}
	}

	fn slot_color(&self, slot: usize) -> Color {
		self.palette.sample(slot as f64 / self.slots.len().max(1) as f64)
	}

	fn recolor(&mut self, values: Vec<String>) {
		let mut changed = Vec::new();
		for value in values {
			let Some(&slot) = self.slot_of.get(&value) else {
				continue;
			};
			let color = self
				.overrides
				.get(&value)
				.copied()
				.unwrap_or_else(|| self.slot_color(slot));
			if self.colors.insert(value.clone(), color) != Some(color) {
				changed.push((value, color));
			}
		}
		if !changed.is_empty() {
			self.events.emit(ManagerEvent::ColorsChanged {
				category: self.category.clone(),
				colors: changed,
			});
		}
	}
}
