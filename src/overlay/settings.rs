//! In-memory settings and the view-state snapshot, both JSON via serde.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::color::{Color, Palette};
use super::error::Result;

/// Host engine options carried through a view snapshot untouched.
pub type EngineOptions = serde_json::Map<String, serde_json::Value>;

fn yes() -> bool {
	true
}

/// Configuration of one category manager.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategorySettings {
	/// Source of automatic colours.
	pub palette: Palette,
	/// User colour per value, winning over the palette.
	pub colors: BTreeMap<String, Color>,
	/// Values switched off, including ones not seen yet.
	pub deselected: Vec<String>,
	/// Replaces [`DEFAULT_NONE_VALUE`](super::interactive::DEFAULT_NONE_VALUE).
	pub none_value: Option<String>,
	/// A disabled category gets no manager at all.
	#[serde(default = "yes")]
	pub enabled: bool,
}

impl Default for CategorySettings {
	fn default() -> Self {
		Self {
			palette: Palette::default(),
			colors: BTreeMap::new(),
			deselected: Vec::new(),
			none_value: None,
			enabled: true,
		}
	}
}

/// Decoration switches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Features {
	/// One coloured arc per node membership.
	pub arcs: bool,
	/// Link segments coloured by link type.
	pub link_types: bool,
	/// Background disc behind the node, tinted with the theme background.
	pub opacity_layer: bool,
	/// Node images from metadata.
	pub images: bool,
	/// Shared outline container for a link and its reverse.
	pub outlines: bool,
	/// Rewrite the host's node tint to the first active membership colour.
	pub force_node_color: Option<String>,
	/// Rewrite the host's link tint to the link-type colour.
	pub force_link_color: bool,
}

impl Default for Features {
	fn default() -> Self {
		Self {
			arcs: true,
			link_types: true,
			opacity_layer: false,
			images: false,
			outlines: false,
			force_node_color: None,
			force_link_color: true,
		}
	}
}

/// Direction bands are ranked in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum LayerOrder {
	#[default]
	Ascending,
	Descending,
}

/// How elements are banded by level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerSettings {
	/// Layer on graph ready.
	pub enabled: bool,
	/// Bands visible at once, the current one included.
	pub window_size: usize,
	#[allow(missing_docs)]
	pub order: LayerOrder,
	/// Opacity by window shift, 0 being the current band. Shifts in between
	/// are interpolated linearly.
	pub custom_opacity: BTreeMap<i32, f64>,
	/// Frontmatter keys checked in order; the first one with a value wins.
	pub property_keys: Vec<String>,
	/// Level for elements without a value; `None` leaves them unassigned.
	pub default_level: Option<i32>,
	/// Label of the unassigned band.
	pub unassigned_label: String,
}

impl Default for LayerSettings {
	fn default() -> Self {
		Self {
			enabled: false,
			window_size: 3,
			order: LayerOrder::Ascending,
			custom_opacity: BTreeMap::new(),
			property_keys: vec!["layer".to_owned()],
			default_level: None,
			unassigned_label: "Not in any layer".to_owned(),
		}
	}
}

/// A pinned position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

/// A named snapshot of toggles, pins and the layer window.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewState {
	#[allow(missing_docs)]
	pub id: String,
	/// Shown to the user.
	pub name: String,
	/// Deselected values per category.
	pub toggle_types: BTreeMap<String, Vec<String>>,
	/// Pinned node paths.
	pub pin_nodes: BTreeMap<String, Point>,
	#[allow(missing_docs)]
	pub engine_options: EngineOptions,
	/// Front of the layer window when saved.
	pub current_layer_level: Option<i32>,
}

/// Everything configurable, persisted as one JSON document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlaySettings {
	/// Keyed `tag`, `folder`, `link` or `property:<name>`.
	pub categories: BTreeMap<String, CategorySettings>,
	#[allow(missing_docs)]
	pub features: Features,
	#[allow(missing_docs)]
	pub layers: LayerSettings,
	/// Syncs an identity may be missing before it is deactivated.
	pub absent_grace_ticks: u32,
	/// Saved views.
	pub views: Vec<ViewState>,
}

impl Default for OverlaySettings {
	fn default() -> Self {
		let categories = ["tag", "link"]
			.into_iter()
			.map(|key| (key.to_owned(), CategorySettings::default()))
			.collect();
		Self {
			categories,
			features: Features::default(),
			layers: LayerSettings::default(),
			absent_grace_ticks: 0,
			views: Vec::new(),
		}
	}
}

impl OverlaySettings {
	/// Missing fields take their defaults.
	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}

	/// Pretty-printed.
	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string_pretty(self)?)
	}

	/// Settings for `key`, defaults when unconfigured.
	pub fn category(&self, key: &str) -> CategorySettings {
		self.categories.get(key).cloned().unwrap_or_default()
	}

	/// Stores `view`, replacing a saved view with the same id.
	pub fn upsert_view(&mut self, view: ViewState) {
		match self.views.iter_mut().find(|v| v.id == view.id) {
			Some(existing) => *existing = view,
			None => self.views.push(view),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_json_falls_back_to_defaults() {
		let settings = OverlaySettings::from_json(
			r##"{
				"categories": { "folder": { "palette": "category10", "colors": { "inbox": "#ff0000" } } },
				"layers": { "enabled": true, "windowSize": 2, "customOpacity": { "1": 0.5 } }
			}"##,
		)
		.expect("settings");

		let folder = settings.category("folder");
		assert_eq!(folder.palette, Palette::Category10);
		assert_eq!(folder.colors.get("inbox"), Some(&Color::rgb(255, 0, 0)));
		assert!(folder.enabled);
		assert!(settings.layers.enabled);
		assert_eq!(settings.layers.window_size, 2);
		assert_eq!(settings.layers.custom_opacity.get(&1), Some(&0.5));
		assert_eq!(settings.layers.property_keys, vec!["layer".to_owned()]);
		assert!(settings.features.arcs);
	}

	#[test]
	fn view_state_uses_camel_case_keys() {
		let view: ViewState = serde_json::from_str(
			r#"{
				"id": "v1",
				"name": "Focus",
				"toggleTypes": { "tag": ["draft"] },
				"pinNodes": { "a.md": { "x": 1.0, "y": -2.0 } },
				"engineOptions": { "repelStrength": 10 },
				"currentLayerLevel": 2
			}"#,
		)
		.expect("view");
		assert_eq!(view.toggle_types["tag"], vec!["draft".to_owned()]);
		assert_eq!(view.pin_nodes["a.md"], Point { x: 1.0, y: -2.0 });
		assert_eq!(view.current_layer_level, Some(2));
		assert!(view.engine_options.contains_key("repelStrength"));
	}

	#[test]
	fn settings_survive_a_json_round_trip() {
		let mut settings = OverlaySettings::default();
		settings.features.force_node_color = Some("tag".to_owned());
		settings.layers.order = LayerOrder::Descending;
		settings.upsert_view(ViewState {
			id: "v1".to_owned(),
			..ViewState::default()
		});
		let json = settings.to_json().expect("json");
		assert!(json.contains("\"forceNodeColor\": \"tag\""));
		assert_eq!(OverlaySettings::from_json(&json).expect("settings"), settings);
	}

	#[test]
	fn malformed_json_is_a_settings_error() {
		let err = OverlaySettings::from_json("{ nope").expect_err("invalid");
		assert!(err.to_string().starts_with("invalid overlay settings"));
	}
}
