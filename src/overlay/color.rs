//! Colours and the palettes values are sampled from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The canvas' original categorical colours, kept as the `category10` palette.
const CATEGORY10: &[&str] = &[
	"#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
	"#bcbd22", "#17becf",
];

const HUE_SATURATION: f64 = 0.7;
const HUE_LIGHTNESS: f64 = 0.55;

/// Opaque RGB colour, serialized as `#rrggbb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[allow(missing_docs)]
pub struct Color {
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

#[allow(missing_docs)]
impl Color {
	pub const WHITE: Color = Color::rgb(255, 255, 255);
	pub const BLACK: Color = Color::rgb(0, 0, 0);
	pub const GREY: Color = Color::rgb(127, 127, 127);

	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b }
	}

	/// `hue` in degrees; the other two in `[0, 1]`.
	pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
		let h = hue.rem_euclid(360.0) / 60.0;
		let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
		let x = c * (1.0 - (h % 2.0 - 1.0).abs());
		let (r, g, b) = match h as u32 {
			0 => (c, x, 0.0),
			1 => (x, c, 0.0),
			2 => (0.0, c, x),
			3 => (0.0, x, c),
			4 => (x, 0.0, c),
			_ => (c, 0.0, x),
		};
		let m = lightness - c / 2.0;
		let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
		Self::rgb(channel(r), channel(g), channel(b))
	}

	/// Accepts `#rrggbb` or `rrggbb`.
	pub fn parse_hex(value: &str) -> Option<Self> {
		let hex = value.strip_prefix('#').unwrap_or(value);
		if hex.len() != 6 || !hex.is_ascii() {
			return None;
		}
		let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
		Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
	}

	/// Hue in degrees, `None` for greys.
	pub fn hue(&self) -> Option<f64> {
		let (r, g, b) = (
			self.r as f64 / 255.0,
			self.g as f64 / 255.0,
			self.b as f64 / 255.0,
		);
		let max = r.max(g).max(b);
		let min = r.min(g).min(b);
		let delta = max - min;
		if delta < f64::EPSILON {
			return None;
		}
		let hue = if max == r {
			60.0 * ((g - b) / delta).rem_euclid(6.0)
		} else if max == g {
			60.0 * ((b - r) / delta + 2.0)
		} else {
			60.0 * ((r - g) / delta + 4.0)
		};
		Some(hue)
	}

	/// Canvas fill style at `alpha`.
	pub fn css(&self, alpha: f64) -> String {
		format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
	}
}

impl fmt::Display for Color {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
	}
}

impl TryFrom<String> for Color {
	type Error = String;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse_hex(&value).ok_or_else(|| format!("invalid colour `{value}`"))
	}
}

impl From<Color> for String {
	fn from(value: Color) -> Self {
		value.to_string()
	}
}

/// Where automatic value colours come from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Palette {
	/// Evenly spaced hues.
	#[default]
	LinearHue,
	/// Ten fixed categorical colours.
	Category10,
	/// Dark to light grey.
	Grayscale,
	/// Explicit colours, picked by position.
	Custom(Vec<Color>),
}

impl Palette {
	/// Samples the palette at `t` in `[0, 1)`.
	pub fn sample(&self, t: f64) -> Color {
		let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
		match self {
			Palette::LinearHue => Color::from_hsl(360.0 * t, HUE_SATURATION, HUE_LIGHTNESS),
			Palette::Category10 => {
				let idx = ((t * CATEGORY10.len() as f64) as usize).min(CATEGORY10.len() - 1);
				Color::parse_hex(CATEGORY10[idx]).unwrap_or(Color::GREY)
			}
			Palette::Grayscale => {
				let v = (40.0 + 180.0 * t).round() as u8;
				Color::rgb(v, v, v)
			}
			Palette::Custom(colors) if colors.is_empty() => Color::GREY,
			Palette::Custom(colors) => {
				let idx = ((t * colors.len() as f64) as usize).min(colors.len() - 1);
				colors[idx]
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case(0.0)]
	#[case(120.0)]
	#[case(240.0)]
	#[case(300.0)]
	fn hsl_hue_survives_conversion(#[case] hue: f64) {
		let color = Color::from_hsl(hue, HUE_SATURATION, HUE_LIGHTNESS);
		let back = color.hue().expect("chromatic");
		let diff = (back - hue).abs().min(360.0 - (back - hue).abs());
		assert!(diff < 1.5, "hue {hue} came back as {back}");
	}

	#[test]
	fn hex_parsing_rejects_garbage() {
		assert_eq!(Color::parse_hex("#1f77b4"), Some(Color::rgb(0x1f, 0x77, 0xb4)));
		assert_eq!(Color::parse_hex("1f77b4"), Some(Color::rgb(0x1f, 0x77, 0xb4)));
		assert_eq!(Color::parse_hex("#1f77"), None);
		assert_eq!(Color::parse_hex("#zz77b4"), None);
	}

	#[test]
	fn category10_keeps_original_order() {
		assert_eq!(Palette::Category10.sample(0.0), Color::rgb(0x1f, 0x77, 0xb4));
		assert_eq!(Palette::Category10.sample(0.95), Color::rgb(0x17, 0xbe, 0xcf));
	}

	#[test]
	fn colours_serialize_as_hex() {
		let json = serde_json::to_string(&Color::rgb(255, 0, 16)).expect("serialize");
		assert_eq!(json, "\"#ff0010\"");
		let palette: Palette = serde_json::from_str("\"linear-hue\"").expect("palette");
		assert_eq!(palette, Palette::LinearHue);
	}
}
