//! Styled text runs.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Serialized value of a color component that was never set.
pub const UNSET_COMPONENT: f32 = -1.0;

/// Fill color of a text run.
///
/// Serialized as three flat `red`/`green`/`blue` fields. `Unset` is written as
/// `-1` in all three fields and renders with the engine's default (black).
/// A mix of set and unset components cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TextColor {
    /// No color state was recorded.
    #[default]
    Unset,
    /// Normalized RGB, each component in `[0, 1]`.
    Rgb { red: f32, green: f32, blue: f32 },
}

impl TextColor {
    /// Black, the fallback for any failed color conversion.
    pub const BLACK: TextColor = TextColor::Rgb {
        red: 0.0,
        green: 0.0,
        blue: 0.0,
    };

    /// Create an RGB color, rejecting components outside `[0, 1]`.
    pub fn rgb(red: f32, green: f32, blue: f32) -> Result<Self> {
        for (label, value) in [("red", red), ("green", green), ("blue", blue)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidModel(format!(
                    "color component {} = {} is outside [0, 1]",
                    label, value
                )));
            }
        }
        Ok(TextColor::Rgb { red, green, blue })
    }

    /// Interpret three serialized components, where all three `-1` means unset.
    pub fn from_components(red: f32, green: f32, blue: f32) -> Result<Self> {
        let unset = [red, green, blue].map(|c| c == UNSET_COMPONENT);
        match unset {
            [true, true, true] => Ok(TextColor::Unset),
            [false, false, false] => Self::rgb(red, green, blue),
            _ => Err(Error::InvalidModel(format!(
                "color ({}, {}, {}) mixes unset and set components",
                red, green, blue
            ))),
        }
    }

    /// Components as serialized, `-1` each when unset.
    pub fn components(&self) -> (f32, f32, f32) {
        match *self {
            TextColor::Unset => (UNSET_COMPONENT, UNSET_COMPONENT, UNSET_COMPONENT),
            TextColor::Rgb { red, green, blue } => (red, green, blue),
        }
    }

    /// Whether an explicit color should be emitted when drawing.
    pub fn is_set(&self) -> bool {
        matches!(self, TextColor::Rgb { .. })
    }
}

impl Serialize for TextColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let (red, green, blue) = self.components();
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("red", &red)?;
        map.serialize_entry("green", &green)?;
        map.serialize_entry("blue", &blue)?;
        map.end()
    }
}

fn unset_component() -> f32 {
    UNSET_COMPONENT
}

#[derive(Deserialize)]
struct RawColor {
    #[serde(default = "unset_component")]
    red: f32,
    #[serde(default = "unset_component")]
    green: f32,
    #[serde(default = "unset_component")]
    blue: f32,
}

impl<'de> Deserialize<'de> for TextColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawColor::deserialize(deserializer)?;
        TextColor::from_components(raw.red, raw.green, raw.blue).map_err(D::Error::custom)
    }
}

/// One rendered fragment of text with its style and placement.
///
/// Usually a single glyph; never guaranteed to be a whole word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyledTextRun {
    pub text: String,
    pub font_name: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    #[serde(default)]
    pub underlined: bool,
    #[serde(default)]
    pub strikethrough: bool,
    /// Baseline origin in PDF user space (origin bottom-left).
    pub x: f32,
    pub y: f32,
    /// Advance width.
    pub width: f32,
    pub height: f32,
    #[serde(flatten)]
    pub color: TextColor,
}

impl StyledTextRun {
    /// Create an unstyled run at the origin with no color state.
    pub fn new(text: impl Into<String>, font_name: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_name: font_name.into(),
            font_size,
            bold: false,
            italic: false,
            underlined: false,
            strikethrough: false,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            color: TextColor::Unset,
        }
    }

    /// Set the baseline origin.
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the advance width and height.
    pub fn with_extent(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set bold and italic flags.
    pub fn with_style(mut self, bold: bool, italic: bool) -> Self {
        self.bold = bold;
        self.italic = italic;
        self
    }

    /// Set the fill color.
    pub fn with_color(mut self, color: TextColor) -> Self {
        self.color = color;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_color_serializes_as_sentinel() {
        let run = StyledTextRun::new("A", "Helvetica", 10.0);
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["red"], -1.0);
        assert_eq!(json["green"], -1.0);
        assert_eq!(json["blue"], -1.0);
        assert_eq!(json["fontName"], "Helvetica");
        assert_eq!(json["underlined"], false);
    }

    #[test]
    fn test_missing_color_fields_mean_unset() {
        let json = r#"{"text":"x","fontName":"F","fontSize":9,"bold":true,"italic":false,
            "x":1,"y":2,"width":3,"height":4}"#;
        let run: StyledTextRun = serde_json::from_str(json).unwrap();
        assert_eq!(run.color, TextColor::Unset);
        assert!(!run.underlined);
        assert!(!run.strikethrough);
    }

    #[test]
    fn test_mixed_sentinel_rejected() {
        let json = r#"{"text":"x","fontName":"F","fontSize":9,"bold":false,"italic":false,
            "x":0,"y":0,"width":0,"height":0,"red":-1,"green":0.5,"blue":0.5}"#;
        let result: std::result::Result<StyledTextRun, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(TextColor::rgb(1.5, 0.0, 0.0).is_err());
        assert!(TextColor::rgb(f32::NAN, 0.0, 0.0).is_err());
        assert!(TextColor::from_components(-0.5, -0.5, -0.5).is_err());
    }

    #[test]
    fn test_from_components() {
        assert_eq!(
            TextColor::from_components(-1.0, -1.0, -1.0).unwrap(),
            TextColor::Unset
        );
        assert_eq!(
            TextColor::from_components(0.0, 0.0, 0.0).unwrap(),
            TextColor::BLACK
        );
        assert!(!TextColor::Unset.is_set());
        assert!(TextColor::BLACK.is_set());
    }

    #[test]
    fn test_builder() {
        let run = StyledTextRun::new("Hi", "Times-Bold", 12.0)
            .at(72.0, 700.0)
            .with_extent(10.0, 12.0)
            .with_style(true, false);
        assert_eq!(run.x, 72.0);
        assert_eq!(run.width, 10.0);
        assert!(run.bold);
        assert!(!run.italic);
    }
}
