//! Type definitions shared by the layout tree and the drawing sinks
//!
//! All coordinates are in points with the origin at the top-left corner of
//! the page and y growing downwards, which is the space the layout engine
//! measures in.

use serde::Deserialize;

/// Point in page space
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rectangle with position and size
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    #[serde(alias = "w")]
    pub width: f64,
    #[serde(alias = "h")]
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Size with width and height
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Landscape iff strictly wider than tall.
    pub fn orientation(&self) -> Orientation {
        if self.width > self.height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    pub fn swapped(&self) -> Self {
        Self::new(self.height, self.width)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Page-size descriptor as produced by layout
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub orientation: Option<Orientation>,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height, orientation: None }
    }

    /// Declared orientation, or the one implied by the dimensions.
    pub fn orientation(&self) -> Orientation {
        self.orientation
            .unwrap_or_else(|| Size::new(self.width, self.height).orientation())
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Horizontal alignment of an inline or cover-fit image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// Vertical alignment inside a cover-fit box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlignment {
    #[default]
    Top,
    Center,
    Bottom,
}

/// RGB color with components in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb` or `#rrggbb`.
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        let digits = hex.trim_start_matches('#');
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return Err(format!("Invalid hex color '{}'", hex)),
        };
        let channel = |range: std::ops::Range<usize>| {
            expanded
                .get(range)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .map(|v| v as f64 / 255.0)
                .ok_or_else(|| format!("Invalid hex color '{}'", hex))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Parse a hex color or a CSS color keyword.
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value.starts_with('#') {
            return Self::from_hex(value);
        }
        named_color(&value.to_ascii_lowercase())
            .map(|(r, g, b)| Self::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0))
            .ok_or_else(|| format!("Unknown color '{}'", value))
    }

    pub fn black() -> Self {
        Self { r: 0.0, g: 0.0, b: 0.0 }
    }

    pub fn white() -> Self {
        Self { r: 1.0, g: 1.0, b: 1.0 }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value)
    }
}

fn named_color(name: &str) -> Option<(u8, u8, u8)> {
    let rgb = match name {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "cyan" | "aqua" => (0, 255, 255),
        "magenta" | "fuchsia" => (255, 0, 255),
        "gray" | "grey" => (128, 128, 128),
        "silver" => (192, 192, 192),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "darkgray" | "darkgrey" => (169, 169, 169),
        "dimgray" | "dimgrey" => (105, 105, 105),
        "gainsboro" => (220, 220, 220),
        "whitesmoke" => (245, 245, 245),
        "maroon" => (128, 0, 0),
        "olive" => (128, 128, 0),
        "navy" => (0, 0, 128),
        "purple" => (128, 0, 128),
        "teal" => (0, 128, 128),
        "orange" => (255, 165, 0),
        "pink" => (255, 192, 203),
        "brown" => (165, 42, 42),
        "gold" => (255, 215, 0),
        "indigo" => (75, 0, 130),
        "violet" => (238, 130, 238),
        "darkred" => (139, 0, 0),
        "darkgreen" => (0, 100, 0),
        "darkblue" => (0, 0, 139),
        "lightblue" => (173, 216, 230),
        "skyblue" => (135, 206, 235),
        "steelblue" => (70, 130, 180),
        "coral" => (255, 127, 80),
        "salmon" => (250, 128, 114),
        "tomato" => (255, 99, 71),
        "crimson" => (220, 20, 60),
        "beige" => (245, 245, 220),
        "ivory" => (255, 255, 240),
        "khaki" => (240, 230, 140),
        "lavender" => (230, 230, 250),
        "lightyellow" => (255, 255, 224),
        "lightgreen" => (144, 238, 144),
        _ => return None,
    };
    Some(rgb)
}

/// Fill or stroke color as written in the layout tree
///
/// A bare string is a solid color. An array of one or two strings is a
/// pattern marker: the registered pattern name, then an optional tint used
/// by uncolored patterns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Solid(Color),
    Pattern(Vec<String>),
}

impl ColorValue {
    /// Split a pattern marker into its name and optional tint.
    pub fn pattern_marker(&self) -> Option<(&str, Option<Color>)> {
        match self {
            ColorValue::Pattern(parts) if (1..=2).contains(&parts.len()) => {
                let tint = parts.get(1).and_then(|c| Color::parse(c).ok());
                Some((parts[0].as_str(), tint))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_colors() {
        assert_eq!(Color::parse("#ff0000").unwrap(), Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(Color::parse("#0f0").unwrap(), Color::rgb(0.0, 1.0, 0.0));
        assert!(Color::parse("#12345").is_err());
        assert!(Color::parse("#gg0000").is_err());
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(Color::parse("Black").unwrap(), Color::black());
        assert_eq!(Color::parse("white").unwrap(), Color::white());
        assert!(Color::parse("not-a-color").is_err());
    }

    #[test]
    fn test_color_value_deserialize() {
        let solid: ColorValue = serde_json::from_str("\"red\"").unwrap();
        assert_eq!(solid, ColorValue::Solid(Color::rgb(1.0, 0.0, 0.0)));

        let pattern: ColorValue = serde_json::from_str("[\"stripe\", \"#000000\"]").unwrap();
        let (name, tint) = pattern.pattern_marker().unwrap();
        assert_eq!(name, "stripe");
        assert_eq!(tint, Some(Color::black()));
    }

    #[test]
    fn test_orientation() {
        assert_eq!(PageSize::new(842.0, 595.0).orientation(), Orientation::Landscape);
        assert_eq!(PageSize::new(595.0, 842.0).orientation(), Orientation::Portrait);
        let declared = PageSize {
            width: 595.0,
            height: 842.0,
            orientation: Some(Orientation::Landscape),
        };
        assert_eq!(declared.orientation(), Orientation::Landscape);
    }
}
