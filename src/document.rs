//! Laid-out document tree
//!
//! The shape the upstream layout engine hands over: pages of positioned
//! render items, named fill patterns and the page-reference table that
//! deferred page numbers are resolved against.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{RendererError, RendererResult};
use crate::image::{ImageItem, Watermark};
use crate::line::TextLine;
use crate::sink::{DrawingSink, Paint, PatternId, PatternSpec};
use crate::svg::SvgItem;
use crate::types::{ColorValue, PageSize, Rect};
use crate::vector::VectorShape;

/// Named destination to resolved 1-based page number, filled by layout.
pub type PageReferences = HashMap<String, usize>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub pages: Vec<Page>,
    #[serde(default)]
    pub patterns: BTreeMap<String, PatternSpec>,
    #[serde(default)]
    pub page_references: PageReferences,
}

impl Document {
    pub fn from_json(json: &str) -> RendererResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn total_items(&self) -> usize {
        self.pages.iter().map(|p| p.items.len()).sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_size: PageSize,
    #[serde(default)]
    pub items: Vec<RenderItem>,
    #[serde(default)]
    pub watermark: Option<Watermark>,
}

/// One paintable unit; order within a page is paint order
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawItem")]
pub enum RenderItem {
    Vector(VectorShape),
    Line(TextLine),
    Image(ImageItem),
    Svg(SvgItem),
    BeginClip(Rect),
    EndClip,
    /// Unknown tag, kept so item counts match the layout.
    Unsupported(String),
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    item: Value,
}

impl TryFrom<RawItem> for RenderItem {
    type Error = String;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        let parse_err = |e: serde_json::Error| format!("{} item: {}", raw.kind, e);
        let item = match raw.kind.as_str() {
            "vector" => RenderItem::Vector(serde_json::from_value(raw.item).map_err(parse_err)?),
            "line" => RenderItem::Line(serde_json::from_value(raw.item).map_err(parse_err)?),
            "image" => RenderItem::Image(serde_json::from_value(raw.item).map_err(parse_err)?),
            "svg" => RenderItem::Svg(serde_json::from_value(raw.item).map_err(parse_err)?),
            "beginClip" => RenderItem::BeginClip(serde_json::from_value(raw.item).map_err(parse_err)?),
            "endClip" => RenderItem::EndClip,
            other => {
                debug!("Keeping unsupported render item '{}'", other);
                RenderItem::Unsupported(other.to_string())
            }
        };
        Ok(item)
    }
}

/// Pattern names registered with the sink for one document
#[derive(Debug, Clone, Default)]
pub struct PatternRegistry {
    handles: HashMap<String, PatternId>,
}

impl PatternRegistry {
    /// Register every pattern once, in name order.
    pub fn register(
        patterns: &BTreeMap<String, PatternSpec>,
        sink: &mut dyn DrawingSink,
    ) -> RendererResult<Self> {
        let mut handles = HashMap::with_capacity(patterns.len());
        for (name, spec) in patterns {
            handles.insert(name.clone(), sink.register_pattern(spec)?);
        }
        Ok(Self { handles })
    }

    pub fn get(&self, name: &str) -> Option<PatternId> {
        self.handles.get(name).copied()
    }

    /// Resolve a layout color into a sink paint, substituting pattern markers.
    pub fn resolve(&self, color: &ColorValue) -> RendererResult<Paint> {
        match color {
            ColorValue::Solid(color) => Ok(Paint::Solid(*color)),
            ColorValue::Pattern(parts) => {
                let (name, tint) = color.pattern_marker().ok_or_else(|| {
                    RendererError::InvalidValue("color".to_string(), format!("{:?}", parts))
                })?;
                let id = self
                    .get(name)
                    .ok_or_else(|| RendererError::InvalidValue("pattern".to_string(), name.to_string()))?;
                Ok(Paint::Pattern { id, tint })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Command, RecordingSink};
    use crate::types::{Color, Size};

    #[test]
    fn test_parse_document() {
        let document = Document::from_json(
            r#"{
                "pages": [
                    {
                        "pageSize": {"width": 595, "height": 842, "orientation": "portrait"},
                        "items": [
                            {"type": "beginClip", "item": {"x": 0, "y": 0, "width": 100, "height": 50}},
                            {"type": "vector", "item": {"type": "line", "x1": 0, "y1": 0, "x2": 1, "y2": 1}},
                            {"type": "endClip"},
                            {"type": "qrCode", "item": {"text": "x"}}
                        ]
                    }
                ],
                "pageReferences": {"intro": 3}
            }"#,
        )
        .unwrap();

        assert_eq!(document.total_items(), 4);
        let items = &document.pages[0].items;
        assert_eq!(items[0], RenderItem::BeginClip(Rect::new(0.0, 0.0, 100.0, 50.0)));
        assert!(matches!(items[1], RenderItem::Vector(_)));
        assert_eq!(items[2], RenderItem::EndClip);
        assert_eq!(items[3], RenderItem::Unsupported("qrCode".to_string()));
        assert_eq!(document.page_references["intro"], 3);
    }

    #[test]
    fn test_malformed_item_is_an_error() {
        let parsed = Document::from_json(
            r#"{"pages": [{"pageSize": {"width": 1, "height": 1}, "items": [{"type": "vector", "item": {"x": 1}}]}]}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_pattern_registry() {
        let mut patterns = BTreeMap::new();
        let spec = PatternSpec {
            bbox: [0.0, 0.0, 4.0, 4.0],
            x_step: 4.0,
            y_step: 4.0,
            pattern: "0 0 2 2 re f".to_string(),
            colored: false,
        };
        patterns.insert("b".to_string(), spec.clone());
        patterns.insert("a".to_string(), spec);

        let mut sink = RecordingSink::new(Size::new(10.0, 10.0));
        let registry = PatternRegistry::register(&patterns, &mut sink).unwrap();
        assert_eq!(sink.commands, vec![Command::RegisterPattern(0), Command::RegisterPattern(1)]);
        assert_eq!(registry.get("a"), Some(0));
        assert_eq!(registry.get("b"), Some(1));

        let marker = ColorValue::Pattern(vec!["b".to_string(), "#ffffff".to_string()]);
        assert_eq!(
            registry.resolve(&marker).unwrap(),
            Paint::Pattern { id: 1, tint: Some(Color::white()) }
        );
        let too_long = ColorValue::Pattern(vec!["a".into(), "b".into(), "c".into()]);
        assert!(registry.resolve(&too_long).is_err());
    }
}
