//! Render configuration
//!
//! Options are plain serde structs so callers can keep them next to the
//! layout JSON. Every field has a default; an empty object is a valid
//! configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{RendererError, RendererResult};
use crate::font_registry::FontStyle;
use crate::types::Size;

/// A4 portrait in points.
pub const DEFAULT_PAGE_SIZE: Size = Size { width: 595.28, height: 841.89 };

/// File paths for the four faces of one family
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FontDescriptor {
    pub normal: Option<String>,
    pub bold: Option<String>,
    pub italics: Option<String>,
    pub bolditalics: Option<String>,
}

impl FontDescriptor {
    pub fn path(&self, style: FontStyle) -> Option<&str> {
        match style {
            FontStyle::Normal => self.normal.as_deref(),
            FontStyle::Bold => self.bold.as_deref(),
            FontStyle::Italics => self.italics.as_deref(),
            FontStyle::BoldItalics => self.bolditalics.as_deref(),
        }
    }
}

/// Family name to face files, the same shape as the layout engine's font dictionary.
pub type FontDescriptors = BTreeMap<String, FontDescriptor>;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// Family used for SVG text whose font-family list matches nothing registered.
    pub default_font: String,
    pub fonts: FontDescriptors,
    /// Register Helvetica, Times and Courier backed by built-in metrics.
    pub standard_fonts: bool,
    pub svg_raster_dpi: f64,
    /// Size of the first page before any orientation swap.
    pub page_size: Size,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            default_font: "Roboto".to_string(),
            fonts: FontDescriptors::new(),
            standard_fonts: true,
            svg_raster_dpi: 300.0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RenderOptions {
    pub fn from_json(json: &str) -> RendererResult<Self> {
        let options: RenderOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> RendererResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> RendererResult<()> {
        if self.svg_raster_dpi <= 0.0 {
            return Err(RendererError::InvalidValue(
                "svgRasterDpi".to_string(),
                self.svg_raster_dpi.to_string(),
            ));
        }
        if self.page_size.width <= 0.0 || self.page_size.height <= 0.0 {
            return Err(RendererError::InvalidValue(
                "pageSize".to_string(),
                format!("{}x{}", self.page_size.width, self.page_size.height),
            ));
        }
        Ok(())
    }
}
