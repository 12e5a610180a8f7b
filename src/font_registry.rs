//! Font registry: the font-resolution service the render pass queries
//!
//! Maps a logical family plus bold/italics flags to a loaded [`Font`].
//! Fonts carry what the render pass needs (vertical metrics and advance
//! widths) and what the sinks need to embed them (base-14 name or the
//! TrueType bytes).
use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use ttf_parser::Face;

use crate::config::RenderOptions;
use crate::error::{RendererError, RendererResult};
use crate::font_utils::load_font_file;
use crate::standard_fonts::{StandardFamily, StandardFont};

/// One of the four faces of a family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontStyle {
    Normal,
    Bold,
    Italics,
    BoldItalics,
}

impl FontStyle {
    pub const ALL: [FontStyle; 4] = [
        FontStyle::Normal,
        FontStyle::Bold,
        FontStyle::Italics,
        FontStyle::BoldItalics,
    ];

    pub fn from_flags(bold: bool, italics: bool) -> Self {
        match (bold, italics) {
            (false, false) => FontStyle::Normal,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italics,
            (true, true) => FontStyle::BoldItalics,
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalics)
    }

    pub fn is_italic(&self) -> bool {
        matches!(self, FontStyle::Italics | FontStyle::BoldItalics)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FontStyle::Normal => "normal",
            FontStyle::Bold => "bold",
            FontStyle::Italics => "italics",
            FontStyle::BoldItalics => "bolditalics",
        }
    }
}

/// Where a font's glyphs come from
#[derive(Debug, Clone)]
pub enum FontSource {
    Standard(StandardFont),
    TrueType(Arc<Vec<u8>>),
}

/// A resolved font face
#[derive(Debug, Clone)]
pub struct Font {
    pub family: String,
    pub style: FontStyle,
    /// Ascender in 1/1000 em.
    pub ascender: f64,
    /// Descender in 1/1000 em, negative below the baseline.
    pub descender: f64,
    pub source: FontSource,
    units_per_em: f64,
}

impl Font {
    pub fn standard(family: &str, style: FontStyle, face: StandardFont) -> Self {
        Self {
            family: family.to_string(),
            style,
            ascender: face.ascender(),
            descender: face.descender(),
            source: FontSource::Standard(face),
            units_per_em: 1000.0,
        }
    }

    pub fn from_truetype(family: &str, style: FontStyle, data: Vec<u8>) -> RendererResult<Self> {
        let face = Face::parse(&data, 0)
            .map_err(|e| RendererError::FontError(format!("Invalid font data for '{}': {}", family, e)))?;
        let units_per_em = face.units_per_em() as f64;
        let scale = 1000.0 / units_per_em;
        let ascender = face.ascender() as f64 * scale;
        let descender = face.descender() as f64 * scale;
        Ok(Self {
            family: family.to_string(),
            style,
            ascender,
            descender,
            source: FontSource::TrueType(Arc::new(data)),
            units_per_em,
        })
    }

    /// Stable key, unique per family and style.
    pub fn id(&self) -> String {
        format!("{}:{}", self.family, self.style.name())
    }

    /// Advance width of `text` at `size`, without character spacing.
    pub fn width_of_string(&self, text: &str, size: f64) -> f64 {
        let units: f64 = match &self.source {
            FontSource::Standard(face) => text.chars().map(|ch| face.char_width(ch)).sum(),
            FontSource::TrueType(data) => match Face::parse(data, 0) {
                Ok(face) => {
                    let scale = 1000.0 / self.units_per_em;
                    text.chars()
                        .map(|ch| {
                            let gid = face.glyph_index(ch).unwrap_or(ttf_parser::GlyphId(0));
                            face.glyph_hor_advance(gid).unwrap_or(0) as f64 * scale
                        })
                        .sum()
                }
                Err(_) => 0.0,
            },
        };
        units / 1000.0 * size
    }

    /// Glyph ids for `text`; missing glyphs map to `.notdef`.
    pub fn glyph_ids(&self, text: &str) -> Vec<u16> {
        match &self.source {
            FontSource::TrueType(data) => match Face::parse(data, 0) {
                Ok(face) => text
                    .chars()
                    .map(|ch| face.glyph_index(ch).map(|g| g.0).unwrap_or(0))
                    .collect(),
                Err(_) => vec![0; text.chars().count()],
            },
            FontSource::Standard(_) => text.chars().map(|ch| ch as u16).collect(),
        }
    }
}

/// Font-resolution service
pub trait FontProvider {
    /// Resolve a family and style, failing with [`RendererError::FontNotFound`].
    fn font(&self, family: &str, style: FontStyle) -> RendererResult<Arc<Font>>;

    /// Registered family names, in a stable order.
    fn families(&self) -> Vec<String>;

    fn font_for(&self, family: &str, bold: bool, italics: bool) -> RendererResult<Arc<Font>> {
        self.font(family, FontStyle::from_flags(bold, italics))
    }
}

#[derive(Debug, Default, Clone)]
struct FamilyFaces {
    faces: BTreeMap<FontStyle, Arc<Font>>,
}

/// In-memory font registry
#[derive(Debug, Default, Clone)]
pub struct FontRegistry {
    families: BTreeMap<String, FamilyFaces>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry described by `options`, loading every configured face file.
    pub fn from_options(options: &RenderOptions) -> RendererResult<Self> {
        let mut registry = Self::new();
        if options.standard_fonts {
            registry.register_standard_fonts();
        }
        for (family, descriptor) in &options.fonts {
            for style in FontStyle::ALL {
                if let Some(path) = descriptor.path(style) {
                    let data = load_font_file(path)?;
                    registry.insert(Font::from_truetype(family, style, data)?);
                    debug!("Registered font {} ({}) from {}", family, style.name(), path);
                }
            }
        }
        Ok(registry)
    }

    pub fn register_standard_fonts(&mut self) {
        for family in [StandardFamily::Helvetica, StandardFamily::Times, StandardFamily::Courier] {
            for style in FontStyle::ALL {
                let face = StandardFont::new(family, style.is_bold(), style.is_italic());
                self.insert(Font::standard(family.family_name(), style, face));
            }
        }
    }

    pub fn insert(&mut self, font: Font) {
        self.families
            .entry(font.family.clone())
            .or_default()
            .faces
            .insert(font.style, Arc::new(font));
    }
}

impl FontProvider for FontRegistry {
    fn font(&self, family: &str, style: FontStyle) -> RendererResult<Arc<Font>> {
        self.families
            .get(family)
            .and_then(|f| f.faces.get(&style))
            .cloned()
            .ok_or_else(|| RendererError::FontNotFound {
                family: family.to_string(),
                style: style.name().to_string(),
            })
    }

    fn families(&self) -> Vec<String> {
        self.families.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_fonts_registered() {
        let mut registry = FontRegistry::new();
        registry.register_standard_fonts();
        let bold = registry.font_for("Helvetica", true, false).unwrap();
        assert_eq!(bold.style, FontStyle::Bold);
        assert_eq!(bold.ascender, 718.0);
        assert_eq!(registry.families(), vec!["Courier", "Helvetica", "Times"]);
    }

    #[test]
    fn test_missing_font_names_family_and_style() {
        let registry = FontRegistry::new();
        match registry.font("Roboto", FontStyle::Italics) {
            Err(RendererError::FontNotFound { family, style }) => {
                assert_eq!(family, "Roboto");
                assert_eq!(style, "italics");
            }
            other => panic!("unexpected result: {:?}", other.map(|f| f.id())),
        }
    }

    #[test]
    fn test_width_of_string() {
        let face = StandardFont::new(StandardFamily::Courier, false, false);
        let font = Font::standard("Courier", FontStyle::Normal, face);
        assert!((font.width_of_string("abc", 10.0) - 18.0).abs() < 1e-9);
        assert_eq!(font.id(), "Courier:normal");
    }

    #[test]
    fn test_from_truetype_rejects_garbage() {
        let err = Font::from_truetype("Broken", FontStyle::Normal, vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, RendererError::FontError(_)));
    }
}
