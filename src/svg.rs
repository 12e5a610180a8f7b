//! SVG delegation
//!
//! SVG fragments are handed to an [`SvgConverter`] together with a font
//! callback that maps the fragment's `font-family` lists onto the fonts the
//! document declares. The bundled converter rasterizes with `resvg` and
//! places the pixels as an image.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;
use resvg::tiny_skia::{Pixmap, Transform};
use serde::Deserialize;

use crate::error::{RendererError, RendererResult};
use crate::font_registry::{Font, FontProvider, FontSource};
use crate::sink::{DrawingSink, ImagePlacement, ImageSource};

/// Elements whose text is laid out with a font.
const TEXT_ELEMENTS: [&str; 3] = ["text", "tspan", "textPath"];

/// SVG fragment positioned by layout
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgItem {
    pub svg: String,
    pub x: f64,
    pub y: f64,
    #[serde(alias = "_width")]
    pub width: f64,
    #[serde(alias = "_height")]
    pub height: f64,
    /// Family used when none of the requested families is declared.
    #[serde(default)]
    pub font: Option<String>,
}

/// Resolves a `font-family` list plus bold/italic flags to a font.
pub type FontCallback<'a> = dyn Fn(&str, bool, bool) -> RendererResult<Arc<Font>> + 'a;

/// Converts an SVG fragment into sink calls
pub trait SvgConverter {
    fn render(
        &self,
        item: &SvgItem,
        fonts: &FontCallback<'_>,
        sink: &mut dyn DrawingSink,
    ) -> RendererResult<()>;
}

/// First requested family that is declared, compared case-insensitively,
/// or `default` when none is.
pub fn find_font(declared: &[String], requested: &[&str], default: &str) -> String {
    requested
        .iter()
        .find_map(|wanted| {
            declared
                .iter()
                .find(|family| family.to_lowercase() == wanted.to_lowercase())
                .cloned()
        })
        .unwrap_or_else(|| default.to_string())
}

/// Split a CSS `font-family` value into bare family names.
pub fn split_font_families(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(|family| family.trim().trim_matches(|c| c == '\'' || c == '"'))
        .filter(|family| !family.is_empty())
        .collect()
}

/// Font lookup used for every SVG fragment.
pub fn resolve_svg_font(
    fonts: &dyn FontProvider,
    family_list: &str,
    bold: bool,
    italics: bool,
    default: &str,
) -> RendererResult<Arc<Font>> {
    let family = find_font(&fonts.families(), &split_font_families(family_list), default);
    fonts.font_for(&family, bold, italics)
}

/// Effective font of one text element
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct FontUse {
    family: String,
    bold: bool,
    italic: bool,
}

/// Collect the distinct fonts the text elements of a document ask for.
fn scan_fonts(svg: &str) -> RendererResult<BTreeSet<FontUse>> {
    let document =
        roxmltree::Document::parse(svg).map_err(|e| RendererError::SvgError(e.to_string()))?;

    let mut uses = BTreeSet::new();
    for node in document.descendants() {
        if !node.is_element() || !TEXT_ELEMENTS.contains(&node.tag_name().name()) {
            continue;
        }
        let family = inherited(node, "font-family").unwrap_or_default();
        let bold = inherited(node, "font-weight").map_or(false, |w| is_bold_weight(&w));
        let italic = inherited(node, "font-style").map_or(false, |s| s == "italic" || s == "oblique");
        uses.insert(FontUse { family, bold, italic });
    }
    Ok(uses)
}

/// Nearest value of a presentation property, from `style` or an attribute.
fn inherited(node: roxmltree::Node<'_, '_>, property: &str) -> Option<String> {
    node.ancestors().filter(|n| n.is_element()).find_map(|n| {
        let from_style = n.attribute("style").and_then(|style| {
            style.split(';').find_map(|decl| {
                let (name, value) = decl.split_once(':')?;
                (name.trim() == property).then(|| value.trim().to_string())
            })
        });
        from_style.or_else(|| n.attribute(property).map(|v| v.trim().to_string()))
    })
}

fn is_bold_weight(weight: &str) -> bool {
    match weight {
        "bold" | "bolder" => true,
        other => other.parse::<u32>().map_or(false, |w| w >= 600),
    }
}

/// Family name stored in a TrueType file's naming table.
fn internal_family(data: &[u8]) -> Option<String> {
    let face = ttf_parser::Face::parse(data, 0).ok()?;
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::FAMILY)
        .find_map(|name| name.to_string())
}

/// Rasterizes SVG fragments with resvg at a fixed resolution
#[derive(Debug, Clone)]
pub struct RasterSvgConverter {
    pub dpi: f64,
}

impl RasterSvgConverter {
    pub fn new(dpi: f64) -> Self {
        Self { dpi }
    }

    fn font_database(
        &self,
        svg: &str,
        fonts: &FontCallback<'_>,
    ) -> RendererResult<(usvg::fontdb::Database, Option<String>)> {
        let mut db = usvg::fontdb::Database::new();
        let mut default_family = None;
        let mut system_loaded = false;

        for font_use in scan_fonts(svg)? {
            let font = fonts(&font_use.family, font_use.bold, font_use.italic)?;
            match &font.source {
                FontSource::TrueType(data) => {
                    if default_family.is_none() {
                        default_family = internal_family(data);
                    }
                    db.load_font_data(data.to_vec());
                }
                FontSource::Standard(_) if !system_loaded => {
                    debug!("SVG uses built-in font {}, falling back to system fonts", font.id());
                    db.load_system_fonts();
                    system_loaded = true;
                }
                FontSource::Standard(_) => {}
            }
        }

        if let Some(family) = &default_family {
            db.set_serif_family(family.clone());
            db.set_sans_serif_family(family.clone());
            db.set_monospace_family(family.clone());
        }
        Ok((db, default_family))
    }
}

impl Default for RasterSvgConverter {
    fn default() -> Self {
        Self::new(300.0)
    }
}

impl SvgConverter for RasterSvgConverter {
    fn render(
        &self,
        item: &SvgItem,
        fonts: &FontCallback<'_>,
        sink: &mut dyn DrawingSink,
    ) -> RendererResult<()> {
        let (db, default_family) = self.font_database(&item.svg, fonts)?;

        let mut options = usvg::Options::default();
        if let Some(family) = default_family {
            options.font_family = family;
        }
        let tree = usvg::Tree::from_str(&item.svg, &options, &db)
            .map_err(|e| RendererError::SvgError(e.to_string()))?;

        let scale = self.dpi / 72.0;
        let width = (item.width * scale).ceil().max(1.0) as u32;
        let height = (item.height * scale).ceil().max(1.0) as u32;
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            RendererError::SvgError(format!("cannot allocate {}x{} pixmap", width, height))
        })?;

        let size = tree.size();
        let transform = Transform::from_scale(
            width as f32 / size.width(),
            height as f32 / size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());
        debug!("Rasterized SVG to {}x{} pixels", width, height);

        // tiny-skia stores premultiplied alpha.
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for pixel in pixmap.pixels() {
            let color = pixel.demultiply();
            data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }

        let source = ImageSource::Rgba { width, height, data: Arc::new(data) };
        let placement = ImagePlacement::Exact { width: item.width, height: item.height };
        sink.image(&source, item.x, item.y, &placement)
    }
}
