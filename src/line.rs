//! Text line renderer
//!
//! Places the inlines of one laid-out line. Deferred page numbers are
//! substituted first, then the line background, the glyph runs and the
//! decorations are emitted in that order.

use serde::Deserialize;

use crate::decoration::{draw_background, draw_decorations, DecorationList};
use crate::document::PageReferences;
use crate::error::{RendererError, RendererResult};
use crate::font_registry::FontProvider;
use crate::renderer::RenderContext;
use crate::sink::{DrawingSink, Paint, TextOptions};
use crate::types::{Alignment, Color, ColorValue, Rect};

/// Superscript raises the run by this fraction of its font size.
const SUPERSCRIPT_RISE: f64 = 0.75;
/// Subscript lowers the run by this fraction of its font size.
const SUBSCRIPT_DROP: f64 = 0.35;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLine {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub inlines: Vec<Inline>,
    /// Line height.
    pub height: f64,
    /// Largest ascent among the inlines.
    pub ascender_height: f64,
    /// Named destination anchored at the first inline.
    #[serde(default)]
    pub id: Option<String>,
    /// Deferred page number rendered by the first inline.
    #[serde(default)]
    pub page_reference: Option<String>,
}

/// One styled run of text
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inline {
    pub text: String,
    pub font: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italics: bool,
    pub font_size: f64,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub opacity: Option<f64>,
    /// Offset from the line origin.
    #[serde(default)]
    pub x: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub link_to_page: Option<usize>,
    #[serde(default)]
    pub link_to_destination: Option<String>,
    #[serde(default)]
    pub sup: bool,
    #[serde(default)]
    pub sub: bool,
    #[serde(default)]
    pub character_spacing: Option<f64>,
    #[serde(default)]
    pub font_features: Option<Vec<String>>,
    #[serde(default)]
    pub page_reference: Option<String>,
    #[serde(default)]
    pub background: Option<ColorValue>,
    #[serde(default)]
    pub decoration: Option<DecorationList>,
    #[serde(default)]
    pub decoration_style: Option<String>,
    #[serde(default)]
    pub decoration_color: Option<Color>,
    /// Extra width added by justification.
    #[serde(default)]
    pub justify_shift: f64,
}

/// Render one line with its top-left corner at `(x, y)`.
pub fn render_line(
    line: &mut TextLine,
    x: f64,
    y: f64,
    ctx: &RenderContext<'_>,
    sink: &mut dyn DrawingSink,
) -> RendererResult<()> {
    resolve_page_references(line, ctx.fonts, ctx.page_references)?;

    let line_height = line.height;
    let descent = line_height - line.ascender_height;

    draw_background(line, x, y, ctx.patterns, sink)?;

    for (i, inline) in line.inlines.iter().enumerate() {
        let font = ctx.fonts.font_for(&inline.font, inline.bold, inline.italics)?;
        let shift_to_baseline = line_height - (font.ascender / 1000.0 * inline.font_size) - descent;

        let options = TextOptions {
            line_break: false,
            width: Some(inline.width),
            character_spacing: inline.character_spacing,
            features: inline.font_features.clone().unwrap_or_default(),
            link: inline.link.clone(),
            go_to: inline.link_to_destination.clone(),
            destination: if i == 0 { line.id.clone() } else { None },
        };

        sink.opacity(inline.opacity.unwrap_or(1.0));
        sink.fill_color(&Paint::Solid(inline.color.unwrap_or_else(Color::black)), None);
        sink.set_font(&font, inline.font_size)?;

        let shifted_y = offset_text(y + shift_to_baseline, inline);
        sink.text(&inline.text, x + inline.x, shifted_y, &options)?;

        if let Some(page) = inline.link_to_page {
            sink.page_link(Rect::new(x + inline.x, shifted_y, inline.width, inline.height), page);
        }
    }

    // Decorations use the unshifted baseline, so they sit wrong under sup/sub runs.
    draw_decorations(line, x, y, ctx.fonts, sink)
}

/// Apply the superscript rise and subscript drop to a run's y.
pub fn offset_text(y: f64, inline: &Inline) -> f64 {
    let mut shifted = y;
    if inline.sup {
        shifted -= inline.font_size * SUPERSCRIPT_RISE;
    }
    if inline.sub {
        shifted += inline.font_size * SUBSCRIPT_DROP;
    }
    shifted
}

/// Substitute every deferred page number on the line.
fn resolve_page_references(
    line: &mut TextLine,
    fonts: &dyn FontProvider,
    references: &PageReferences,
) -> RendererResult<()> {
    if let Some(target) = line.page_reference.as_deref() {
        if let Some(first) = line.inlines.first_mut() {
            resolve_page_reference(target, first, fonts, references)?;
        }
    }
    for inline in line.inlines.iter_mut() {
        if let Some(target) = inline.page_reference.clone() {
            resolve_page_reference(&target, inline, fonts, references)?;
        }
    }
    Ok(())
}

/// Replace the inline's text with the target's page number and keep its
/// aligned edge in place.
pub fn resolve_page_reference(
    target: &str,
    inline: &mut Inline,
    fonts: &dyn FontProvider,
    references: &PageReferences,
) -> RendererResult<()> {
    let page = references
        .get(target)
        .ok_or_else(|| RendererError::UnresolvedReference(target.to_string()))?;
    inline.text = page.to_string();

    let font = fonts.font_for(&inline.font, inline.bold, inline.italics)?;
    let glyphs = inline.text.chars().count();
    let spacing = inline.character_spacing.unwrap_or(0.0) * glyphs.saturating_sub(1) as f64;
    let new_width = font.width_of_string(&inline.text, inline.font_size) + spacing;

    let diff = inline.width - new_width;
    inline.width = new_width;
    match inline.alignment {
        Alignment::Right => inline.x += diff,
        Alignment::Center => inline.x += diff / 2.0,
        Alignment::Left | Alignment::Justify => {}
    }
    Ok(())
}
