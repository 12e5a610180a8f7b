//! Drawing primitive sink
//!
//! The render pass never writes output itself. It drives a [`DrawingSink`],
//! an imperative canvas modelled on a PDF content stream: path construction,
//! painting, graphics state, text, images and annotations.
//!
//! Coordinates are page space with a top-left origin and y growing down.
//! Text is positioned by the top of its glyph box; the sink adds the font
//! ascender to find the baseline.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::Deserialize;

use crate::error::RendererResult;
use crate::font_registry::Font;
use crate::types::{Alignment, Color, Point, Rect, Size, VerticalAlignment};

/// Handle of a gradient created by [`DrawingSink::linear_gradient`]
pub type GradientId = usize;

/// Handle of a pattern created by [`DrawingSink::register_pattern`]
pub type PatternId = usize;

/// Fill or stroke paint
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    /// Tiling pattern; uncolored patterns use the tint.
    Pattern { id: PatternId, tint: Option<Color> },
    Gradient(GradientId),
}

impl Paint {
    pub fn black() -> Self {
        Paint::Solid(Color::black())
    }
}

/// Dash pattern
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Dash {
    pub length: f64,
    /// Gap length; defaults to the dash length.
    #[serde(default)]
    pub space: Option<f64>,
    #[serde(default)]
    pub phase: f64,
}

impl Dash {
    pub fn gap(&self) -> f64 {
        self.space.unwrap_or(self.length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

/// Options for a single run of pre-wrapped text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextOptions {
    /// Always false for laid-out text; the sink must not wrap.
    pub line_break: bool,
    /// Measured width of the run.
    pub width: Option<f64>,
    pub character_spacing: Option<f64>,
    pub features: Vec<String>,
    /// URL link over the run.
    pub link: Option<String>,
    /// Named destination the run links to.
    pub go_to: Option<String>,
    /// Named destination anchored at the run.
    pub destination: Option<String>,
}

/// Image data handed to a sink
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// File path, `data:` URL or a key registered with the sink.
    Named(String),
    /// Raw RGBA pixels, row-major.
    Rgba { width: u32, height: u32, data: Arc<Vec<u8>> },
}

/// How an image fills its target
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImagePlacement {
    /// Stretch to exactly this size.
    Exact { width: f64, height: f64 },
    /// Scale to cover the box keeping aspect ratio, positioned by the alignments.
    Cover {
        width: f64,
        height: f64,
        align: Alignment,
        valign: VerticalAlignment,
    },
}

/// Tiling pattern definition
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSpec {
    /// `[x0, y0, x1, y1]` in pattern space.
    pub bbox: [f64; 4],
    pub x_step: f64,
    pub y_step: f64,
    /// Raw content-stream operators painting one tile.
    pub pattern: String,
    #[serde(default)]
    pub colored: bool,
}

/// Drawing primitive surface used by every renderer
pub trait DrawingSink {
    // Pages

    /// Size used for the next `add_page`.
    fn page_size(&self) -> Size;
    fn set_page_size(&mut self, size: Size);
    fn add_page(&mut self) -> RendererResult<()>;
    /// Record the number of laid-out pages of the document.
    fn set_page_count(&mut self, count: usize);

    // Graphics state

    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, x: f64, y: f64);
    /// Rotate by `angle` degrees (clockwise on the page) about `origin`.
    fn rotate(&mut self, angle: f64, origin: Point);
    fn scale(&mut self, sx: f64, sy: f64, origin: Point);

    fn line_width(&mut self, width: f64);
    /// `None` clears the dash.
    fn dash(&mut self, dash: Option<Dash>);
    fn line_join(&mut self, join: LineJoin);
    fn line_cap(&mut self, cap: LineCap);

    /// Set the fill paint and, if given, the fill opacity.
    fn fill_color(&mut self, paint: &Paint, opacity: Option<f64>);
    fn stroke_color(&mut self, paint: &Paint, opacity: Option<f64>);
    fn fill_opacity(&mut self, opacity: f64);
    fn stroke_opacity(&mut self, opacity: f64);
    /// Set both fill and stroke opacity.
    fn opacity(&mut self, opacity: f64);

    // Path construction

    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn quadratic_curve_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64);
    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64);
    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn rounded_rect(&mut self, x: f64, y: f64, width: f64, height: f64, radius: f64);
    fn ellipse(&mut self, cx: f64, cy: f64, rx: f64, ry: f64);
    /// Append SVG path data.
    fn path(&mut self, data: &str) -> RendererResult<()>;
    fn close_path(&mut self);

    // Painting

    fn fill(&mut self);
    fn stroke(&mut self);
    fn fill_and_stroke(&mut self);
    /// Intersect the clip with the current path.
    fn clip(&mut self);

    // Shadings and patterns

    /// Horizontal or arbitrary axial gradient from `(x1, y1)` to `(x2, y2)`.
    fn linear_gradient(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> GradientId;
    fn gradient_stop(&mut self, gradient: GradientId, offset: f64, color: Color);
    fn register_pattern(&mut self, spec: &PatternSpec) -> RendererResult<PatternId>;

    // Text

    fn set_font(&mut self, font: &Arc<Font>, size: f64) -> RendererResult<()>;
    /// Place `text` with its glyph box top-left at `(x, y)`.
    fn text(&mut self, text: &str, x: f64, y: f64, options: &TextOptions) -> RendererResult<()>;

    // Images

    fn image(&mut self, source: &ImageSource, x: f64, y: f64, placement: &ImagePlacement) -> RendererResult<()>;

    // Annotations

    fn link(&mut self, area: Rect, url: &str);
    fn go_to(&mut self, area: Rect, destination: &str);
    /// Link to a 1-based page number.
    fn page_link(&mut self, area: Rect, page: usize);
}

/// Saves the graphics state on creation and restores it on drop
///
/// Derefs to the sink, so a bracket reads as
/// `let mut scoped = StateGuard::new(sink); scoped.rotate(...)`.
pub struct StateGuard<'a> {
    sink: &'a mut dyn DrawingSink,
}

impl<'a> StateGuard<'a> {
    pub fn new(sink: &'a mut dyn DrawingSink) -> Self {
        sink.save();
        Self { sink }
    }
}

impl<'a> Deref for StateGuard<'a> {
    type Target = dyn DrawingSink + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.sink
    }
}

impl<'a> DerefMut for StateGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.sink
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.sink.restore();
    }
}
