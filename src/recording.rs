//! Recording sink
//!
//! Appends one [`Command`] per sink call instead of drawing. The trace is
//! what tests assert on, and two renders of the same input must produce
//! equal traces.

use std::sync::Arc;

use crate::error::RendererResult;
use crate::font_registry::Font;
use crate::sink::{
    Dash, DrawingSink, GradientId, ImagePlacement, ImageSource, LineCap, LineJoin, Paint,
    PatternId, PatternSpec, TextOptions,
};
use crate::types::{Color, Point, Rect, Size};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetPageSize(Size),
    AddPage(Size),
    SetPageCount(usize),
    Save,
    Restore,
    Translate(f64, f64),
    Rotate { angle: f64, origin: Point },
    Scale { sx: f64, sy: f64, origin: Point },
    LineWidth(f64),
    Dash(Option<Dash>),
    LineJoin(LineJoin),
    LineCap(LineCap),
    FillColor(Paint, Option<f64>),
    StrokeColor(Paint, Option<f64>),
    FillOpacity(f64),
    StrokeOpacity(f64),
    Opacity(f64),
    MoveTo(f64, f64),
    LineTo(f64, f64),
    QuadraticCurveTo(f64, f64, f64, f64),
    BezierCurveTo(f64, f64, f64, f64, f64, f64),
    Rect(f64, f64, f64, f64),
    RoundedRect(f64, f64, f64, f64, f64),
    Ellipse(f64, f64, f64, f64),
    Path(String),
    ClosePath,
    Fill,
    Stroke,
    FillAndStroke,
    Clip,
    LinearGradient { id: GradientId, x1: f64, y1: f64, x2: f64, y2: f64 },
    GradientStop { id: GradientId, offset: f64, color: Color },
    RegisterPattern(PatternId),
    SetFont { font: String, size: f64 },
    Text { text: String, x: f64, y: f64, options: TextOptions },
    Image { source: ImageSource, x: f64, y: f64, placement: ImagePlacement },
    Link { area: Rect, url: String },
    GoTo { area: Rect, destination: String },
    PageLink { area: Rect, page: usize },
}

impl Command {
    /// Path-construction commands, the ones that add geometry.
    pub fn is_path_construction(&self) -> bool {
        matches!(
            self,
            Command::MoveTo(..)
                | Command::LineTo(..)
                | Command::QuadraticCurveTo(..)
                | Command::BezierCurveTo(..)
                | Command::Rect(..)
                | Command::RoundedRect(..)
                | Command::Ellipse(..)
                | Command::Path(_)
                | Command::ClosePath
        )
    }
}

/// Sink that records every call
#[derive(Debug, Clone)]
pub struct RecordingSink {
    pub commands: Vec<Command>,
    page_size: Size,
    pages_added: usize,
    page_count: usize,
    gradients: usize,
    patterns: usize,
}

impl RecordingSink {
    pub fn new(page_size: Size) -> Self {
        Self {
            commands: Vec::new(),
            page_size,
            pages_added: 0,
            page_count: 0,
            gradients: 0,
            patterns: 0,
        }
    }

    pub fn pages_added(&self) -> usize {
        self.pages_added
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    fn push(&mut self, command: Command) {
        self.commands.push(command);
    }
}

impl DrawingSink for RecordingSink {
    fn page_size(&self) -> Size {
        self.page_size
    }

    fn set_page_size(&mut self, size: Size) {
        self.page_size = size;
        self.push(Command::SetPageSize(size));
    }

    fn add_page(&mut self) -> RendererResult<()> {
        self.pages_added += 1;
        self.push(Command::AddPage(self.page_size));
        Ok(())
    }

    fn set_page_count(&mut self, count: usize) {
        self.page_count = count;
        self.push(Command::SetPageCount(count));
    }

    fn save(&mut self) {
        self.push(Command::Save);
    }

    fn restore(&mut self) {
        self.push(Command::Restore);
    }

    fn translate(&mut self, x: f64, y: f64) {
        self.push(Command::Translate(x, y));
    }

    fn rotate(&mut self, angle: f64, origin: Point) {
        self.push(Command::Rotate { angle, origin });
    }

    fn scale(&mut self, sx: f64, sy: f64, origin: Point) {
        self.push(Command::Scale { sx, sy, origin });
    }

    fn line_width(&mut self, width: f64) {
        self.push(Command::LineWidth(width));
    }

    fn dash(&mut self, dash: Option<Dash>) {
        self.push(Command::Dash(dash));
    }

    fn line_join(&mut self, join: LineJoin) {
        self.push(Command::LineJoin(join));
    }

    fn line_cap(&mut self, cap: LineCap) {
        self.push(Command::LineCap(cap));
    }

    fn fill_color(&mut self, paint: &Paint, opacity: Option<f64>) {
        self.push(Command::FillColor(paint.clone(), opacity));
    }

    fn stroke_color(&mut self, paint: &Paint, opacity: Option<f64>) {
        self.push(Command::StrokeColor(paint.clone(), opacity));
    }

    fn fill_opacity(&mut self, opacity: f64) {
        self.push(Command::FillOpacity(opacity));
    }

    fn stroke_opacity(&mut self, opacity: f64) {
        self.push(Command::StrokeOpacity(opacity));
    }

    fn opacity(&mut self, opacity: f64) {
        self.push(Command::Opacity(opacity));
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.push(Command::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.push(Command::LineTo(x, y));
    }

    fn quadratic_curve_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64) {
        self.push(Command::QuadraticCurveTo(cpx, cpy, x, y));
    }

    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        self.push(Command::BezierCurveTo(cp1x, cp1y, cp2x, cp2y, x, y));
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.push(Command::Rect(x, y, width, height));
    }

    fn rounded_rect(&mut self, x: f64, y: f64, width: f64, height: f64, radius: f64) {
        self.push(Command::RoundedRect(x, y, width, height, radius));
    }

    fn ellipse(&mut self, cx: f64, cy: f64, rx: f64, ry: f64) {
        self.push(Command::Ellipse(cx, cy, rx, ry));
    }

    fn path(&mut self, data: &str) -> RendererResult<()> {
        self.push(Command::Path(data.to_string()));
        Ok(())
    }

    fn close_path(&mut self) {
        self.push(Command::ClosePath);
    }

    fn fill(&mut self) {
        self.push(Command::Fill);
    }

    fn stroke(&mut self) {
        self.push(Command::Stroke);
    }

    fn fill_and_stroke(&mut self) {
        self.push(Command::FillAndStroke);
    }

    fn clip(&mut self) {
        self.push(Command::Clip);
    }

    fn linear_gradient(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> GradientId {
        let id = self.gradients;
        self.gradients += 1;
        self.push(Command::LinearGradient { id, x1, y1, x2, y2 });
        id
    }

    fn gradient_stop(&mut self, gradient: GradientId, offset: f64, color: Color) {
        self.push(Command::GradientStop { id: gradient, offset, color });
    }

    fn register_pattern(&mut self, _spec: &PatternSpec) -> RendererResult<PatternId> {
        let id = self.patterns;
        self.patterns += 1;
        self.push(Command::RegisterPattern(id));
        Ok(id)
    }

    fn set_font(&mut self, font: &Arc<Font>, size: f64) -> RendererResult<()> {
        self.push(Command::SetFont { font: font.id(), size });
        Ok(())
    }

    fn text(&mut self, text: &str, x: f64, y: f64, options: &TextOptions) -> RendererResult<()> {
        self.push(Command::Text {
            text: text.to_string(),
            x,
            y,
            options: options.clone(),
        });
        Ok(())
    }

    fn image(&mut self, source: &ImageSource, x: f64, y: f64, placement: &ImagePlacement) -> RendererResult<()> {
        self.push(Command::Image {
            source: source.clone(),
            x,
            y,
            placement: *placement,
        });
        Ok(())
    }

    fn link(&mut self, area: Rect, url: &str) {
        self.push(Command::Link { area, url: url.to_string() });
    }

    fn go_to(&mut self, area: Rect, destination: &str) {
        self.push(Command::GoTo { area, destination: destination.to_string() });
    }

    fn page_link(&mut self, area: Rect, page: usize) {
        self.push(Command::PageLink { area, page });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::StateGuard;

    #[test]
    fn test_state_guard_restores_on_drop() {
        let mut sink = RecordingSink::new(Size::new(100.0, 200.0));
        {
            let mut scoped = StateGuard::new(&mut sink);
            scoped.translate(5.0, 6.0);
        }
        assert_eq!(
            sink.commands,
            vec![Command::Save, Command::Translate(5.0, 6.0), Command::Restore]
        );
    }

    #[test]
    fn test_handles_allocated_in_order() {
        let mut sink = RecordingSink::new(Size::new(100.0, 200.0));
        assert_eq!(sink.linear_gradient(0.0, 0.0, 1.0, 0.0), 0);
        assert_eq!(sink.linear_gradient(0.0, 0.0, 2.0, 0.0), 1);
        let spec = PatternSpec {
            bbox: [0.0, 0.0, 4.0, 4.0],
            x_step: 4.0,
            y_step: 4.0,
            pattern: "0 0 2 2 re f".to_string(),
            colored: false,
        };
        assert_eq!(sink.register_pattern(&spec).unwrap(), 0);
    }

    #[test]
    fn test_add_page_uses_configured_size() {
        let mut sink = RecordingSink::new(Size::new(100.0, 200.0));
        sink.set_page_size(Size::new(200.0, 100.0));
        sink.add_page().unwrap();
        assert_eq!(sink.pages_added(), 1);
        assert_eq!(sink.commands.last(), Some(&Command::AddPage(Size::new(200.0, 100.0))));
    }
}
