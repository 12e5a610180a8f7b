//! Page render driver
//!
//! ## Architecture
//!
//! This renderer performs no layout. Every position, size and line break is
//! computed upstream; the driver walks the laid-out pages in order and turns
//! each item into drawing calls on a [`DrawingSink`].
//!
//! ```text
//! layout JSON → Document → LayoutRenderer → DrawingSink (PdfCanvas | RecordingSink)
//! ```
//!
//! Clip brackets are rendered recursively so every `beginClip` owns a
//! [`StateGuard`]; a bracket left open at the end of a page is restored there.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::canvas::PdfCanvas;
use crate::config::RenderOptions;
use crate::document::{Document, Page, PageReferences, PatternRegistry, RenderItem};
use crate::error::RendererResult;
use crate::font_registry::{FontProvider, FontRegistry};
use crate::image::{render_image, render_watermark};
use crate::line::render_line;
use crate::sink::{DrawingSink, StateGuard};
use crate::svg::{resolve_svg_font, RasterSvgConverter, SvgConverter, SvgItem};
use crate::vector::render_vector;

/// Receives the fraction of items rendered so far.
pub type ProgressCallback<'a> = dyn FnMut(f64) + 'a;

/// Everything an item renderer may look up
pub struct RenderContext<'a> {
    pub fonts: &'a dyn FontProvider,
    pub patterns: &'a PatternRegistry,
    pub page_references: &'a PageReferences,
    pub svg: &'a dyn SvgConverter,
    /// Family SVG text falls back to when the fragment names none.
    pub default_font: &'a str,
}

struct Progress<'p, 'c> {
    rendered: usize,
    total: usize,
    callback: Option<&'p mut ProgressCallback<'c>>,
}

impl Progress<'_, '_> {
    fn tick(&mut self) {
        self.rendered += 1;
        if let Some(callback) = self.callback.as_mut() {
            callback(self.rendered as f64 / self.total as f64);
        }
    }
}

/// Render every page in order, one sink page per layout page.
pub fn render_pages(
    pages: &mut [Page],
    ctx: &RenderContext<'_>,
    sink: &mut dyn DrawingSink,
    progress: Option<&mut ProgressCallback<'_>>,
) -> RendererResult<()> {
    sink.set_page_count(pages.len());
    let total = pages.iter().map(|p| p.items.len()).sum();
    let mut progress = Progress { rendered: 0, total, callback: progress };

    for (index, page) in pages.iter_mut().enumerate() {
        if index > 0 {
            let configured = sink.page_size();
            if page.page_size.orientation() != configured.orientation() {
                debug!(
                    "Page {}: orientation changes to {:?}, swapping page size",
                    index + 1,
                    page.page_size.orientation()
                );
                sink.set_page_size(configured.swapped());
            }
        }
        sink.add_page()?;
        debug!("Page {}: {} items, size={:?}", index + 1, page.items.len(), sink.page_size());

        let mut items = page.items.iter_mut();
        render_items(&mut items, 0, ctx, sink, &mut progress)?;

        if let Some(watermark) = &page.watermark {
            render_watermark(watermark, ctx.fonts, sink)?;
        }
    }
    Ok(())
}

/// Render items until the end of the page or the `endClip` closing `depth`.
/// Returns whether a closing `endClip` was consumed.
fn render_items(
    items: &mut std::slice::IterMut<'_, RenderItem>,
    depth: usize,
    ctx: &RenderContext<'_>,
    sink: &mut dyn DrawingSink,
    progress: &mut Progress<'_, '_>,
) -> RendererResult<bool> {
    while let Some(item) = items.next() {
        match item {
            RenderItem::BeginClip(rect) => {
                let closed = {
                    let mut clipped = StateGuard::new(sink);
                    clipped.rect(rect.x, rect.y, rect.width, rect.height);
                    clipped.clip();
                    progress.tick();
                    render_items(items, depth + 1, ctx, &mut *clipped, progress)?
                };
                if closed {
                    progress.tick();
                }
            }
            RenderItem::EndClip if depth == 0 => {
                warn!("Ignoring endClip without a matching beginClip");
                progress.tick();
            }
            RenderItem::EndClip => return Ok(true),
            other => {
                render_item(other, ctx, sink)?;
                progress.tick();
            }
        }
    }
    if depth > 0 {
        warn!("Restoring {} clip(s) left open at end of page", depth);
    }
    Ok(false)
}

fn render_item(
    item: &mut RenderItem,
    ctx: &RenderContext<'_>,
    sink: &mut dyn DrawingSink,
) -> RendererResult<()> {
    match item {
        RenderItem::Vector(shape) => render_vector(shape, sink, ctx.patterns),
        RenderItem::Line(line) => {
            let (x, y) = (line.x, line.y);
            render_line(line, x, y, ctx, sink)
        }
        RenderItem::Image(image) => render_image(image, sink),
        RenderItem::Svg(svg) => render_svg(svg, ctx, sink),
        RenderItem::Unsupported(kind) => {
            debug!("Skipping unsupported render item '{}'", kind);
            Ok(())
        }
        RenderItem::BeginClip(_) | RenderItem::EndClip => Ok(()),
    }
}

fn render_svg(svg: &SvgItem, ctx: &RenderContext<'_>, sink: &mut dyn DrawingSink) -> RendererResult<()> {
    let default = svg.font.as_deref().unwrap_or(ctx.default_font);
    let resolve = |family: &str, bold: bool, italics: bool| {
        resolve_svg_font(ctx.fonts, family, bold, italics, default)
    };
    ctx.svg.render(svg, &resolve, sink)
}

/// Renders laid-out documents with a fixed font set
pub struct LayoutRenderer {
    options: RenderOptions,
    fonts: FontRegistry,
    svg: RasterSvgConverter,
    images: BTreeMap<String, Vec<u8>>,
}

impl LayoutRenderer {
    pub fn new(options: RenderOptions) -> RendererResult<Self> {
        options.validate()?;
        let fonts = FontRegistry::from_options(&options)?;
        Ok(Self::with_fonts(options, fonts))
    }

    /// Use an already populated font registry instead of the configured files.
    pub fn with_fonts(options: RenderOptions, fonts: FontRegistry) -> Self {
        let svg = RasterSvgConverter::new(options.svg_raster_dpi);
        Self {
            options,
            fonts,
            svg,
            images: BTreeMap::new(),
        }
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Make encoded image bytes available to image items under `key`.
    pub fn register_image(&mut self, key: impl Into<String>, data: Vec<u8>) {
        self.images.insert(key.into(), data);
    }

    /// Paint `document` onto any sink.
    pub fn render(
        &self,
        document: &mut Document,
        sink: &mut dyn DrawingSink,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> RendererResult<()> {
        let patterns = PatternRegistry::register(&document.patterns, sink)?;
        let ctx = RenderContext {
            fonts: &self.fonts,
            patterns: &patterns,
            page_references: &document.page_references,
            svg: &self.svg,
            default_font: &self.options.default_font,
        };
        debug!(
            "Rendering {} pages, {} items",
            document.pages.len(),
            document.total_items()
        );
        render_pages(&mut document.pages, &ctx, sink, progress)
    }

    /// Paint `document` into a new PDF and return its bytes.
    pub fn render_to_pdf(&self, document: &mut Document) -> RendererResult<Vec<u8>> {
        let first_page = document
            .pages
            .first()
            .map(|page| page.page_size.size())
            .unwrap_or(self.options.page_size);

        let mut canvas = PdfCanvas::new(first_page);
        for (key, data) in &self.images {
            canvas.register_image(key, data.clone());
        }
        self.render(document, &mut canvas, None)?;

        let bytes = canvas.finish()?;
        info!("PDF generated: {} bytes ({:.2} MB)", bytes.len(), bytes.len() as f64 / 1_048_576.0);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Command, RecordingSink};
    use crate::types::Size;

    fn renderer() -> LayoutRenderer {
        let mut fonts = FontRegistry::new();
        fonts.register_standard_fonts();
        LayoutRenderer::with_fonts(RenderOptions::default(), fonts)
    }

    fn page(orientation: &str, items: serde_json::Value) -> serde_json::Value {
        let (width, height) = if orientation == "landscape" { (842, 595) } else { (595, 842) };
        serde_json::json!({
            "pageSize": {"width": width, "height": height, "orientation": orientation},
            "items": items
        })
    }

    fn line_item(text: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "line",
            "item": {
                "x": 10, "y": 10, "height": 12, "ascenderHeight": 9,
                "inlines": [{"text": text, "font": "Helvetica", "fontSize": 10, "width": 20, "height": 12}]
            }
        })
    }

    fn rect_item() -> serde_json::Value {
        serde_json::json!({"type": "vector", "item": {"type": "rect", "x": 0, "y": 0, "w": 5, "h": 5, "color": "red"}})
    }

    fn document(pages: Vec<serde_json::Value>) -> Document {
        serde_json::from_value(serde_json::json!({"pages": pages})).unwrap()
    }

    fn record(document: &mut Document) -> RecordingSink {
        let mut sink = RecordingSink::new(Size::new(595.0, 842.0));
        renderer().render(document, &mut sink, None).unwrap();
        sink
    }

    #[test]
    fn test_orientation_changes_swap_page_size() {
        let mut doc = document(vec![
            page("portrait", serde_json::json!([])),
            page("landscape", serde_json::json!([])),
            page("portrait", serde_json::json!([])),
        ]);
        let sink = record(&mut doc);
        let portrait = Size::new(595.0, 842.0);
        let landscape = Size::new(842.0, 595.0);
        assert_eq!(
            sink.commands,
            vec![
                Command::SetPageCount(3),
                Command::AddPage(portrait),
                Command::SetPageSize(landscape),
                Command::AddPage(landscape),
                Command::SetPageSize(portrait),
                Command::AddPage(portrait),
            ]
        );
        assert_eq!(sink.pages_added(), 3);
        assert_eq!(sink.page_count(), 3);
    }

    #[test]
    fn test_same_orientation_keeps_page_size() {
        let mut doc = document(vec![
            page("portrait", serde_json::json!([])),
            page("portrait", serde_json::json!([])),
        ]);
        let sink = record(&mut doc);
        assert!(!sink.commands.iter().any(|c| matches!(c, Command::SetPageSize(_))));
    }

    #[test]
    fn test_progress_reports_every_item() {
        let mut doc = document(vec![
            page("portrait", serde_json::json!([rect_item(), line_item("a")])),
            page("portrait", serde_json::json!([rect_item(), rect_item(), line_item("b")])),
        ]);
        let mut reports = Vec::new();
        let mut callback = |fraction: f64| reports.push(fraction);
        let mut sink = RecordingSink::new(Size::new(595.0, 842.0));
        renderer().render(&mut doc, &mut sink, Some(&mut callback)).unwrap();
        assert_eq!(reports, vec![0.2, 0.4, 0.6, 0.8, 1.0]);
    }

    #[test]
    fn test_progress_counts_clip_brackets_and_unknown_items() {
        let mut doc = document(vec![page(
            "portrait",
            serde_json::json!([
                {"type": "beginClip", "item": {"x": 0, "y": 0, "width": 10, "height": 10}},
                rect_item(),
                {"type": "endClip"},
                {"type": "qrCode", "item": {}}
            ]),
        )]);
        let mut reports = Vec::new();
        let mut callback = |fraction: f64| reports.push(fraction);
        let mut sink = RecordingSink::new(Size::new(595.0, 842.0));
        renderer().render(&mut doc, &mut sink, Some(&mut callback)).unwrap();
        assert_eq!(reports, vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_empty_document_reports_nothing() {
        let mut doc = document(vec![]);
        let mut called = false;
        let mut callback = |_: f64| called = true;
        let mut sink = RecordingSink::new(Size::new(595.0, 842.0));
        renderer().render(&mut doc, &mut sink, Some(&mut callback)).unwrap();
        assert!(!called);
        assert_eq!(sink.commands, vec![Command::SetPageCount(0)]);
    }

    #[test]
    fn test_clip_brackets_save_and_restore() {
        let mut doc = document(vec![page(
            "portrait",
            serde_json::json!([
                {"type": "beginClip", "item": {"x": 1, "y": 2, "width": 3, "height": 4}},
                rect_item(),
                {"type": "endClip"},
                rect_item()
            ]),
        )]);
        let sink = record(&mut doc);
        let commands = &sink.commands[2..];
        assert_eq!(&commands[..3], &[Command::Save, Command::Rect(1.0, 2.0, 3.0, 4.0), Command::Clip]);
        let restore = commands.iter().position(|c| *c == Command::Restore).unwrap();
        // The clipped rect paints before the restore, the second one after.
        assert_eq!(commands[..restore].iter().filter(|c| **c == Command::Fill).count(), 1);
        assert_eq!(commands[restore..].iter().filter(|c| **c == Command::Fill).count(), 1);
    }

    #[test]
    fn test_unbalanced_clips_are_balanced() {
        let mut doc = document(vec![page(
            "portrait",
            serde_json::json!([
                {"type": "endClip"},
                {"type": "beginClip", "item": {"x": 0, "y": 0, "width": 1, "height": 1}},
                {"type": "beginClip", "item": {"x": 0, "y": 0, "width": 1, "height": 1}},
                rect_item()
            ]),
        )]);
        let sink = record(&mut doc);
        let saves = sink.commands.iter().filter(|c| **c == Command::Save).count();
        let restores = sink.commands.iter().filter(|c| **c == Command::Restore).count();
        assert_eq!((saves, restores), (2, 2));
        assert_eq!(sink.commands.last(), Some(&Command::Restore));
    }

    #[test]
    fn test_watermark_paints_after_items() {
        let mut page = page("portrait", serde_json::json!([rect_item(), line_item("x")]));
        page["watermark"] = serde_json::json!({
            "text": "DRAFT", "font": "Helvetica", "fontSize": 30,
            "size": {"width": 100, "height": 30}
        });
        let mut doc = document(vec![page]);
        let sink = record(&mut doc);

        let texts: Vec<&str> = sink
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["x", "DRAFT"]);
        assert_eq!(sink.commands.last(), Some(&Command::Restore));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let pages = vec![
            page("portrait", serde_json::json!([rect_item(), line_item("one")])),
            page("landscape", serde_json::json!([line_item("two")])),
        ];
        let first = record(&mut document(pages.clone()));
        let second = record(&mut document(pages));
        assert_eq!(first.commands, second.commands);
    }

    #[test]
    fn test_page_references_resolve_across_pages() {
        let mut doc: Document = serde_json::from_value(serde_json::json!({
            "pages": [page("portrait", serde_json::json!([{
                "type": "line",
                "item": {
                    "height": 12, "ascenderHeight": 9, "pageReference": "end",
                    "inlines": [{"text": "00", "font": "Courier", "fontSize": 10, "width": 12, "height": 12}]
                }
            }]))],
            "pageReferences": {"end": 4}
        }))
        .unwrap();
        let sink = record(&mut doc);
        assert!(sink.commands.iter().any(|c| matches!(c, Command::Text { text, .. } if text == "4")));
        let RenderItem::Line(line) = &doc.pages[0].items[0] else {
            panic!("expected a line");
        };
        assert_eq!(line.inlines[0].text, "4");
    }

    #[test]
    fn test_missing_reference_aborts_render() {
        let mut doc = document(vec![page(
            "portrait",
            serde_json::json!([{
                "type": "line",
                "item": {
                    "height": 12, "ascenderHeight": 9,
                    "inlines": [{"text": "0", "font": "Courier", "fontSize": 10, "width": 6, "height": 12,
                                 "pageReference": "nowhere"}]
                }
            }]),
        )]);
        let mut sink = RecordingSink::new(Size::new(595.0, 842.0));
        assert!(renderer().render(&mut doc, &mut sink, None).is_err());
    }

    #[test]
    fn test_render_to_pdf_produces_a_pdf() {
        let mut doc = document(vec![
            page("portrait", serde_json::json!([rect_item(), line_item("hello")])),
            page("landscape", serde_json::json!([])),
        ]);
        let bytes = renderer().render_to_pdf(&mut doc).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Count 2"));
        assert!(text.contains("/Helvetica"));
    }
}
