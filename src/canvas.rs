//! PDF drawing sink over pdf-writer
//!
//! Implements [`DrawingSink`] by writing content streams directly. Every page
//! starts with a y-flip so callers keep drawing in top-left page space; the
//! current transformation matrix is tracked alongside the PDF state so that
//! annotations, destinations and patterns can be mapped back to default
//! user space.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use pdf_writer::types::{
    ActionType, AnnotationType, ColorSpaceOperand, FunctionShadingType, LineCapStyle,
    LineJoinStyle, PaintType, TilingType,
};
use pdf_writer::writers::Annotation;
use pdf_writer::{Content, Name, Null, Pdf, Rect as PdfRect, Ref, Str};

use crate::error::{RendererError, RendererResult};
use crate::font_registry::{Font, FontSource};
use crate::font_utils::{add_truetype_font, static_name};
use crate::image_utils::{add_image_xobject, cover_fit, decode_image, from_rgba, resolve_image_bytes, DecodedImage};
use crate::path_data::{parse_path_data, PathSeg};
use crate::sink::{
    Dash, DrawingSink, GradientId, ImagePlacement, ImageSource, LineCap, LineJoin, Paint, PatternId,
    PatternSpec, TextOptions,
};
use crate::types::{Color, Point, Rect, Size};
use crate::unicode_utils::{is_winansi, unicode_to_winansi};

/// Bezier control distance for a quarter circle of radius 1.
const KAPPA: f64 = 0.552_284_75;

const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Name of the `[/Pattern /DeviceRGB]` color space used by uncolored patterns.
const PATTERN_RGB: Name<'static> = Name(b"CsPRGB");

/// Graphics state mirrored from the content stream
#[derive(Clone)]
struct CanvasState {
    ctm: [f64; 6],
    fill_alpha: f64,
    stroke_alpha: f64,
    font: Option<(Arc<Font>, Name<'static>, f64)>,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            font: None,
        }
    }
}

#[derive(Debug, Clone)]
enum LinkTarget {
    Uri(String),
    Named(String),
    /// 1-based page number.
    Page(usize),
}

#[derive(Debug, Clone)]
struct PendingAnnotation {
    rect: PdfRect,
    target: LinkTarget,
}

/// Everything needed to write one page object at `finish`
struct PageRecord {
    id: Ref,
    content_id: Ref,
    size: Size,
    fonts: Vec<(Name<'static>, Ref)>,
    x_objects: Vec<(Name<'static>, Ref)>,
    ext_g_states: Vec<(Name<'static>, Ref)>,
    patterns: Vec<(Name<'static>, Ref)>,
    pattern_color_space: bool,
    annotations: Vec<PendingAnnotation>,
}

impl PageRecord {
    fn new(id: Ref, content_id: Ref, size: Size) -> Self {
        Self {
            id,
            content_id,
            size,
            fonts: Vec::new(),
            x_objects: Vec::new(),
            ext_g_states: Vec::new(),
            patterns: Vec::new(),
            pattern_color_space: false,
            annotations: Vec::new(),
        }
    }
}

fn add_resource(list: &mut Vec<(Name<'static>, Ref)>, name: Name<'static>, id: Ref) {
    if !list.iter().any(|(n, _)| *n == name) {
        list.push((name, id));
    }
}

#[derive(Debug, Clone, Copy)]
struct EmbeddedImage {
    name: Name<'static>,
    id: Ref,
    width: u32,
    height: u32,
}

/// PDF document being painted
pub struct PdfCanvas {
    pdf: Pdf,
    next_ref_id: i32,
    catalog_id: Ref,
    page_tree_id: Ref,
    page_size: Size,
    declared_page_count: usize,
    pages: Vec<PageRecord>,
    content: Content,
    state: CanvasState,
    state_stack: Vec<CanvasState>,
    current_point: (f64, f64),
    warned_no_page: bool,
    fonts: HashMap<String, (Name<'static>, Ref)>,
    images: HashMap<String, EmbeddedImage>,
    registered_images: HashMap<String, Vec<u8>>,
    ext_states: HashMap<(u32, u32), (Name<'static>, Ref)>,
    /// Pattern objects per (handle, CTM) pair.
    tiling_objects: HashMap<(usize, [u64; 6]), (Name<'static>, Ref)>,
    shading_objects: HashMap<(usize, [u64; 6]), (Name<'static>, Ref)>,
    gradients: Vec<Gradient>,
    patterns: Vec<PatternSpec>,
    destinations: Vec<(String, usize, f64, f64)>,
}

#[derive(Debug, Clone)]
struct Gradient {
    coords: [f64; 4],
    stops: Vec<(f64, Color)>,
}

impl PdfCanvas {
    pub fn new(page_size: Size) -> Self {
        let mut canvas = Self {
            pdf: Pdf::new(),
            next_ref_id: 1,
            catalog_id: Ref::new(1),
            page_tree_id: Ref::new(2),
            page_size,
            declared_page_count: 0,
            pages: Vec::new(),
            content: Content::new(),
            state: CanvasState::default(),
            state_stack: Vec::new(),
            current_point: (0.0, 0.0),
            warned_no_page: false,
            fonts: HashMap::new(),
            images: HashMap::new(),
            registered_images: HashMap::new(),
            ext_states: HashMap::new(),
            tiling_objects: HashMap::new(),
            shading_objects: HashMap::new(),
            gradients: Vec::new(),
            patterns: Vec::new(),
            destinations: Vec::new(),
        };
        canvas.catalog_id = canvas.alloc();
        canvas.page_tree_id = canvas.alloc();
        canvas
    }

    /// Make image bytes available under `key` for [`ImageSource::Named`].
    pub fn register_image(&mut self, key: &str, data: Vec<u8>) {
        self.registered_images.insert(key.to_string(), data);
    }

    fn alloc(&mut self) -> Ref {
        let id = Ref::new(self.next_ref_id);
        self.next_ref_id += 1;
        id
    }

    fn ops(&mut self) -> &mut Content {
        if self.pages.is_empty() && !self.warned_no_page {
            warn!("Drawing before the first page; output is discarded");
            self.warned_no_page = true;
        }
        &mut self.content
    }

    fn require_page(&self) -> RendererResult<()> {
        if self.pages.is_empty() {
            return Err(RendererError::NoCurrentPage);
        }
        Ok(())
    }

    /// Write the current content stream, closing any `q` left open.
    fn close_page(&mut self) {
        if !self.state_stack.is_empty() {
            warn!("{} unrestored graphics states dropped at page end", self.state_stack.len());
            for _ in self.state_stack.drain(..) {
                self.content.restore_state();
            }
        }
        if let Some(page) = self.pages.last() {
            let content = std::mem::replace(&mut self.content, Content::new());
            self.pdf.stream(page.content_id, &content.finish());
        }
    }

    /// Append `m` to the CTM, in the content stream and in the mirror.
    fn concat(&mut self, m: [f64; 6]) {
        self.state.ctm = multiply(m, self.state.ctm);
        self.ops().transform(m.map(|v| v as f32));
    }

    /// Map a page-space point to default user space.
    fn to_default(&self, x: f64, y: f64) -> (f64, f64) {
        apply(self.state.ctm, x, y)
    }

    fn to_default_rect(&self, area: Rect) -> PdfRect {
        let corners = [
            self.to_default(area.x, area.y),
            self.to_default(area.right(), area.y),
            self.to_default(area.x, area.bottom()),
            self.to_default(area.right(), area.bottom()),
        ];
        let xs = corners.iter().map(|c| c.0);
        let ys = corners.iter().map(|c| c.1);
        PdfRect::new(
            xs.clone().fold(f64::INFINITY, f64::min) as f32,
            ys.clone().fold(f64::INFINITY, f64::min) as f32,
            xs.fold(f64::NEG_INFINITY, f64::max) as f32,
            ys.fold(f64::NEG_INFINITY, f64::max) as f32,
        )
    }

    fn annotate(&mut self, area: Rect, target: LinkTarget) {
        let rect = self.to_default_rect(area);
        match self.pages.last_mut() {
            Some(page) => page.annotations.push(PendingAnnotation { rect, target }),
            None => warn!("Link annotation before the first page ignored"),
        }
    }

    fn apply_alpha(&mut self) {
        let key = (
            (self.state.fill_alpha.clamp(0.0, 1.0) * 1000.0).round() as u32,
            (self.state.stroke_alpha.clamp(0.0, 1.0) * 1000.0).round() as u32,
        );
        let (name, id) = match self.ext_states.get(&key) {
            Some(entry) => *entry,
            None => {
                let id = self.alloc();
                self.pdf
                    .ext_graphics(id)
                    .non_stroking_alpha(key.0 as f32 / 1000.0)
                    .stroking_alpha(key.1 as f32 / 1000.0);
                let entry = (static_name(format!("GS{}", id.get())), id);
                self.ext_states.insert(key, entry);
                entry
            }
        };
        if let Some(page) = self.pages.last_mut() {
            add_resource(&mut page.ext_g_states, name, id);
        }
        self.ops().set_parameters(name);
    }

    fn apply_paint(&mut self, paint: &Paint, stroke: bool) {
        match paint {
            Paint::Solid(color) => {
                let (r, g, b) = (color.r as f32, color.g as f32, color.b as f32);
                if stroke {
                    self.ops().set_stroke_rgb(r, g, b);
                } else {
                    self.ops().set_fill_rgb(r, g, b);
                }
            }
            Paint::Pattern { id, tint } => {
                let Some(spec) = self.patterns.get(*id).cloned() else {
                    warn!("Unknown pattern handle {}; paint ignored", id);
                    return;
                };
                let name = self.tiling_pattern(*id, &spec);
                if spec.colored {
                    self.select_pattern(ColorSpaceOperand::Pattern, &[], name, stroke);
                } else {
                    if let Some(page) = self.pages.last_mut() {
                        page.pattern_color_space = true;
                    }
                    let tint = tint.unwrap_or_else(Color::black);
                    let components = [tint.r as f32, tint.g as f32, tint.b as f32];
                    self.select_pattern(ColorSpaceOperand::Named(PATTERN_RGB), &components, name, stroke);
                }
            }
            Paint::Gradient(id) => {
                let Some(gradient) = self.gradients.get(*id).cloned() else {
                    warn!("Unknown gradient handle {}; paint ignored", id);
                    return;
                };
                match gradient.stops.as_slice() {
                    [] => {
                        warn!("Gradient {} has no stops; painting black", id);
                        self.apply_paint(&Paint::black(), stroke);
                    }
                    [(_, only)] => self.apply_paint(&Paint::Solid(*only), stroke),
                    _ => {
                        let name = self.shading_pattern(*id, &gradient);
                        self.select_pattern(ColorSpaceOperand::Pattern, &[], name, stroke);
                    }
                }
            }
        }
    }

    fn select_pattern(&mut self, space: ColorSpaceOperand<'static>, tint: &[f32], name: Name<'static>, stroke: bool) {
        let ops = self.ops();
        if stroke {
            ops.set_stroke_color_space(space);
            ops.set_stroke_pattern(tint.iter().copied(), name);
        } else {
            ops.set_fill_color_space(space);
            ops.set_fill_pattern(tint.iter().copied(), name);
        }
    }

    /// Pattern space follows the CTM, so one object serves every paint
    /// with the same handle under the same transform.
    fn tiling_pattern(&mut self, handle: usize, spec: &PatternSpec) -> Name<'static> {
        let key = (handle, ctm_key(self.state.ctm));
        let (name, id) = match self.tiling_objects.get(&key) {
            Some(entry) => *entry,
            None => {
                let entry = self.write_tiling_pattern(spec);
                self.tiling_objects.insert(key, entry);
                entry
            }
        };
        self.register_pattern_resource(name, id);
        name
    }

    fn shading_pattern(&mut self, handle: usize, gradient: &Gradient) -> Name<'static> {
        let key = (handle, ctm_key(self.state.ctm));
        let (name, id) = match self.shading_objects.get(&key) {
            Some(entry) => *entry,
            None => {
                let entry = self.write_shading_pattern(gradient);
                self.shading_objects.insert(key, entry);
                entry
            }
        };
        self.register_pattern_resource(name, id);
        name
    }

    fn write_tiling_pattern(&mut self, spec: &PatternSpec) -> (Name<'static>, Ref) {
        let id = self.alloc();
        let matrix = self.state.ctm.map(|v| v as f32);
        let [x0, y0, x1, y1] = spec.bbox.map(|v| v as f32);
        let mut tiling = self.pdf.tiling_pattern(id, spec.pattern.as_bytes());
        tiling
            .tiling_type(TilingType::ConstantSpacing)
            .paint_type(if spec.colored { PaintType::Colored } else { PaintType::Uncolored })
            .bbox(PdfRect::new(x0, y0, x1, y1))
            .x_step(spec.x_step as f32)
            .y_step(spec.y_step as f32)
            .matrix(matrix);
        tiling.resources();
        drop(tiling);
        (static_name(format!("P{}", id.get())), id)
    }

    fn write_shading_pattern(&mut self, gradient: &Gradient) -> (Name<'static>, Ref) {
        let function_id = self.write_gradient_function(&gradient.stops);
        let id = self.alloc();
        let matrix = self.state.ctm.map(|v| v as f32);
        let mut pattern = self.pdf.shading_pattern(id);
        {
            let mut shading = pattern.function_shading();
            shading.shading_type(FunctionShadingType::Axial);
            shading.color_space().device_rgb();
            shading.coords(gradient.coords.map(|v| v as f32));
            shading.function(function_id);
            shading.extend([true, true]);
        }
        pattern.matrix(matrix);
        drop(pattern);
        (static_name(format!("P{}", id.get())), id)
    }

    /// One exponential function per pair of stops, stitched when there are several.
    fn write_gradient_function(&mut self, stops: &[(f64, Color)]) -> Ref {
        let rgb = |c: &Color| [c.r as f32, c.g as f32, c.b as f32];
        let mut parts = Vec::with_capacity(stops.len().saturating_sub(1));
        for pair in stops.windows(2) {
            let id = self.alloc();
            self.pdf
                .exponential_function(id)
                .domain([0.0, 1.0])
                .c0(rgb(&pair[0].1))
                .c1(rgb(&pair[1].1))
                .n(1.0);
            parts.push(id);
        }
        if parts.len() == 1 {
            return parts[0];
        }

        let id = self.alloc();
        let bounds: Vec<f32> = stops[1..stops.len() - 1].iter().map(|(offset, _)| *offset as f32).collect();
        let encode: Vec<f32> = parts.iter().flat_map(|_| [0.0, 1.0]).collect();
        self.pdf
            .stitching_function(id)
            .domain([0.0, 1.0])
            .functions(parts)
            .bounds(bounds)
            .encode(encode);
        id
    }

    fn register_pattern_resource(&mut self, name: Name<'static>, id: Ref) {
        if let Some(page) = self.pages.last_mut() {
            add_resource(&mut page.patterns, name, id);
        }
    }

    fn font_resource(&mut self, font: &Font) -> RendererResult<(Name<'static>, Ref)> {
        if let Some(entry) = self.fonts.get(&font.id()) {
            return Ok(*entry);
        }
        let id = self.alloc();
        let name = match &font.source {
            FontSource::Standard(face) => {
                self.pdf
                    .type1_font(id)
                    .base_font(Name(face.base_font().as_bytes()))
                    .encoding_predefined(Name(b"WinAnsiEncoding"));
                static_name(format!("F{}", id.get()))
            }
            FontSource::TrueType(data) => add_truetype_font(&mut self.pdf, data, id, &mut self.next_ref_id)?,
        };
        debug!("Font {} registered as {:?}", font.id(), id);
        self.fonts.insert(font.id(), (name, id));
        Ok((name, id))
    }

    fn load_image(&mut self, source: &ImageSource) -> RendererResult<EmbeddedImage> {
        let (key, decoded): (Option<&str>, DecodedImage) = match source {
            ImageSource::Named(name) => {
                if let Some(embedded) = self.images.get(name) {
                    return Ok(*embedded);
                }
                let bytes = resolve_image_bytes(name, &self.registered_images)?;
                (Some(name.as_str()), decode_image(&bytes)?)
            }
            ImageSource::Rgba { width, height, data } => {
                let expected = *width as usize * *height as usize * 4;
                if data.len() != expected {
                    return Err(RendererError::ImageError(format!(
                        "RGBA buffer holds {} bytes, expected {} for {}x{}",
                        data.len(),
                        expected,
                        width,
                        height
                    )));
                }
                (None, from_rgba(*width, *height, data))
            }
        };

        let id = self.alloc();
        let name = add_image_xobject(&mut self.pdf, &decoded, id, &mut self.next_ref_id);
        let embedded = EmbeddedImage {
            name,
            id,
            width: decoded.width,
            height: decoded.height,
        };
        if let Some(key) = key {
            self.images.insert(key.to_string(), embedded);
        }
        Ok(embedded)
    }

    fn paint_path(&mut self, f: impl FnOnce(&mut Content)) {
        f(self.ops());
    }

    /// Write the page tree, annotations and catalog and return the file bytes.
    pub fn finish(mut self) -> RendererResult<Vec<u8>> {
        self.close_page();
        if self.declared_page_count != self.pages.len() {
            debug!(
                "Document declared {} pages, {} were drawn",
                self.declared_page_count,
                self.pages.len()
            );
        }

        let page_ids: Vec<Ref> = self.pages.iter().map(|p| p.id).collect();
        let pages = std::mem::take(&mut self.pages);
        for page in &pages {
            let annotation_ids: Vec<Ref> = page
                .annotations
                .iter()
                .filter_map(|annotation| self.write_annotation(annotation, &page_ids))
                .collect();

            let mut writer = self.pdf.page(page.id);
            writer
                .media_box(PdfRect::new(0.0, 0.0, page.size.width as f32, page.size.height as f32))
                .parent(self.page_tree_id)
                .contents(page.content_id);
            if !annotation_ids.is_empty() {
                writer.insert(Name(b"Annots")).array().items(annotation_ids);
            }
            let mut resources = writer.resources();
            resources.fonts().pairs(page.fonts.iter().copied());
            resources.x_objects().pairs(page.x_objects.iter().copied());
            resources.ext_g_states().pairs(page.ext_g_states.iter().copied());
            resources.patterns().pairs(page.patterns.iter().copied());
            if page.pattern_color_space {
                resources
                    .color_spaces()
                    .insert(PATTERN_RGB)
                    .array()
                    .item(Name(b"Pattern"))
                    .item(Name(b"DeviceRGB"));
            }
        }

        self.pdf
            .pages(self.page_tree_id)
            .kids(page_ids.iter().copied())
            .count(page_ids.len() as i32);

        let destinations = std::mem::take(&mut self.destinations);
        let dests_id = if destinations.is_empty() { None } else { Some(self.alloc()) };
        if let Some(dests_id) = dests_id {
            let mut dests = self.pdf.indirect(dests_id).dict();
            for (name, page, x, y) in &destinations {
                dests
                    .insert(Name(name.as_bytes()))
                    .array()
                    .item(page_ids[*page])
                    .item(Name(b"XYZ"))
                    .item(*x as f32)
                    .item(*y as f32)
                    .item(Null);
            }
        }

        let mut catalog = self.pdf.catalog(self.catalog_id);
        catalog.pages(self.page_tree_id);
        if let Some(dests_id) = dests_id {
            catalog.pair(Name(b"Dests"), dests_id);
        }
        drop(catalog);

        debug!("PDF finished with {} pages", page_ids.len());
        Ok(self.pdf.finish())
    }

    /// Write one link annotation; `None` when its target page does not exist.
    fn write_annotation(&mut self, annotation: &PendingAnnotation, page_ids: &[Ref]) -> Option<Ref> {
        if let LinkTarget::Page(number) = annotation.target {
            if number == 0 || number > page_ids.len() {
                warn!("Link to page {} skipped: document has {} pages", number, page_ids.len());
                return None;
            }
        }

        let id = self.alloc();
        let mut writer = self.pdf.indirect(id).start::<Annotation>();
        writer.subtype(AnnotationType::Link).rect(annotation.rect);
        writer.insert(Name(b"Border")).array().items([0.0f32, 0.0, 0.0]);
        match &annotation.target {
            LinkTarget::Uri(url) => {
                writer.action().action_type(ActionType::Uri).uri(Str(url.as_bytes()));
            }
            LinkTarget::Named(name) => {
                writer.pair(Name(b"Dest"), Name(name.as_bytes()));
            }
            LinkTarget::Page(number) => {
                writer
                    .insert(Name(b"Dest"))
                    .array()
                    .item(page_ids[number - 1])
                    .item(Name(b"Fit"));
            }
        }
        Some(id)
    }
}

/// `m × ctm` for row-vector affine matrices `[a b c d e f]`.
fn ctm_key(ctm: [f64; 6]) -> [u64; 6] {
    ctm.map(f64::to_bits)
}

fn multiply(m: [f64; 6], ctm: [f64; 6]) -> [f64; 6] {
    let [a, b, c, d, e, f] = ctm;
    let [a2, b2, c2, d2, e2, f2] = m;
    [
        a2 * a + b2 * c,
        a2 * b + b2 * d,
        c2 * a + d2 * c,
        c2 * b + d2 * d,
        e2 * a + f2 * c + e,
        e2 * b + f2 * d + f,
    ]
}

fn apply(m: [f64; 6], x: f64, y: f64) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

impl DrawingSink for PdfCanvas {
    fn page_size(&self) -> Size {
        self.page_size
    }

    fn set_page_size(&mut self, size: Size) {
        self.page_size = size;
    }

    fn add_page(&mut self) -> RendererResult<()> {
        self.close_page();
        // The font carries over; everything else starts fresh.
        let font = self.state.font.take();
        self.state = CanvasState { font, ..CanvasState::default() };
        self.current_point = (0.0, 0.0);

        let id = self.alloc();
        let content_id = self.alloc();
        self.pages.push(PageRecord::new(id, content_id, self.page_size));
        debug!(
            "Page {} added ({}x{})",
            self.pages.len(),
            self.page_size.width,
            self.page_size.height
        );

        self.concat([1.0, 0.0, 0.0, -1.0, 0.0, self.page_size.height]);
        Ok(())
    }

    fn set_page_count(&mut self, count: usize) {
        self.declared_page_count = count;
    }

    fn save(&mut self) {
        self.state_stack.push(self.state.clone());
        self.ops().save_state();
    }

    fn restore(&mut self) {
        match self.state_stack.pop() {
            Some(state) => {
                self.state = state;
                self.ops().restore_state();
            }
            None => warn!("restore without matching save ignored"),
        }
    }

    fn translate(&mut self, x: f64, y: f64) {
        self.concat([1.0, 0.0, 0.0, 1.0, x, y]);
    }

    fn rotate(&mut self, angle: f64, origin: Point) {
        let rad = angle.to_radians();
        let (sin, cos) = rad.sin_cos();
        let (x, y) = (origin.x, origin.y);
        let x1 = x * cos - y * sin;
        let y1 = x * sin + y * cos;
        self.concat([cos, sin, -sin, cos, x - x1, y - y1]);
    }

    fn scale(&mut self, sx: f64, sy: f64, origin: Point) {
        self.concat([sx, 0.0, 0.0, sy, origin.x - sx * origin.x, origin.y - sy * origin.y]);
    }

    fn line_width(&mut self, width: f64) {
        self.ops().set_line_width(width as f32);
    }

    fn dash(&mut self, dash: Option<Dash>) {
        match dash {
            Some(dash) => {
                let pattern = [dash.length as f32, dash.gap() as f32];
                self.ops().set_dash_pattern(pattern, dash.phase as f32);
            }
            None => {
                self.ops().set_dash_pattern(std::iter::empty::<f32>(), 0.0);
            }
        }
    }

    fn line_join(&mut self, join: LineJoin) {
        let style = match join {
            LineJoin::Miter => LineJoinStyle::MiterJoin,
            LineJoin::Round => LineJoinStyle::RoundJoin,
            LineJoin::Bevel => LineJoinStyle::BevelJoin,
        };
        self.ops().set_line_join(style);
    }

    fn line_cap(&mut self, cap: LineCap) {
        let style = match cap {
            LineCap::Butt => LineCapStyle::ButtCap,
            LineCap::Round => LineCapStyle::RoundCap,
            LineCap::Square => LineCapStyle::ProjectingSquareCap,
        };
        self.ops().set_line_cap(style);
    }

    fn fill_color(&mut self, paint: &Paint, opacity: Option<f64>) {
        self.apply_paint(paint, false);
        if let Some(opacity) = opacity {
            self.fill_opacity(opacity);
        }
    }

    fn stroke_color(&mut self, paint: &Paint, opacity: Option<f64>) {
        self.apply_paint(paint, true);
        if let Some(opacity) = opacity {
            self.stroke_opacity(opacity);
        }
    }

    fn fill_opacity(&mut self, opacity: f64) {
        self.state.fill_alpha = opacity;
        self.apply_alpha();
    }

    fn stroke_opacity(&mut self, opacity: f64) {
        self.state.stroke_alpha = opacity;
        self.apply_alpha();
    }

    fn opacity(&mut self, opacity: f64) {
        self.state.fill_alpha = opacity;
        self.state.stroke_alpha = opacity;
        self.apply_alpha();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.current_point = (x, y);
        self.ops().move_to(x as f32, y as f32);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.current_point = (x, y);
        self.ops().line_to(x as f32, y as f32);
    }

    fn quadratic_curve_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64) {
        let (x0, y0) = self.current_point;
        let c1 = (x0 + 2.0 / 3.0 * (cpx - x0), y0 + 2.0 / 3.0 * (cpy - y0));
        let c2 = (x + 2.0 / 3.0 * (cpx - x), y + 2.0 / 3.0 * (cpy - y));
        self.bezier_curve_to(c1.0, c1.1, c2.0, c2.1, x, y);
    }

    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        self.current_point = (x, y);
        self.ops().cubic_to(
            cp1x as f32,
            cp1y as f32,
            cp2x as f32,
            cp2y as f32,
            x as f32,
            y as f32,
        );
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.current_point = (x, y);
        self.ops().rect(x as f32, y as f32, width as f32, height as f32);
    }

    fn rounded_rect(&mut self, x: f64, y: f64, width: f64, height: f64, radius: f64) {
        let r = radius.min(width.min(height) / 2.0).max(0.0);
        if r <= 0.0 {
            self.rect(x, y, width, height);
            return;
        }
        let c = r * (1.0 - KAPPA);
        let (right, bottom) = (x + width, y + height);

        self.move_to(x + r, y);
        self.line_to(right - r, y);
        self.bezier_curve_to(right - c, y, right, y + c, right, y + r);
        self.line_to(right, bottom - r);
        self.bezier_curve_to(right, bottom - c, right - c, bottom, right - r, bottom);
        self.line_to(x + r, bottom);
        self.bezier_curve_to(x + c, bottom, x, bottom - c, x, bottom - r);
        self.line_to(x, y + r);
        self.bezier_curve_to(x, y + c, x + c, y, x + r, y);
        self.close_path();
    }

    fn ellipse(&mut self, cx: f64, cy: f64, rx: f64, ry: f64) {
        let (ox, oy) = (rx * KAPPA, ry * KAPPA);
        let (x0, y0, x1, y1) = (cx - rx, cy - ry, cx + rx, cy + ry);

        self.move_to(x0, cy);
        self.bezier_curve_to(x0, cy - oy, cx - ox, y0, cx, y0);
        self.bezier_curve_to(cx + ox, y0, x1, cy - oy, x1, cy);
        self.bezier_curve_to(x1, cy + oy, cx + ox, y1, cx, y1);
        self.bezier_curve_to(cx - ox, y1, x0, cy + oy, x0, cy);
        self.close_path();
    }

    fn path(&mut self, data: &str) -> RendererResult<()> {
        for seg in parse_path_data(data) {
            match seg {
                PathSeg::MoveTo(x, y) => self.move_to(x, y),
                PathSeg::LineTo(x, y) => self.line_to(x, y),
                PathSeg::CurveTo(x1, y1, x2, y2, x, y) => self.bezier_curve_to(x1, y1, x2, y2, x, y),
                PathSeg::Close => self.close_path(),
            }
        }
        Ok(())
    }

    fn close_path(&mut self) {
        self.ops().close_path();
    }

    fn fill(&mut self) {
        self.paint_path(|ops| {
            ops.fill_nonzero();
        });
    }

    fn stroke(&mut self) {
        self.paint_path(|ops| {
            ops.stroke();
        });
    }

    fn fill_and_stroke(&mut self) {
        self.paint_path(|ops| {
            ops.fill_nonzero_and_stroke();
        });
    }

    fn clip(&mut self) {
        self.paint_path(|ops| {
            ops.clip_nonzero();
            ops.end_path();
        });
    }

    fn linear_gradient(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> GradientId {
        self.gradients.push(Gradient {
            coords: [x1, y1, x2, y2],
            stops: Vec::new(),
        });
        self.gradients.len() - 1
    }

    fn gradient_stop(&mut self, gradient: GradientId, offset: f64, color: Color) {
        match self.gradients.get_mut(gradient) {
            Some(g) => g.stops.push((offset.clamp(0.0, 1.0), color)),
            None => warn!("Stop added to unknown gradient {}", gradient),
        }
    }

    fn register_pattern(&mut self, spec: &PatternSpec) -> RendererResult<PatternId> {
        if spec.x_step <= 0.0 || spec.y_step <= 0.0 {
            return Err(RendererError::InvalidValue(
                "pattern step".to_string(),
                format!("{} x {}", spec.x_step, spec.y_step),
            ));
        }
        self.patterns.push(spec.clone());
        Ok(self.patterns.len() - 1)
    }

    fn set_font(&mut self, font: &Arc<Font>, size: f64) -> RendererResult<()> {
        let (name, id) = self.font_resource(font)?;
        if let Some(page) = self.pages.last_mut() {
            add_resource(&mut page.fonts, name, id);
        }
        self.state.font = Some((Arc::clone(font), name, size));
        Ok(())
    }

    fn text(&mut self, text: &str, x: f64, y: f64, options: &TextOptions) -> RendererResult<()> {
        self.require_page()?;
        let Some((font, name, size)) = self.state.font.clone() else {
            return Err(RendererError::PdfError("text drawn before any font was set".to_string()));
        };
        if let Some(page) = self.pages.last_mut() {
            // The font may have been selected on an earlier page.
            if let Some((_, id)) = self.fonts.get(&font.id()) {
                add_resource(&mut page.fonts, name, *id);
            }
        }

        let baseline = y + font.ascender / 1000.0 * size;
        let encoded: Vec<u8> = match &font.source {
            FontSource::Standard(_) => {
                if !is_winansi(text) {
                    debug!("{:?} has characters outside WinAnsiEncoding; replaced with '?'", text);
                }
                unicode_to_winansi(text)
            }
            FontSource::TrueType(_) => font.glyph_ids(text).into_iter().flat_map(u16::to_be_bytes).collect(),
        };

        let ops = self.ops();
        ops.begin_text();
        ops.set_font(name, size as f32);
        if let Some(spacing) = options.character_spacing {
            ops.set_char_spacing(spacing as f32);
        }
        ops.set_text_matrix([1.0, 0.0, 0.0, -1.0, x as f32, baseline as f32]);
        ops.show(Str(&encoded));
        if options.character_spacing.is_some() {
            ops.set_char_spacing(0.0);
        }
        ops.end_text();

        let width = options.width.unwrap_or_else(|| font.width_of_string(text, size));
        let height = (font.ascender - font.descender) / 1000.0 * size;
        let area = Rect::new(x, y, width, height);
        if let Some(url) = &options.link {
            self.annotate(area, LinkTarget::Uri(url.clone()));
        }
        if let Some(destination) = &options.go_to {
            self.annotate(area, LinkTarget::Named(destination.clone()));
        }
        if let Some(destination) = &options.destination {
            let (dx, dy) = self.to_default(x, y);
            self.destinations.push((destination.clone(), self.pages.len() - 1, dx, dy));
        }
        Ok(())
    }

    fn image(&mut self, source: &ImageSource, x: f64, y: f64, placement: &ImagePlacement) -> RendererResult<()> {
        self.require_page()?;
        let embedded = self.load_image(source)?;
        if let Some(page) = self.pages.last_mut() {
            add_resource(&mut page.x_objects, embedded.name, embedded.id);
        }

        let target = match *placement {
            ImagePlacement::Exact { width, height } => Rect::new(x, y, width, height),
            ImagePlacement::Cover { width, height, align, valign } => cover_fit(
                (embedded.width, embedded.height),
                Rect::new(x, y, width, height),
                align,
                valign,
            ),
        };

        self.save();
        self.concat([target.width, 0.0, 0.0, -target.height, target.x, target.bottom()]);
        self.ops().x_object(embedded.name);
        self.restore();
        Ok(())
    }

    fn link(&mut self, area: Rect, url: &str) {
        self.annotate(area, LinkTarget::Uri(url.to_string()));
    }

    fn go_to(&mut self, area: Rect, destination: &str) {
        self.annotate(area, LinkTarget::Named(destination.to_string()));
    }

    fn page_link(&mut self, area: Rect, page: usize) {
        self.annotate(area, LinkTarget::Page(page));
    }
}
