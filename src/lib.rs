//! Layout renderer
//!
//! Paints a fully laid-out page tree (lines of positioned inlines, vectors,
//! images, SVGs, clip brackets, watermarks) onto a drawing sink. The PDF
//! sink writes documents with pdf-writer; the recording sink captures the
//! exact primitive trace for tests and tooling.
//!
//! ```text
//! layout JSON → Document → LayoutRenderer → DrawingSink (PdfCanvas | RecordingSink)
//! ```

pub mod canvas;
pub mod config;
pub mod decoration;
pub mod document;
pub mod error;
pub mod extended;
pub mod font_registry;
pub mod font_utils;
pub mod image;
pub mod image_utils;
pub mod line;
pub mod path_data;
pub mod recording;
pub mod renderer;
pub mod sink;
pub mod standard_fonts;
pub mod svg;
pub mod types;
pub mod unicode_utils;
pub mod vector;

pub use canvas::PdfCanvas;
pub use config::RenderOptions;
pub use document::{Document, Page, PageReferences, RenderItem};
pub use error::{RendererError, RendererResult};
pub use font_registry::{Font, FontProvider, FontRegistry, FontStyle};
pub use recording::{Command, RecordingSink};
pub use renderer::{render_pages, LayoutRenderer, ProgressCallback, RenderContext};
pub use sink::{DrawingSink, StateGuard};
pub use svg::{RasterSvgConverter, SvgConverter};
