//! Raster images and page watermarks

use serde::Deserialize;

use crate::error::RendererResult;
use crate::font_registry::FontProvider;
use crate::sink::{DrawingSink, ImagePlacement, ImageSource, Paint, StateGuard, TextOptions};
use crate::types::{Alignment, Color, Point, Rect, Size, VerticalAlignment};

/// Positioned image produced by layout
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    /// Registered key, file path or `data:` URL.
    pub image: String,
    pub x: f64,
    pub y: f64,
    #[serde(alias = "_width")]
    pub width: f64,
    #[serde(alias = "_height")]
    pub height: f64,
    #[serde(default)]
    pub opacity: Option<f64>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub link_to_page: Option<usize>,
    #[serde(default)]
    pub link_to_destination: Option<String>,
    #[serde(default)]
    pub cover: Option<CoverFit>,
    #[serde(default)]
    pub extension: Option<ImageExtension>,
}

impl ImageItem {
    pub fn area(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Cover box the image is scaled to fill and clipped to
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverFit {
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub align: Option<Alignment>,
    #[serde(default)]
    pub valign: Option<VerticalAlignment>,
}

/// Rotation and mirroring applied around the image
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageExtension {
    /// Degrees.
    pub rotation: f64,
    pub rotation_origin: Option<Point>,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

/// Text painted over every item of a page
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub text: String,
    pub font: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italics: bool,
    pub font_size: f64,
    #[serde(default = "Color::black")]
    pub color: Color,
    #[serde(default = "default_watermark_opacity")]
    pub opacity: f64,
    /// Degrees.
    #[serde(default)]
    pub angle: f64,
    /// Measured text box, centered on the page.
    #[serde(alias = "_size")]
    pub size: Size,
}

fn default_watermark_opacity() -> f64 {
    0.6
}

/// Place an image, then attach its annotations.
pub fn render_image(image: &ImageItem, sink: &mut dyn DrawingSink) -> RendererResult<()> {
    sink.opacity(image.opacity.unwrap_or(1.0));

    let source = ImageSource::Named(image.image.clone());
    let exact = ImagePlacement::Exact { width: image.width, height: image.height };

    if let Some(extension) = &image.extension {
        let center = image.area().center();
        let mut sink = StateGuard::new(sink);
        sink.rotate(extension.rotation, extension.rotation_origin.unwrap_or(center));
        if extension.flip_horizontal || extension.flip_vertical {
            let sx = if extension.flip_horizontal { -1.0 } else { 1.0 };
            let sy = if extension.flip_vertical { -1.0 } else { 1.0 };
            sink.scale(sx, sy, center);
        }
        sink.image(&source, image.x, image.y, &exact)?;
    } else if let Some(cover) = &image.cover {
        let width = cover.width.unwrap_or(image.width);
        let height = cover.height.unwrap_or(image.height);
        let mut sink = StateGuard::new(sink);
        sink.rect(image.x, image.y, width, height);
        sink.clip();
        let placement = ImagePlacement::Cover {
            width,
            height,
            align: cover.align.unwrap_or(Alignment::Center),
            valign: cover.valign.unwrap_or(VerticalAlignment::Center),
        };
        sink.image(&source, image.x, image.y, &placement)?;
    } else {
        sink.image(&source, image.x, image.y, &exact)?;
    }

    let area = image.area();
    if let Some(url) = &image.link {
        sink.link(area, url);
    }
    if let Some(page) = image.link_to_page {
        sink.page_link(area, page);
    }
    if let Some(destination) = &image.link_to_destination {
        sink.go_to(area, destination);
    }
    Ok(())
}

/// Paint the watermark rotated about the page center.
pub fn render_watermark(
    watermark: &Watermark,
    fonts: &dyn FontProvider,
    sink: &mut dyn DrawingSink,
) -> RendererResult<()> {
    let font = fonts.font_for(&watermark.font, watermark.bold, watermark.italics)?;
    let page = sink.page_size();

    sink.fill_color(&Paint::Solid(watermark.color), None);
    sink.opacity(watermark.opacity);

    let mut sink = StateGuard::new(sink);
    sink.rotate(watermark.angle, Point::new(page.width / 2.0, page.height / 2.0));

    let x = page.width / 2.0 - watermark.size.width / 2.0;
    let y = page.height / 2.0 - watermark.size.height / 2.0;
    sink.set_font(&font, watermark.font_size)?;
    sink.text(&watermark.text, x, y, &TextOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_registry::FontRegistry;
    use crate::recording::{Command, RecordingSink};

    fn image(extra: serde_json::Value) -> ImageItem {
        let mut value = serde_json::json!({
            "image": "logo",
            "x": 10,
            "y": 20,
            "_width": 100,
            "_height": 50
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(value).unwrap()
    }

    fn render(item: &ImageItem) -> Vec<Command> {
        let mut sink = RecordingSink::new(Size::new(595.0, 842.0));
        render_image(item, &mut sink).unwrap();
        sink.commands
    }

    fn logo() -> ImageSource {
        ImageSource::Named("logo".to_string())
    }

    #[test]
    fn test_plain_image() {
        let commands = render(&image(serde_json::json!({})));
        assert_eq!(
            commands,
            vec![
                Command::Opacity(1.0),
                Command::Image {
                    source: logo(),
                    x: 10.0,
                    y: 20.0,
                    placement: ImagePlacement::Exact { width: 100.0, height: 50.0 },
                },
            ]
        );
    }

    #[test]
    fn test_cover_clips_to_box() {
        let commands = render(&image(serde_json::json!({
            "opacity": 0.3,
            "cover": {"width": 40, "height": 40, "valign": "bottom"}
        })));
        assert_eq!(
            commands,
            vec![
                Command::Opacity(0.3),
                Command::Save,
                Command::Rect(10.0, 20.0, 40.0, 40.0),
                Command::Clip,
                Command::Image {
                    source: logo(),
                    x: 10.0,
                    y: 20.0,
                    placement: ImagePlacement::Cover {
                        width: 40.0,
                        height: 40.0,
                        align: Alignment::Center,
                        valign: VerticalAlignment::Bottom,
                    },
                },
                Command::Restore,
            ]
        );
    }

    #[test]
    fn test_extension_rotates_and_flips_about_center() {
        let commands = render(&image(serde_json::json!({
            "extension": {"rotation": 90, "flipHorizontal": true}
        })));
        let center = Point::new(60.0, 45.0);
        assert_eq!(
            &commands[1..],
            &[
                Command::Save,
                Command::Rotate { angle: 90.0, origin: center },
                Command::Scale { sx: -1.0, sy: 1.0, origin: center },
                Command::Image {
                    source: logo(),
                    x: 10.0,
                    y: 20.0,
                    placement: ImagePlacement::Exact { width: 100.0, height: 50.0 },
                },
                Command::Restore,
            ]
        );
    }

    #[test]
    fn test_extension_uses_explicit_origin() {
        let commands = render(&image(serde_json::json!({
            "extension": {"rotation": 30, "rotationOrigin": {"x": 0, "y": 0}}
        })));
        assert_eq!(commands[2], Command::Rotate { angle: 30.0, origin: Point::new(0.0, 0.0) });
        assert!(!commands.iter().any(|c| matches!(c, Command::Scale { .. })));
    }

    #[test]
    fn test_links_follow_the_image() {
        let commands = render(&image(serde_json::json!({
            "link": "https://example.com",
            "linkToPage": 3,
            "linkToDestination": "summary"
        })));
        let area = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(
            &commands[2..],
            &[
                Command::Link { area, url: "https://example.com".to_string() },
                Command::PageLink { area, page: 3 },
                Command::GoTo { area, destination: "summary".to_string() },
            ]
        );
    }

    #[test]
    fn test_watermark_is_centered_and_rotated() {
        let watermark: Watermark = serde_json::from_value(serde_json::json!({
            "text": "DRAFT",
            "font": "Helvetica",
            "bold": true,
            "fontSize": 40,
            "color": "#cccccc",
            "angle": -45,
            "size": {"width": 120, "height": 40}
        }))
        .unwrap();
        let mut fonts = FontRegistry::new();
        fonts.register_standard_fonts();
        let mut sink = RecordingSink::new(Size::new(600.0, 800.0));
        render_watermark(&watermark, &fonts, &mut sink).unwrap();

        let grey = Color::from_hex("#cccccc").unwrap();
        assert_eq!(
            sink.commands,
            vec![
                Command::FillColor(Paint::Solid(grey), None),
                Command::Opacity(0.6),
                Command::Save,
                Command::Rotate { angle: -45.0, origin: Point::new(300.0, 400.0) },
                Command::SetFont { font: "Helvetica:bold".to_string(), size: 40.0 },
                Command::Text {
                    text: "DRAFT".to_string(),
                    x: 240.0,
                    y: 380.0,
                    options: TextOptions::default(),
                },
                Command::Restore,
            ]
        );
    }
}
