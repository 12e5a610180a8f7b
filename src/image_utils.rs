//! Image utilities for PDF rendering
//!
//! Resolves image sources to bytes, decodes them and writes image XObjects.
//! Alpha goes into a separate soft mask. 8-bit DCT JPEGs in gray or RGB are
//! embedded as-is with DCTDecode.

use std::collections::HashMap;
use std::path::Path;

use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};
use log::debug;
use pdf_writer::{Filter, Name, Pdf, Ref};

use crate::error::{RendererError, RendererResult};
use crate::font_utils::static_name;
use crate::types::{Alignment, Rect, VerticalAlignment};

/// Decoded image ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: ImagePixels,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImagePixels {
    /// 8-bit RGB with an optional 8-bit alpha plane.
    Rgb { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
    /// Untouched JPEG stream.
    Jpeg { data: Vec<u8>, components: u8 },
}

/// Fetch the encoded bytes behind an image reference: a registered key,
/// a `data:` URL or a file path, in that order.
pub fn resolve_image_bytes(source: &str, registered: &HashMap<String, Vec<u8>>) -> RendererResult<Vec<u8>> {
    if let Some(data) = registered.get(source) {
        return Ok(data.clone());
    }
    if let Some(rest) = source.strip_prefix("data:") {
        let (_, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| RendererError::ImageError("only base64 data URLs are supported".to_string()))?;
        return base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| RendererError::ImageError(format!("Invalid base64 image data: {}", e)));
    }
    if !Path::new(source).exists() {
        return Err(RendererError::ImageError(format!("Image file not found: {}", source)));
    }
    Ok(std::fs::read(source)?)
}

/// Decode encoded image bytes.
pub fn decode_image(data: &[u8]) -> RendererResult<DecodedImage> {
    let format = image::guess_format(data)
        .map_err(|e| RendererError::ImageError(format!("Failed to detect image format: {}", e)))?;

    if format == ImageFormat::Jpeg {
        if let Some((width, height, components)) = jpeg_passthrough_info(data) {
            debug!("Embedding JPEG {}x{} ({} components) without re-encoding", width, height, components);
            return Ok(DecodedImage {
                width,
                height,
                pixels: ImagePixels::Jpeg { data: data.to_vec(), components },
            });
        }
    }

    let image = image::load_from_memory_with_format(data, format)
        .map_err(|e| RendererError::ImageError(format!("Failed to decode image: {}", e)))?;
    Ok(from_dynamic(&image))
}

/// Split straight RGBA pixels into RGB and alpha.
pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> DecodedImage {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    let mut alpha = Vec::with_capacity(rgba.len() / 4);
    for chunk in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&chunk[..3]);
        alpha.push(chunk[3]);
    }
    let alpha = if alpha.iter().all(|&a| a == 255) { None } else { Some(alpha) };
    DecodedImage { width, height, pixels: ImagePixels::Rgb { rgb, alpha } }
}

fn from_dynamic(image: &DynamicImage) -> DecodedImage {
    let (width, height) = image.dimensions();
    if image.color().has_alpha() {
        from_rgba(width, height, image.to_rgba8().as_raw())
    } else {
        DecodedImage {
            width,
            height,
            pixels: ImagePixels::Rgb { rgb: image.to_rgb8().into_raw(), alpha: None },
        }
    }
}

/// Width, height and component count of a JPEG that can go into the PDF
/// untouched: 8-bit DCT in gray or RGB.
fn jpeg_passthrough_info(data: &[u8]) -> Option<(u32, u32, u8)> {
    let mut decoder = jpeg_decoder::Decoder::new(data);
    decoder.read_info().ok()?;
    let info = decoder.info()?;
    if info.coding_process == jpeg_decoder::CodingProcess::Lossless {
        return None;
    }
    let components = match info.pixel_format {
        jpeg_decoder::PixelFormat::L8 => 1,
        jpeg_decoder::PixelFormat::RGB24 => 3,
        _ => return None,
    };
    Some((u32::from(info.width), u32::from(info.height), components))
}

/// Write `image` as an XObject under `image_id`, plus its soft mask.
/// Returns the resource name.
pub fn add_image_xobject(
    pdf: &mut Pdf,
    image: &DecodedImage,
    image_id: Ref,
    next_ref_id: &mut i32,
) -> Name<'static> {
    match &image.pixels {
        ImagePixels::Jpeg { data, components } => {
            let mut xobject = pdf.image_xobject(image_id, data);
            xobject.filter(Filter::DctDecode);
            xobject.width(image.width as i32);
            xobject.height(image.height as i32);
            if *components == 1 {
                xobject.color_space().device_gray();
            } else {
                xobject.color_space().device_rgb();
            }
            xobject.bits_per_component(8);
        }
        ImagePixels::Rgb { rgb, alpha } => {
            // Soft mask first so the two writers never overlap.
            let smask_id = alpha.as_ref().map(|alpha| {
                let smask_id = Ref::new(*next_ref_id);
                *next_ref_id += 1;
                let mut smask = pdf.image_xobject(smask_id, alpha);
                smask.width(image.width as i32);
                smask.height(image.height as i32);
                smask.color_space().device_gray();
                smask.bits_per_component(8);
                smask_id
            });

            let mut xobject = pdf.image_xobject(image_id, rgb);
            xobject.width(image.width as i32);
            xobject.height(image.height as i32);
            xobject.color_space().device_rgb();
            xobject.bits_per_component(8);
            if let Some(smask_id) = smask_id {
                xobject.s_mask(smask_id);
            }
        }
    }
    debug!("Image XObject {} written ({}x{})", image_id.get(), image.width, image.height);
    static_name(format!("Im{}", image_id.get()))
}

/// Box an image of `natural` pixel size occupies when scaled to cover
/// `target` while keeping its aspect ratio.
pub fn cover_fit(
    natural: (u32, u32),
    target: Rect,
    align: Alignment,
    valign: VerticalAlignment,
) -> Rect {
    let (iw, ih) = (natural.0.max(1) as f64, natural.1.max(1) as f64);
    let image_ratio = iw / ih;
    let box_ratio = target.width / target.height;

    let (width, height) = if image_ratio > box_ratio {
        (target.height * image_ratio, target.height)
    } else {
        (target.width, target.width / image_ratio)
    };

    let x = match align {
        Alignment::Center => target.x + target.width / 2.0 - width / 2.0,
        Alignment::Right => target.x + target.width - width,
        Alignment::Left | Alignment::Justify => target.x,
    };
    let y = match valign {
        VerticalAlignment::Center => target.y + target.height / 2.0 - height / 2.0,
        VerticalAlignment::Bottom => target.y + target.height - height,
        VerticalAlignment::Top => target.y,
    };
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(image: DynamicImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn jpeg_bytes(image: DynamicImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_png_with_alpha_gets_a_mask() {
        let mut rgba = image::RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        rgba.put_pixel(1, 0, image::Rgba([0, 0, 255, 0]));
        let decoded = decode_image(&png_bytes(DynamicImage::ImageRgba8(rgba))).unwrap();
        assert_eq!((decoded.width, decoded.height), (2, 1));
        assert_eq!(
            decoded.pixels,
            ImagePixels::Rgb { rgb: vec![255, 0, 0, 0, 0, 255], alpha: Some(vec![255, 0]) }
        );
    }

    #[test]
    fn test_opaque_rgba_drops_alpha() {
        let decoded = from_rgba(1, 1, &[1, 2, 3, 255]);
        assert_eq!(decoded.pixels, ImagePixels::Rgb { rgb: vec![1, 2, 3], alpha: None });
    }

    #[test]
    fn test_jpeg_is_passed_through() {
        let bytes = jpeg_bytes(DynamicImage::ImageRgb8(image::RgbImage::new(3, 2)));
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.pixels, ImagePixels::Jpeg { data: bytes, components: 3 });
    }

    #[test]
    fn test_gray_jpeg_is_passed_through() {
        let bytes = jpeg_bytes(DynamicImage::ImageLuma8(image::GrayImage::new(4, 4)));
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.pixels, ImagePixels::Jpeg { data: bytes, components: 1 });
    }

    /// SOI plus a bare frame header; no scan data follows.
    fn jpeg_frame_header(sof: u8, precision: u8, components: u8) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, sof];
        bytes.extend_from_slice(&(8 + 3 * components as u16).to_be_bytes());
        bytes.extend_from_slice(&[precision, 0, 2, 0, 3, components]);
        for id in 1..=components {
            bytes.extend_from_slice(&[id, 0x11, 0]);
        }
        bytes
    }

    #[test]
    fn test_cmyk_and_12_bit_jpegs_are_not_passed_through() {
        let cmyk = jpeg_frame_header(0xC0, 8, 4);
        assert_eq!(jpeg_passthrough_info(&cmyk), None);
        assert!(!matches!(decode_image(&cmyk), Ok(DecodedImage { pixels: ImagePixels::Jpeg { .. }, .. })));

        let twelve_bit = jpeg_frame_header(0xC1, 12, 3);
        assert_eq!(jpeg_passthrough_info(&twelve_bit), None);
        assert!(!matches!(decode_image(&twelve_bit), Ok(DecodedImage { pixels: ImagePixels::Jpeg { .. }, .. })));

        assert_eq!(jpeg_passthrough_info(&jpeg_frame_header(0xC0, 8, 3)), Some((3, 2, 3)));
    }

    #[test]
    fn test_resolve_data_url_and_registered_key() {
        let mut registered = HashMap::new();
        registered.insert("logo".to_string(), vec![1, 2, 3]);
        assert_eq!(resolve_image_bytes("logo", &registered).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            resolve_image_bytes("data:image/png;base64,AQID", &HashMap::new()).unwrap(),
            vec![1, 2, 3]
        );
        assert!(resolve_image_bytes("data:image/png,raw", &HashMap::new()).is_err());
        assert!(resolve_image_bytes("/no/such/image.png", &HashMap::new()).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(decode_image(b"not an image"), Err(RendererError::ImageError(_))));
    }

    #[test]
    fn test_cover_fit_wide_image() {
        let target = Rect::new(0.0, 0.0, 100.0, 100.0);
        let fit = cover_fit((200, 100), target, Alignment::Center, VerticalAlignment::Center);
        assert_eq!(fit, Rect::new(-50.0, 0.0, 200.0, 100.0));
        let left = cover_fit((200, 100), target, Alignment::Left, VerticalAlignment::Top);
        assert_eq!(left.x, 0.0);
        let right = cover_fit((200, 100), target, Alignment::Right, VerticalAlignment::Top);
        assert_eq!(right.x, -100.0);
    }

    #[test]
    fn test_cover_fit_tall_image() {
        let target = Rect::new(10.0, 10.0, 50.0, 50.0);
        let fit = cover_fit((100, 400), target, Alignment::Center, VerticalAlignment::Bottom);
        assert_eq!(fit, Rect::new(10.0, -140.0, 50.0, 200.0));
    }
}
