//! Font utilities for PDF embedding
//!
//! TrueType faces are embedded as Type0 fonts (CIDFontType2, Identity-H)
//! with glyph ids used directly as CIDs, so shown strings are sequences of
//! big-endian glyph ids.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;
use pdf_writer::types::{CidFontType, FontFlags, SystemInfo};
use pdf_writer::{Name, Pdf, Rect, Ref, Str};
use ttf_parser::Face;

use crate::error::{RendererError, RendererResult};

/// Load and validate a TTF/OTF font file.
pub fn load_font_file(path: &str) -> RendererResult<Vec<u8>> {
    if !Path::new(path).exists() {
        return Err(RendererError::FontError(format!("Font file not found: {}", path)));
    }
    let font_data = std::fs::read(path)?;
    Face::parse(&font_data, 0)
        .map_err(|e| RendererError::FontError(format!("Invalid font file {}: {}", path, e)))?;
    Ok(font_data)
}

/// Leak a resource name so it can live in `Name<'static>`.
pub(crate) fn static_name(name: String) -> Name<'static> {
    let leaked: &'static str = Box::leak(name.into_boxed_str());
    Name(leaked.as_bytes())
}

/// Embed a TrueType font as a Type0 font under `font_id`.
///
/// Writes the font file, FontDescriptor, CIDFont with widths, CIDToGIDMap
/// and ToUnicode CMap. Returns the resource name used in page resources.
pub fn add_truetype_font(
    pdf: &mut Pdf,
    font_data: &[u8],
    font_id: Ref,
    next_ref_id: &mut i32,
) -> RendererResult<Name<'static>> {
    let face = Face::parse(font_data, 0)
        .map_err(|e| RendererError::FontError(format!("Invalid font file: {}", e)))?;

    let scale = 1000.0 / face.units_per_em() as f32;
    let ascent = face.ascender() as f32 * scale;
    let descent = face.descender() as f32 * scale;
    let bbox = face.global_bounding_box();

    let family = face
        .names()
        .into_iter()
        .find(|name| name.name_id == ttf_parser::name_id::FAMILY)
        .and_then(|name| name.to_string())
        .unwrap_or_else(|| format!("Font{}", font_id.get()));

    // CID == GID, so only the reverse Unicode mapping and the widths need collecting.
    let mut unicode_by_gid: BTreeMap<u16, u32> = BTreeMap::new();
    let mut widths: BTreeMap<u16, f32> = BTreeMap::new();
    for code_point in 0x20u32..=0xFFFF {
        let Some(ch) = char::from_u32(code_point) else { continue };
        let Some(glyph) = face.glyph_index(ch) else { continue };
        unicode_by_gid.entry(glyph.0).or_insert(code_point);
        widths.entry(glyph.0).or_insert_with(|| {
            face.glyph_hor_advance(glyph)
                .map(|adv| (adv as f32 * scale).round())
                .unwrap_or(500.0)
        });
    }
    if unicode_by_gid.is_empty() {
        return Err(RendererError::FontError(format!(
            "Font '{}' does not provide any Unicode glyphs in the BMP",
            family
        )));
    }

    let mut alloc = || {
        let r = Ref::new(*next_ref_id);
        *next_ref_id += 1;
        r
    };
    let descriptor_id = alloc();
    let cid_font_id = alloc();
    let cid_to_gid_id = alloc();
    let font_file_id = alloc();
    let to_unicode_id = alloc();

    let max_gid = face.number_of_glyphs();
    let cid_to_gid: Vec<u8> = (0..max_gid).flat_map(|gid| gid.to_be_bytes()).collect();
    pdf.stream(cid_to_gid_id, &cid_to_gid);

    pdf.stream(font_file_id, font_data)
        .pair(Name(b"Length1"), font_data.len() as i32);

    pdf.stream(to_unicode_id, to_unicode_cmap(&unicode_by_gid).as_bytes());

    let base_font = static_name(family.replace(' ', ""));

    pdf.font_descriptor(descriptor_id)
        .name(base_font)
        .flags(FontFlags::SYMBOLIC)
        .bbox(Rect::new(
            bbox.x_min as f32 * scale,
            bbox.y_min as f32 * scale,
            bbox.x_max as f32 * scale,
            bbox.y_max as f32 * scale,
        ))
        .italic_angle(face.italic_angle().unwrap_or(0.0))
        .ascent(ascent)
        .descent(descent)
        .cap_height(face.capital_height().map(|h| h as f32 * scale).unwrap_or(ascent))
        .stem_v(80.0)
        .font_file2(font_file_id);

    {
        let mut cid_font = pdf.cid_font(cid_font_id);
        cid_font
            .subtype(CidFontType::Type2)
            .base_font(base_font)
            .system_info(SystemInfo {
                registry: Str(b"Adobe"),
                ordering: Str(b"Identity"),
                supplement: 0,
            })
            .font_descriptor(descriptor_id)
            .default_width(500.0)
            .cid_to_gid_map_stream(cid_to_gid_id);

        let mut writer = cid_font.widths();
        let mut iter = widths.into_iter().peekable();
        while let Some((start, first)) = iter.next() {
            let mut run = vec![first];
            let mut last = start;
            while let Some(&(next, width)) = iter.peek() {
                if next != last + 1 {
                    break;
                }
                run.push(width);
                last = next;
                iter.next();
            }
            writer.consecutive(start, run);
        }
    }

    pdf.type0_font(font_id)
        .base_font(base_font)
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_id)
        .to_unicode(to_unicode_id);

    debug!("Embedded TrueType font {} as {:?}", family, font_id);
    Ok(static_name(format!("F{}", font_id.get())))
}

fn to_unicode_cmap(unicode_by_gid: &BTreeMap<u16, u32>) -> String {
    let pairs: Vec<(&u16, &u32)> = unicode_by_gid.iter().collect();
    let mut sections = String::new();
    // At most 100 entries per bfchar block.
    for chunk in pairs.chunks(100) {
        sections.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, unicode) in chunk {
            sections.push_str(&format!("<{:04X}> <{:04X}>\n", gid, unicode));
        }
        sections.push_str("endbfchar\n");
    }
    format!(
        "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo
<< /Registry (Adobe)
   /Ordering (UCS)
   /Supplement 0
>> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
{}endcmap
CMapName currentdict /CMap defineresource pop
end
end",
        sections
    )
}
