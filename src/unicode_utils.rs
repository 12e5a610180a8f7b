//! Unicode utilities for PDF text rendering
//!
//! The built-in Type1 fonts are written with WinAnsiEncoding (Windows code
//! page 1252). Latin-1 maps straight through; 0x80..=0x9F holds the extra
//! typographic characters. Anything else needs an embedded TrueType font.

/// Byte used for characters WinAnsiEncoding cannot express.
pub const REPLACEMENT: u8 = b'?';

/// Map one character to its WinAnsiEncoding byte.
pub fn winansi_byte(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        // Layout passes tabs and newlines through; treat them as spaces.
        0x09 | 0x0A | 0x0D => Some(b' '),
        _ => {
            let byte = match ch {
                '€' => 0x80,
                '‚' => 0x82,
                'ƒ' => 0x83,
                '„' => 0x84,
                '…' => 0x85,
                '†' => 0x86,
                '‡' => 0x87,
                'ˆ' => 0x88,
                '‰' => 0x89,
                'Š' => 0x8A,
                '‹' => 0x8B,
                'Œ' => 0x8C,
                'Ž' => 0x8E,
                '\u{2018}' => 0x91,
                '\u{2019}' => 0x92,
                '\u{201C}' => 0x93,
                '\u{201D}' => 0x94,
                '•' => 0x95,
                '–' => 0x96,
                '—' => 0x97,
                '˜' => 0x98,
                '™' => 0x99,
                'š' => 0x9A,
                '›' => 0x9B,
                'œ' => 0x9C,
                'ž' => 0x9E,
                'Ÿ' => 0x9F,
                _ => return None,
            };
            Some(byte)
        }
    }
}

/// Convert a Unicode string to WinAnsiEncoding bytes, replacing
/// unsupported characters with `?`.
pub fn unicode_to_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| winansi_byte(ch).unwrap_or(REPLACEMENT))
        .collect()
}

/// Whether every character survives WinAnsiEncoding.
pub fn is_winansi(text: &str) -> bool {
    text.chars().all(|ch| winansi_byte(ch).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        assert_eq!(unicode_to_winansi("Page 12"), b"Page 12".to_vec());
    }

    #[test]
    fn test_latin1_and_typographic_characters() {
        assert_eq!(unicode_to_winansi("é"), vec![0xE9]);
        assert_eq!(unicode_to_winansi("Ó"), vec![0xD3]);
        assert_eq!(unicode_to_winansi("€—…"), vec![0x80, 0x97, 0x85]);
        assert_eq!(unicode_to_winansi("\u{201C}x\u{201D}"), vec![0x93, b'x', 0x94]);
    }

    #[test]
    fn test_unsupported_characters_are_replaced() {
        // Polish ł and ą are not in code page 1252.
        assert_eq!(unicode_to_winansi("łą"), vec![REPLACEMENT, REPLACEMENT]);
        assert!(!is_winansi("Łódź"));
        assert!(is_winansi("Zürich"));
    }
}
