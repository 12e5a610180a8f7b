//! Metrics for the PDF base-14 text fonts
//!
//! Advance widths (1/1000 em) for printable ASCII, taken from the Adobe
//! core font AFM files. Characters outside the table fall back to the
//! width of `o`. Oblique faces share the upright widths.

/// Base-14 family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFamily {
    Helvetica,
    Times,
    Courier,
}

impl StandardFamily {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "helvetica" | "arial" => Some(Self::Helvetica),
            "times" | "times-roman" | "times new roman" => Some(Self::Times),
            "courier" | "courier new" => Some(Self::Courier),
            _ => None,
        }
    }

    pub fn family_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::Times => "Times",
            Self::Courier => "Courier",
        }
    }
}

/// One concrete base-14 face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StandardFont {
    pub family: StandardFamily,
    pub bold: bool,
    pub italic: bool,
}

impl StandardFont {
    pub fn new(family: StandardFamily, bold: bool, italic: bool) -> Self {
        Self { family, bold, italic }
    }

    /// PostScript name used as the Type1 `/BaseFont`.
    pub fn base_font(&self) -> &'static str {
        match (self.family, self.bold, self.italic) {
            (StandardFamily::Helvetica, false, false) => "Helvetica",
            (StandardFamily::Helvetica, true, false) => "Helvetica-Bold",
            (StandardFamily::Helvetica, false, true) => "Helvetica-Oblique",
            (StandardFamily::Helvetica, true, true) => "Helvetica-BoldOblique",
            (StandardFamily::Times, false, false) => "Times-Roman",
            (StandardFamily::Times, true, false) => "Times-Bold",
            (StandardFamily::Times, false, true) => "Times-Italic",
            (StandardFamily::Times, true, true) => "Times-BoldItalic",
            (StandardFamily::Courier, false, false) => "Courier",
            (StandardFamily::Courier, true, false) => "Courier-Bold",
            (StandardFamily::Courier, false, true) => "Courier-Oblique",
            (StandardFamily::Courier, true, true) => "Courier-BoldOblique",
        }
    }

    pub fn ascender(&self) -> f64 {
        match self.family {
            StandardFamily::Helvetica => 718.0,
            StandardFamily::Times => 683.0,
            StandardFamily::Courier => 629.0,
        }
    }

    pub fn descender(&self) -> f64 {
        match self.family {
            StandardFamily::Helvetica => -207.0,
            StandardFamily::Times => -217.0,
            StandardFamily::Courier => -157.0,
        }
    }

    /// Advance width of one character in 1/1000 em.
    pub fn char_width(&self, ch: char) -> f64 {
        let table = match (self.family, self.bold) {
            (StandardFamily::Courier, _) => return 600.0,
            (StandardFamily::Helvetica, false) => &HELVETICA,
            (StandardFamily::Helvetica, true) => &HELVETICA_BOLD,
            (StandardFamily::Times, false) => &TIMES_ROMAN,
            (StandardFamily::Times, true) => &TIMES_BOLD,
        };
        let code = ch as u32;
        if (32..=126).contains(&code) {
            table[(code - 32) as usize] as f64
        } else {
            table[(b'o' - 32) as usize] as f64
        }
    }
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helvetica_widths() {
        let font = StandardFont::new(StandardFamily::Helvetica, false, false);
        assert_eq!(font.char_width(' '), 278.0);
        assert_eq!(font.char_width('7'), 556.0);
        assert_eq!(font.char_width('W'), 944.0);
        assert_eq!(font.char_width('~'), 584.0);
    }

    #[test]
    fn test_courier_is_monospaced() {
        let font = StandardFont::new(StandardFamily::Courier, true, true);
        assert_eq!(font.char_width('i'), 600.0);
        assert_eq!(font.char_width('M'), 600.0);
        assert_eq!(font.base_font(), "Courier-BoldOblique");
    }

    #[test]
    fn test_family_lookup() {
        assert_eq!(StandardFamily::from_name("Arial"), Some(StandardFamily::Helvetica));
        assert_eq!(StandardFamily::from_name("times"), Some(StandardFamily::Times));
        assert_eq!(StandardFamily::from_name("Roboto"), None);
    }
}
