//! Inline backgrounds and text decorations
//!
//! Backgrounds are painted behind the glyphs of a line, decorations on top.
//! Consecutive inlines with the same decoration, style and color share one
//! stroke so underlines run unbroken across style changes.

use log::warn;
use serde::Deserialize;

use crate::document::PatternRegistry;
use crate::error::RendererResult;
use crate::font_registry::FontProvider;
use crate::line::{Inline, TextLine};
use crate::sink::{DrawingSink, Paint, StateGuard};
use crate::types::Color;

const DASH_LENGTH: f64 = 3.96;
const DASH_SPACE: f64 = 2.84;
const WAVE_HALF_STEP: f64 = 0.7;
const WAVE_AMPLITUDE: f64 = 1.0;
const WAVE_LINE_WIDTH: f64 = 0.24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Decoration {
    Underline,
    Overline,
    LineThrough,
    #[serde(other)]
    Unknown,
}

/// One decoration or several on the same inline
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DecorationList {
    One(Decoration),
    Many(Vec<Decoration>),
}

impl DecorationList {
    pub fn as_slice(&self) -> &[Decoration] {
        match self {
            DecorationList::One(decoration) => std::slice::from_ref(decoration),
            DecorationList::Many(decorations) => decorations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecorationStyle {
    Solid,
    Double,
    Dashed,
    Dotted,
    Wavy,
}

impl DecorationStyle {
    fn parse(name: Option<&str>) -> Self {
        match name {
            None | Some("solid") => DecorationStyle::Solid,
            Some("double") => DecorationStyle::Double,
            Some("dashed") => DecorationStyle::Dashed,
            Some("dotted") => DecorationStyle::Dotted,
            Some("wavy") => DecorationStyle::Wavy,
            Some(other) => {
                warn!("Unknown decoration style '{}', drawing solid", other);
                DecorationStyle::Solid
            }
        }
    }
}

struct DecorationGroup<'a> {
    decoration: Decoration,
    style: DecorationStyle,
    color: Color,
    inlines: Vec<&'a Inline>,
}

/// Paint the background of every inline that has one.
pub fn draw_background(
    line: &TextLine,
    x: f64,
    y: f64,
    patterns: &PatternRegistry,
    sink: &mut dyn DrawingSink,
) -> RendererResult<()> {
    for inline in &line.inlines {
        let Some(background) = &inline.background else {
            continue;
        };
        let paint = patterns.resolve(background)?;
        let shift = inline.justify_shift;
        sink.fill_color(&paint, None);
        sink.rect(x + inline.x - shift, y, inline.width + shift, line.height);
        sink.fill();
    }
    Ok(())
}

/// Paint underline, overline and strike-through groups for a line.
pub fn draw_decorations(
    line: &TextLine,
    x: f64,
    y: f64,
    fonts: &dyn FontProvider,
    sink: &mut dyn DrawingSink,
) -> RendererResult<()> {
    for group in group_decorations(line) {
        draw_group(&group, line.ascender_height, x, y, fonts, sink)?;
    }
    Ok(())
}

fn group_decorations(line: &TextLine) -> Vec<DecorationGroup<'_>> {
    let mut groups: Vec<DecorationGroup<'_>> = Vec::new();
    let mut current: Option<usize> = None;

    for inline in &line.inlines {
        let Some(decorations) = &inline.decoration else {
            current = None;
            continue;
        };
        let color = inline.decoration_color.or(inline.color).unwrap_or_else(Color::black);
        let style = DecorationStyle::parse(inline.decoration_style.as_deref());

        for &decoration in decorations.as_slice() {
            let extends = current.map_or(false, |index| {
                let group = &groups[index];
                group.decoration == decoration && group.style == style && group.color == color
            });
            match current {
                Some(index) if extends => groups[index].inlines.push(inline),
                _ => {
                    groups.push(DecorationGroup { decoration, style, color, inlines: vec![inline] });
                    current = Some(groups.len() - 1);
                }
            }
        }
    }
    groups
}

fn draw_group(
    group: &DecorationGroup<'_>,
    line_ascent: f64,
    x: f64,
    y: f64,
    fonts: &dyn FontProvider,
    sink: &mut dyn DrawingSink,
) -> RendererResult<()> {
    let (Some(first), Some(biggest)) = (group.inlines.first(), biggest_inline(&group.inlines)) else {
        return Ok(());
    };

    let font = fonts.font_for(&biggest.font, biggest.bold, biggest.italics)?;
    let total_width: f64 = group.inlines.iter().map(|i| i.width + i.justify_shift).sum();
    let ascent = font.ascender / 1000.0 * biggest.font_size;
    let descent = biggest.height - ascent;
    let lw = 0.5 + ((biggest.font_size - 8.0).max(0.0) / 2.0).floor() * 0.12;

    let y = match group.decoration {
        Decoration::Underline => y + line_ascent + descent * 0.45,
        Decoration::Overline => y + line_ascent - ascent * 0.85,
        Decoration::LineThrough => y + line_ascent - ascent * 0.25,
        Decoration::Unknown => {
            warn!("Skipping unknown text decoration");
            return Ok(());
        }
    };

    let x0 = x + first.x;
    let paint = Paint::Solid(group.color);
    let mut sink = StateGuard::new(sink);

    match group.style {
        DecorationStyle::Double => {
            let gap = (lw * 2.0).max(0.5);
            sink.fill_color(&paint, None);
            sink.rect(x0, y - lw / 2.0, total_width, lw / 2.0);
            sink.fill();
            sink.rect(x0, y + gap - lw / 2.0, total_width, lw / 2.0);
            sink.fill();
        }
        DecorationStyle::Dashed => {
            let count = (total_width / (DASH_LENGTH + DASH_SPACE)).ceil() as usize;
            sink.rect(x0, y, total_width, lw);
            sink.clip();
            sink.fill_color(&paint, None);
            let mut dx = x0;
            for _ in 0..count {
                sink.rect(dx, y - lw / 2.0, DASH_LENGTH, lw);
                sink.fill();
                dx += DASH_LENGTH + DASH_SPACE;
            }
        }
        DecorationStyle::Dotted => {
            let count = (total_width / (lw * 3.0)).ceil() as usize;
            sink.rect(x0, y, total_width, lw);
            sink.clip();
            sink.fill_color(&paint, None);
            let mut dx = x0;
            for _ in 0..count {
                sink.rect(dx, y - lw / 2.0, lw, lw);
                sink.fill();
                dx += lw * 3.0;
            }
        }
        DecorationStyle::Wavy => {
            let sh = WAVE_HALF_STEP;
            let sv = WAVE_AMPLITUDE;
            let count = (total_width / (sh * 2.0)).ceil() as usize + 1;
            sink.rect(x0, y - sv, total_width, 2.0 * sv);
            sink.clip();
            sink.line_width(WAVE_LINE_WIDTH);
            let mut wx = x0 - 1.0;
            sink.move_to(wx, y);
            for _ in 0..count {
                sink.bezier_curve_to(wx + sh, y - sv, wx + sh * 2.0, y - sv, wx + sh * 3.0, y);
                sink.bezier_curve_to(wx + sh * 4.0, y + sv, wx + sh * 5.0, y + sv, wx + sh * 6.0, y);
                wx += sh * 6.0;
            }
            sink.stroke_color(&paint, None);
            sink.stroke();
        }
        DecorationStyle::Solid => {
            sink.fill_color(&paint, None);
            sink.rect(x0, y - lw / 2.0, total_width, lw);
            sink.fill();
        }
    }
    Ok(())
}

/// Inline with the largest font size, the first one on ties.
fn biggest_inline<'a>(inlines: &[&'a Inline]) -> Option<&'a Inline> {
    inlines.iter().copied().fold(None, |best: Option<&Inline>, inline| match best {
        Some(current) if current.font_size >= inline.font_size => Some(current),
        _ => Some(inline),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_registry::FontRegistry;
    use crate::recording::{Command, RecordingSink};
    use crate::types::{ColorValue, Size};

    fn inline(x: f64, width: f64, font_size: f64, extra: serde_json::Value) -> Inline {
        let mut value = serde_json::json!({
            "text": "abc",
            "font": "Helvetica",
            "fontSize": font_size,
            "x": x,
            "width": width,
            "height": font_size * 1.2
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(value).unwrap()
    }

    fn line(inlines: Vec<Inline>) -> TextLine {
        TextLine {
            x: 0.0,
            y: 0.0,
            inlines,
            height: 14.0,
            ascender_height: 9.0,
            id: None,
            page_reference: None,
        }
    }

    fn decorate(line: &TextLine) -> Vec<Command> {
        let mut fonts = FontRegistry::new();
        fonts.register_standard_fonts();
        let mut sink = RecordingSink::new(Size::new(595.0, 842.0));
        draw_decorations(line, 10.0, 100.0, &fonts, &mut sink).unwrap();
        sink.commands
    }

    fn rects(commands: &[Command]) -> Vec<(f64, f64, f64, f64)> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Rect(x, y, w, h) => Some((*x, *y, *w, *h)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_consecutive_inlines_share_one_underline() {
        let decorated = serde_json::json!({"decoration": "underline"});
        let commands = decorate(&line(vec![
            inline(0.0, 20.0, 10.0, decorated.clone()),
            inline(20.0, 30.0, 10.0, decorated),
        ]));

        // Helvetica 10pt: ascent 7.18, descent 12 - 7.18.
        let y = 100.0 + 9.0 + (12.0 - 7.18) * 0.45;
        let rects = rects(&commands);
        assert_eq!(rects.len(), 1);
        // 10pt: 0.5 + floor(2 / 2) * 0.12
        let lw = 0.62;
        let (rx, ry, rw, rh) = rects[0];
        assert_eq!(rx, 10.0);
        assert!((ry - (y - lw / 2.0)).abs() < 1e-9);
        assert_eq!(rw, 50.0);
        assert!((rh - lw).abs() < 1e-9);
        assert_eq!(commands.first(), Some(&Command::Save));
        assert_eq!(commands.last(), Some(&Command::Restore));
    }

    #[test]
    fn test_color_change_splits_groups() {
        let commands = decorate(&line(vec![
            inline(0.0, 20.0, 10.0, serde_json::json!({"decoration": "underline", "color": "red"})),
            inline(20.0, 30.0, 10.0, serde_json::json!({"decoration": "underline"})),
        ]));
        assert_eq!(rects(&commands).len(), 2);
        assert!(commands.contains(&Command::FillColor(Paint::Solid(Color::rgb(1.0, 0.0, 0.0)), None)));
        assert!(commands.contains(&Command::FillColor(Paint::black(), None)));
    }

    #[test]
    fn test_undecorated_inline_breaks_group() {
        let decorated = serde_json::json!({"decoration": "lineThrough"});
        let commands = decorate(&line(vec![
            inline(0.0, 10.0, 10.0, decorated.clone()),
            inline(10.0, 10.0, 10.0, serde_json::json!({})),
            inline(20.0, 10.0, 10.0, decorated),
        ]));
        assert_eq!(rects(&commands).len(), 2);
    }

    #[test]
    fn test_line_width_follows_biggest_inline() {
        let decorated = serde_json::json!({"decoration": "overline"});
        let commands = decorate(&line(vec![
            inline(0.0, 10.0, 10.0, decorated.clone()),
            inline(10.0, 10.0, 20.0, decorated.clone()),
            inline(20.0, 10.0, 20.0, decorated),
        ]));
        // 20pt: 0.5 + floor(12 / 2) * 0.12
        let rects = rects(&commands);
        assert!((rects[0].3 - 1.22).abs() < 1e-9);
        let ascent = 7.18 * 2.0;
        assert!((rects[0].1 - (100.0 + 9.0 - ascent * 0.85 - 1.22 / 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_double_style_draws_two_bars() {
        let commands = decorate(&line(vec![inline(
            5.0,
            40.0,
            10.0,
            serde_json::json!({"decoration": "underline", "decorationStyle": "double"}),
        )]));
        let rects = rects(&commands);
        assert_eq!(rects.len(), 2);
        // Bars are half the 0.62 line width, 2 * 0.62 apart.
        assert!((rects[1].1 - rects[0].1 - 1.24).abs() < 1e-9);
        assert!((rects[0].3 - 0.31).abs() < 1e-9);
    }

    #[test]
    fn test_dashed_style_clips_then_repeats() {
        let commands = decorate(&line(vec![inline(
            0.0,
            20.0,
            10.0,
            serde_json::json!({"decoration": "underline", "decorationStyle": "dashed"}),
        )]));
        assert_eq!(commands[1..3].len(), 2);
        assert!(matches!(commands[1], Command::Rect(..)));
        assert_eq!(commands[2], Command::Clip);
        // ceil(20 / 6.8) dashes plus the clip rectangle.
        assert_eq!(rects(&commands).len(), 4);
    }

    #[test]
    fn test_wavy_style_strokes_curves() {
        let commands = decorate(&line(vec![inline(
            0.0,
            14.7,
            10.0,
            serde_json::json!({"decoration": "underline", "decorationStyle": "wavy", "decorationColor": "blue"}),
        )]));
        let curves = commands.iter().filter(|c| matches!(c, Command::BezierCurveTo(..))).count();
        // ceil(14.7 / 1.4) + 1 waves of two curves each.
        assert_eq!(curves, 2 * 12);
        assert!(commands.contains(&Command::LineWidth(WAVE_LINE_WIDTH)));
        let clip = rects(&commands)[0];
        assert_eq!(clip.3, 2.0);
        assert!(commands.contains(&Command::StrokeColor(Paint::Solid(Color::rgb(0.0, 0.0, 1.0)), None)));
        assert_eq!(commands[commands.len() - 2], Command::Stroke);
    }

    #[test]
    fn test_unknown_style_falls_back_to_solid() {
        let commands = decorate(&line(vec![inline(
            0.0,
            20.0,
            10.0,
            serde_json::json!({"decoration": "underline", "decorationStyle": "zigzag"}),
        )]));
        assert_eq!(rects(&commands).len(), 1);
    }

    #[test]
    fn test_background_includes_justify_shift() {
        let mut run = inline(30.0, 20.0, 10.0, serde_json::json!({"background": "yellow"}));
        run.justify_shift = 4.0;
        let mut sink = RecordingSink::new(Size::new(595.0, 842.0));
        draw_background(&line(vec![run]), 10.0, 100.0, &PatternRegistry::default(), &mut sink).unwrap();
        assert_eq!(
            sink.commands,
            vec![
                Command::FillColor(Paint::Solid(Color::rgb(1.0, 1.0, 0.0)), None),
                Command::Rect(36.0, 100.0, 24.0, 14.0),
                Command::Fill,
            ]
        );
    }

    #[test]
    fn test_background_pattern_must_be_registered() {
        let mut run = inline(0.0, 20.0, 10.0, serde_json::json!({}));
        run.background = Some(ColorValue::Pattern(vec!["stripes".to_string()]));
        let mut sink = RecordingSink::new(Size::new(595.0, 842.0));
        assert!(draw_background(&line(vec![run]), 0.0, 0.0, &PatternRegistry::default(), &mut sink).is_err());
    }
}
