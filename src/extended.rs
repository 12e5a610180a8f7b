//! Extended vector instructions
//!
//! A flat instruction set for raw graphics-state sequences the shape
//! vocabulary cannot express. Each instruction maps to exactly the sink
//! calls it names. Line width is the only implicit default; join, cap and
//! dash change only when given.

use log::debug;
use serde::Deserialize;

use crate::document::PatternRegistry;
use crate::error::RendererResult;
use crate::sink::{Dash, DrawingSink, LineCap, LineJoin, Paint};
use crate::types::{Color, ColorValue, Point};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ExtendedInstruction {
    Save,
    Restore,
    Rotate {
        angle: f64,
        #[serde(default)]
        origin: Option<Point>,
    },
    Translate {
        x: f64,
        y: f64,
    },
    Scale {
        sx: f64,
        #[serde(default)]
        sy: Option<f64>,
        #[serde(default)]
        origin: Option<Point>,
    },
    LineStyle {
        #[serde(default, rename = "lineWidth")]
        line_width: Option<f64>,
        #[serde(default)]
        dash: Option<Dash>,
        #[serde(default, rename = "lineJoin")]
        line_join: Option<LineJoin>,
        #[serde(default, rename = "lineCap")]
        line_cap: Option<LineCap>,
    },
    StrokeColor {
        color: Color,
        #[serde(default)]
        opacity: Option<f64>,
    },
    FillColor {
        color: ColorValue,
        #[serde(default)]
        opacity: Option<f64>,
    },
    Stroke,
    Fill,
    FillAndStroke,
    MoveTo {
        x: f64,
        y: f64,
    },
    LineTo {
        x: f64,
        y: f64,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        #[serde(default)]
        r: Option<f64>,
    },
    Ellipse {
        x: f64,
        y: f64,
        r1: f64,
        #[serde(default)]
        r2: Option<f64>,
    },
    QuadraticCurveTo {
        cpx: f64,
        cpy: f64,
        x: f64,
        y: f64,
    },
    BezierCurveTo {
        cp1x: f64,
        cp1y: f64,
        cp2x: f64,
        cp2y: f64,
        x: f64,
        y: f64,
    },
    ClosePath,
    ClipRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    },
    #[serde(other)]
    Unsupported,
}

/// Dispatch one extended instruction.
pub fn render_extended(
    instruction: &ExtendedInstruction,
    sink: &mut dyn DrawingSink,
    patterns: &PatternRegistry,
) -> RendererResult<()> {
    use ExtendedInstruction::*;

    match instruction {
        Save => sink.save(),
        Restore => sink.restore(),
        Rotate { angle, origin } => sink.rotate(*angle, origin.unwrap_or(Point::new(0.0, 0.0))),
        Translate { x, y } => sink.translate(*x, *y),
        Scale { sx, sy, origin } => {
            sink.scale(*sx, sy.unwrap_or(*sx), origin.unwrap_or(Point::new(0.0, 0.0)))
        }
        LineStyle { line_width, dash, line_join, line_cap } => {
            sink.line_width(line_width.unwrap_or(1.0));
            if let Some(dash) = dash {
                sink.dash(Some(*dash));
            }
            if let Some(join) = line_join {
                sink.line_join(*join);
            }
            if let Some(cap) = line_cap {
                sink.line_cap(*cap);
            }
        }
        StrokeColor { color, opacity } => sink.stroke_color(&Paint::Solid(*color), *opacity),
        FillColor { color, opacity } => {
            let paint = patterns.resolve(color)?;
            sink.fill_color(&paint, *opacity);
        }
        Stroke => sink.stroke(),
        Fill => sink.fill(),
        FillAndStroke => sink.fill_and_stroke(),
        MoveTo { x, y } => sink.move_to(*x, *y),
        LineTo { x, y } => sink.line_to(*x, *y),
        Line { x1, y1, x2, y2 } => {
            sink.move_to(*x1, *y1);
            sink.line_to(*x2, *y2);
        }
        Rect { x, y, w, h, r } => match r {
            Some(radius) if *radius > 0.0 => sink.rounded_rect(*x, *y, *w, *h, *radius),
            _ => sink.rect(*x, *y, *w, *h),
        },
        Ellipse { x, y, r1, r2 } => sink.ellipse(*x, *y, *r1, r2.unwrap_or(*r1)),
        QuadraticCurveTo { cpx, cpy, x, y } => sink.quadratic_curve_to(*cpx, *cpy, *x, *y),
        BezierCurveTo { cp1x, cp1y, cp2x, cp2y, x, y } => {
            sink.bezier_curve_to(*cp1x, *cp1y, *cp2x, *cp2y, *x, *y)
        }
        ClosePath => sink.close_path(),
        ClipRect { x, y, w, h } => {
            sink.rect(*x, *y, *w, *h);
            sink.clip();
        }
        Unsupported => debug!("Skipping unsupported extended instruction"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Command, RecordingSink};
    use crate::types::Size;
    use crate::vector::{render_vector, VectorShape};

    fn render_all(json: &str) -> Vec<Command> {
        let vectors: Vec<VectorShape> = serde_json::from_str(json).unwrap();
        let mut sink = RecordingSink::new(Size::new(595.0, 842.0));
        for vector in &vectors {
            render_vector(vector, &mut sink, &PatternRegistry::default()).unwrap();
        }
        sink.commands
    }

    #[test]
    fn test_sequence_bypasses_shape_defaults() {
        let commands = render_all(
            r##"[
                {"type": "ext:save"},
                {"type": "ext:rotate", "angle": 45, "origin": {"x": 10, "y": 10}},
                {"type": "ext:lineStyle"},
                {"type": "ext:moveTo", "x": 0, "y": 0},
                {"type": "ext:bezierCurveTo", "cp1x": 1, "cp1y": 2, "cp2x": 3, "cp2y": 4, "x": 5, "y": 6},
                {"type": "ext:closePath"},
                {"type": "ext:strokeColor", "color": "#00ff00", "opacity": 0.25},
                {"type": "ext:stroke"},
                {"type": "ext:restore"}
            ]"##,
        );
        assert_eq!(
            commands,
            vec![
                Command::Save,
                Command::Rotate { angle: 45.0, origin: Point::new(10.0, 10.0) },
                Command::LineWidth(1.0),
                Command::MoveTo(0.0, 0.0),
                Command::BezierCurveTo(1.0, 2.0, 3.0, 4.0, 5.0, 6.0),
                Command::ClosePath,
                Command::StrokeColor(Paint::Solid(Color::rgb(0.0, 1.0, 0.0)), Some(0.25)),
                Command::Stroke,
                Command::Restore,
            ]
        );
    }

    #[test]
    fn test_line_style_leaves_join_and_cap_untouched() {
        let commands = render_all(r#"[{"type": "ext:lineStyle", "lineWidth": 2, "lineCap": "round"}]"#);
        assert_eq!(commands, vec![Command::LineWidth(2.0), Command::LineCap(LineCap::Round)]);
    }

    #[test]
    fn test_clip_rect_and_scale_defaults() {
        let commands = render_all(
            r#"[
                {"type": "ext:clipRect", "x": 1, "y": 2, "w": 3, "h": 4},
                {"type": "ext:scale", "sx": 2},
                {"type": "ext:line", "x1": 0, "y1": 0, "x2": 1, "y2": 1},
                {"type": "ext:fillColor", "color": "white"},
                {"type": "ext:fillAndStroke"}
            ]"#,
        );
        assert_eq!(
            commands,
            vec![
                Command::Rect(1.0, 2.0, 3.0, 4.0),
                Command::Clip,
                Command::Scale { sx: 2.0, sy: 2.0, origin: Point::new(0.0, 0.0) },
                Command::MoveTo(0.0, 0.0),
                Command::LineTo(1.0, 1.0),
                Command::FillColor(Paint::Solid(Color::white()), None),
                Command::FillAndStroke,
            ]
        );
    }

    #[test]
    fn test_unknown_op_is_ignored() {
        let commands = render_all(r#"[{"type": "ext:skew", "angle": 10}]"#);
        assert!(commands.is_empty());
    }

    #[test]
    fn test_malformed_instruction_is_rejected() {
        let parsed: Result<VectorShape, _> = serde_json::from_str(r#"{"type": "ext:translate", "x": 1}"#);
        assert!(parsed.is_err());
    }
}
