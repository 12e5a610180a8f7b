//! Vector shape interpreter
//!
//! Turns one laid-out vector (ellipse, rect, line, polyline, path) into path
//! construction plus a single paint call. Vectors whose type carries the
//! [`EXTENDED_PREFIX`] are raw graphics-state instructions and are handed to
//! the extended interpreter untouched.

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::document::PatternRegistry;
use crate::error::RendererResult;
use crate::extended::{render_extended, ExtendedInstruction};
use crate::sink::{Dash, DrawingSink, GradientId, LineCap, LineJoin, Paint};
use crate::types::{Color, ColorValue, Point};

/// Type-tag prefix of extended instructions, e.g. `"ext:rotate"`.
pub const EXTENDED_PREFIX: &str = "ext:";

/// Geometry of a vector
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VectorKind {
    Ellipse {
        x: f64,
        y: f64,
        r1: f64,
        #[serde(default)]
        r2: Option<f64>,
    },
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        #[serde(default)]
        r: Option<f64>,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    Polyline {
        #[serde(default)]
        points: Vec<Point>,
        #[serde(default, rename = "closePath")]
        close_path: bool,
    },
    Path {
        d: String,
    },
    #[serde(skip)]
    Extended(ExtendedInstruction),
    #[serde(other)]
    Unsupported,
}

/// Optional styling shared by all standard shapes
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VectorStyle {
    pub line_width: Option<f64>,
    pub dash: Option<Dash>,
    pub line_join: Option<LineJoin>,
    pub line_cap: Option<LineCap>,
    /// Fill color or pattern marker.
    pub color: Option<ColorValue>,
    pub line_color: Option<Color>,
    pub fill_opacity: Option<f64>,
    pub stroke_opacity: Option<f64>,
    /// Stops of a horizontal gradient replacing the fill color.
    pub linear_gradient: Option<Vec<Color>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct VectorShape {
    pub kind: VectorKind,
    pub style: VectorStyle,
}

impl TryFrom<Map<String, Value>> for VectorShape {
    type Error = String;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let tag = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| "vector without a type".to_string())?
            .to_string();

        if let Some(op) = tag.strip_prefix(EXTENDED_PREFIX) {
            map.insert("op".to_string(), Value::String(op.to_string()));
            let instruction: ExtendedInstruction =
                serde_json::from_value(Value::Object(map)).map_err(|e| format!("{}: {}", tag, e))?;
            return Ok(Self {
                kind: VectorKind::Extended(instruction),
                style: VectorStyle::default(),
            });
        }

        let value = Value::Object(map);
        let kind: VectorKind =
            serde_json::from_value(value.clone()).map_err(|e| format!("{}: {}", tag, e))?;
        let style: VectorStyle =
            serde_json::from_value(value).map_err(|e| format!("{} style: {}", tag, e))?;
        Ok(Self { kind, style })
    }
}

/// Emit the sink calls for one vector.
pub fn render_vector(
    vector: &VectorShape,
    sink: &mut dyn DrawingSink,
    patterns: &PatternRegistry,
) -> RendererResult<()> {
    match &vector.kind {
        VectorKind::Extended(instruction) => return render_extended(instruction, sink, patterns),
        VectorKind::Unsupported => {
            debug!("Skipping unsupported vector type");
            return Ok(());
        }
        _ => {}
    }

    let style = &vector.style;
    sink.line_width(style.line_width.unwrap_or(1.0));
    sink.dash(style.dash);
    sink.line_join(style.line_join.unwrap_or_default());
    sink.line_cap(style.line_cap.unwrap_or_default());

    let mut gradient = None;
    match &vector.kind {
        VectorKind::Ellipse { x, y, r1, r2 } => {
            sink.ellipse(*x, *y, *r1, r2.unwrap_or(*r1));
            if let Some(stops) = &style.linear_gradient {
                gradient = Some(horizontal_gradient(sink, x - r1, x + r1, *y, stops));
            }
        }
        VectorKind::Rect { x, y, w, h, r } => {
            match r {
                Some(radius) if *radius > 0.0 => sink.rounded_rect(*x, *y, *w, *h, *radius),
                _ => sink.rect(*x, *y, *w, *h),
            }
            if let Some(stops) = &style.linear_gradient {
                gradient = Some(horizontal_gradient(sink, *x, x + w, *y, stops));
            }
        }
        VectorKind::Line { x1, y1, x2, y2 } => {
            sink.move_to(*x1, *y1);
            sink.line_to(*x2, *y2);
        }
        VectorKind::Polyline { points, close_path } => {
            let Some((first, rest)) = points.split_first() else {
                return Ok(());
            };
            sink.move_to(first.x, first.y);
            for point in rest {
                sink.line_to(point.x, point.y);
            }
            let closed = points.last() == Some(first);
            if points.len() > 1 && (*close_path || closed) {
                sink.close_path();
            }
        }
        VectorKind::Path { d } => sink.path(d)?,
        VectorKind::Extended(_) | VectorKind::Unsupported => {}
    }

    let fill = match (gradient, &style.color) {
        (Some(id), _) => Some(Paint::Gradient(id)),
        (None, Some(color)) => Some(patterns.resolve(color)?),
        (None, None) => None,
    };
    let fill_opacity = style.fill_opacity.unwrap_or(1.0);
    let stroke_opacity = style.stroke_opacity.unwrap_or(1.0);

    match (fill, style.line_color) {
        (Some(fill), Some(line)) => {
            sink.fill_color(&fill, Some(fill_opacity));
            sink.stroke_color(&Paint::Solid(line), Some(stroke_opacity));
            sink.fill_and_stroke();
        }
        (Some(fill), None) => {
            sink.fill_color(&fill, Some(fill_opacity));
            sink.fill();
        }
        (None, line) => {
            sink.stroke_color(&Paint::Solid(line.unwrap_or_else(Color::black)), Some(stroke_opacity));
            sink.stroke();
        }
    }
    Ok(())
}

/// Gradient along `y` from `x1` to `x2` with evenly spaced stops.
fn horizontal_gradient(sink: &mut dyn DrawingSink, x1: f64, x2: f64, y: f64, stops: &[Color]) -> GradientId {
    let id = sink.linear_gradient(x1, y, x2, y);
    let step = if stops.len() > 1 { 1.0 / (stops.len() - 1) as f64 } else { 0.0 };
    for (i, color) in stops.iter().enumerate() {
        sink.gradient_stop(id, i as f64 * step, *color);
    }
    id
}
