//! SVG path data
//!
//! Parses the `d` attribute grammar into absolute move, line and cubic
//! segments. Quadratics and elliptical arcs are normalized to cubics so the
//! PDF content stream only needs `m`, `l`, `c` and `h`.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSeg {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CurveTo(f64, f64, f64, f64, f64, f64),
    Close,
}

/// Parse path data, stopping quietly at the first malformed token.
pub fn parse_path_data(d: &str) -> Vec<PathSeg> {
    let mut segs = Vec::new();
    let mut p = PathParser::new(d);
    let mut cmd = ' ';
    let mut cur = (0.0, 0.0);
    let mut start = (0.0, 0.0);
    let mut last_cubic_ctrl2: Option<(f64, f64)> = None;
    let mut last_quad_ctrl: Option<(f64, f64)> = None;

    loop {
        p.skip_ws();
        let before = p.i;
        let Some(c) = p.next_command_or_number(&mut cmd) else {
            break;
        };
        // Numbers cannot follow Z or precede the first command.
        if p.i == before && matches!(c, ' ' | 'Z' | 'z') {
            break;
        }
        let rel = c.is_ascii_lowercase();
        let offset = |x: f64, y: f64, cur: (f64, f64)| if rel { (cur.0 + x, cur.1 + y) } else { (x, y) };

        match c.to_ascii_uppercase() {
            'M' => {
                if let Some((x, y)) = p.next_pair() {
                    cur = offset(x, y, cur);
                    start = cur;
                    segs.push(PathSeg::MoveTo(cur.0, cur.1));
                    // Further pairs are implicit line-tos.
                    while let Some((x, y)) = p.next_pair() {
                        cur = offset(x, y, cur);
                        segs.push(PathSeg::LineTo(cur.0, cur.1));
                    }
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'L' => {
                while let Some((x, y)) = p.next_pair() {
                    cur = offset(x, y, cur);
                    segs.push(PathSeg::LineTo(cur.0, cur.1));
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'H' => {
                while let Some(x) = p.next_number() {
                    cur.0 = if rel { cur.0 + x } else { x };
                    segs.push(PathSeg::LineTo(cur.0, cur.1));
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'V' => {
                while let Some(y) = p.next_number() {
                    cur.1 = if rel { cur.1 + y } else { y };
                    segs.push(PathSeg::LineTo(cur.0, cur.1));
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'C' => {
                while let Some([x1, y1, x2, y2, x, y]) = p.next_numbers::<6>() {
                    let c1 = offset(x1, y1, cur);
                    let c2 = offset(x2, y2, cur);
                    let end = offset(x, y, cur);
                    segs.push(PathSeg::CurveTo(c1.0, c1.1, c2.0, c2.1, end.0, end.1));
                    cur = end;
                    last_cubic_ctrl2 = Some(c2);
                    last_quad_ctrl = None;
                }
            }
            'S' => {
                while let Some([x2, y2, x, y]) = p.next_numbers::<4>() {
                    let c1 = match last_cubic_ctrl2 {
                        Some((px, py)) => (2.0 * cur.0 - px, 2.0 * cur.1 - py),
                        None => cur,
                    };
                    let c2 = offset(x2, y2, cur);
                    let end = offset(x, y, cur);
                    segs.push(PathSeg::CurveTo(c1.0, c1.1, c2.0, c2.1, end.0, end.1));
                    cur = end;
                    last_cubic_ctrl2 = Some(c2);
                    last_quad_ctrl = None;
                }
            }
            'Q' => {
                while let Some([x1, y1, x, y]) = p.next_numbers::<4>() {
                    let q = offset(x1, y1, cur);
                    let end = offset(x, y, cur);
                    let (c1x, c1y, c2x, c2y) = quad_to_cubic(cur.0, cur.1, q.0, q.1, end.0, end.1);
                    segs.push(PathSeg::CurveTo(c1x, c1y, c2x, c2y, end.0, end.1));
                    cur = end;
                    last_quad_ctrl = Some(q);
                    last_cubic_ctrl2 = Some((c2x, c2y));
                }
            }
            'T' => {
                while let Some((x, y)) = p.next_pair() {
                    let q = match last_quad_ctrl {
                        Some((px, py)) => (2.0 * cur.0 - px, 2.0 * cur.1 - py),
                        None => cur,
                    };
                    let end = offset(x, y, cur);
                    let (c1x, c1y, c2x, c2y) = quad_to_cubic(cur.0, cur.1, q.0, q.1, end.0, end.1);
                    segs.push(PathSeg::CurveTo(c1x, c1y, c2x, c2y, end.0, end.1));
                    cur = end;
                    last_quad_ctrl = Some(q);
                    last_cubic_ctrl2 = Some((c2x, c2y));
                }
            }
            'A' => {
                while let Some((rx, ry, rotation, large, sweep, x, y)) = p.next_arc() {
                    let end = offset(x, y, cur);
                    let curves = arc_to_cubics(cur, rx, ry, rotation, large, sweep, end);
                    last_cubic_ctrl2 = curves.iter().rev().find_map(|seg| match *seg {
                        PathSeg::CurveTo(_, _, x2, y2, _, _) => Some((x2, y2)),
                        _ => None,
                    });
                    segs.extend(curves);
                    cur = end;
                    last_quad_ctrl = None;
                }
            }
            'Z' => {
                segs.push(PathSeg::Close);
                cur = start;
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            _ => {}
        }

        // An unknown token would otherwise repeat forever.
        if p.i == before {
            break;
        }
    }

    segs
}

fn quad_to_cubic(x0: f64, y0: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> (f64, f64, f64, f64) {
    let c1x = x0 + (2.0 / 3.0) * (x1 - x0);
    let c1y = y0 + (2.0 / 3.0) * (y1 - y0);
    let c2x = x2 + (2.0 / 3.0) * (x1 - x2);
    let c2y = y2 + (2.0 / 3.0) * (y1 - y2);
    (c1x, c1y, c2x, c2y)
}

/// Elliptical arc to cubics via the center parameterization of the SVG 1.1
/// implementation notes.
fn arc_to_cubics(
    from: (f64, f64),
    rx: f64,
    ry: f64,
    x_axis_rotation: f64,
    large_arc: bool,
    sweep: bool,
    to: (f64, f64),
) -> Vec<PathSeg> {
    let (x0, y0) = from;
    let (x1, y1) = to;
    let mut rx = rx.abs();
    let mut ry = ry.abs();
    if rx == 0.0 || ry == 0.0 || from == to {
        return vec![PathSeg::LineTo(x1, y1)];
    }

    let phi = x_axis_rotation.to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();

    let dx2 = (x0 - x1) / 2.0;
    let dy2 = (y0 - y1) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    // Scale radii up when the endpoints cannot be reached.
    let x1p2 = x1p * x1p;
    let y1p2 = y1p * y1p;
    let lambda = x1p2 / (rx * rx) + y1p2 / (ry * ry);
    if lambda > 1.0 {
        let s = lambda.sqrt();
        rx *= s;
        ry *= s;
    }

    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let num = rx2 * ry2 - rx2 * y1p2 - ry2 * x1p2;
    let den = rx2 * y1p2 + ry2 * x1p2;
    let coef = if den != 0.0 {
        let sign = if large_arc == sweep { -1.0 } else { 1.0 };
        sign * (num / den).max(0.0).sqrt()
    } else {
        0.0
    };
    let cxp = coef * (rx * y1p / ry);
    let cyp = coef * (-ry * x1p / rx);

    let cx = cos_phi * cxp - sin_phi * cyp + (x0 + x1) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (y0 + y1) / 2.0;

    fn angle(ux: f64, uy: f64, vx: f64, vy: f64) -> f64 {
        (ux * vy - uy * vx).atan2(ux * vx + uy * vy)
    }

    let ux = (x1p - cxp) / rx;
    let uy = (y1p - cyp) / ry;
    let vx = (-x1p - cxp) / rx;
    let vy = (-y1p - cyp) / ry;

    let mut theta = angle(1.0, 0.0, ux, uy);
    let mut dtheta = angle(ux, uy, vx, vy);
    if !sweep && dtheta > 0.0 {
        dtheta -= 2.0 * PI;
    } else if sweep && dtheta < 0.0 {
        dtheta += 2.0 * PI;
    }

    // At most a quarter turn per cubic.
    let count = (dtheta.abs() / (PI / 2.0)).ceil().max(1.0) as usize;
    let delta = dtheta / count as f64;
    let ellipse = Ellipse { cx, cy, rx, ry, sin_phi, cos_phi };

    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(ellipse.segment(theta, theta + delta));
        theta += delta;
    }
    out
}

struct Ellipse {
    cx: f64,
    cy: f64,
    rx: f64,
    ry: f64,
    sin_phi: f64,
    cos_phi: f64,
}

impl Ellipse {
    fn map(&self, x: f64, y: f64) -> (f64, f64) {
        let x = self.rx * x;
        let y = self.ry * y;
        (
            self.cx + self.cos_phi * x - self.sin_phi * y,
            self.cy + self.sin_phi * x + self.cos_phi * y,
        )
    }

    /// Cubic approximating the arc from angle `t1` to `t2`.
    fn segment(&self, t1: f64, t2: f64) -> PathSeg {
        let k = (4.0 / 3.0) * ((t2 - t1) / 4.0).tan();
        let (s1, c1) = t1.sin_cos();
        let (s2, c2) = t2.sin_cos();

        let (c1x, c1y) = self.map(c1 - k * s1, s1 + k * c1);
        let (c2x, c2y) = self.map(c2 + k * s2, s2 - k * c2);
        let (ex, ey) = self.map(c2, s2);
        PathSeg::CurveTo(c1x, c1y, c2x, c2y, ex, ey)
    }
}

struct PathParser<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { bytes: input.as_bytes(), i: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.i).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\n' | b'\r' | b'\t' | b',')) {
            self.i += 1;
        }
    }

    fn skip_digits(&mut self) -> bool {
        let start = self.i;
        while self.peek().map_or(false, |b| b.is_ascii_digit()) {
            self.i += 1;
        }
        self.i > start
    }

    /// A new command letter, or the current one repeated when numbers follow.
    fn next_command_or_number(&mut self, current: &mut char) -> Option<char> {
        self.skip_ws();
        let b = self.peek()?;
        if b.is_ascii_alphabetic() {
            *current = b as char;
            self.i += 1;
        }
        Some(*current)
    }

    fn next_number(&mut self) -> Option<f64> {
        self.skip_ws();
        let start = self.i;

        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.i += 1;
        }
        let mut has = self.skip_digits();
        if self.peek() == Some(b'.') {
            self.i += 1;
            has |= self.skip_digits();
        }
        if has && matches!(self.peek(), Some(b'e' | b'E')) {
            let mantissa_end = self.i;
            self.i += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.i += 1;
            }
            if !self.skip_digits() {
                self.i = mantissa_end;
            }
        }

        if !has {
            self.i = start;
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.i]).ok()?.parse().ok()
    }

    fn next_numbers<const N: usize>(&mut self) -> Option<[f64; N]> {
        let start = self.i;
        let mut out = [0.0; N];
        for slot in out.iter_mut() {
            match self.next_number() {
                Some(value) => *slot = value,
                None => {
                    self.i = start;
                    return None;
                }
            }
        }
        Some(out)
    }

    fn next_pair(&mut self) -> Option<(f64, f64)> {
        self.next_numbers::<2>().map(|[x, y]| (x, y))
    }

    /// Arc flags may be packed without separators, as in `a1 1 0 011 1`.
    fn next_flag(&mut self) -> Option<bool> {
        self.skip_ws();
        match self.peek()? {
            b'0' => {
                self.i += 1;
                Some(false)
            }
            b'1' => {
                self.i += 1;
                Some(true)
            }
            _ => None,
        }
    }

    fn next_arc(&mut self) -> Option<(f64, f64, f64, bool, bool, f64, f64)> {
        let start = self.i;
        let arc = (|| {
            let [rx, ry, rotation] = self.next_numbers::<3>()?;
            let large = self.next_flag()?;
            let sweep = self.next_flag()?;
            let (x, y) = self.next_pair()?;
            Some((rx, ry, rotation, large, sweep, x, y))
        })();
        if arc.is_none() {
            self.i = start;
        }
        arc
    }
}
