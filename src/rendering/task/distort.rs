use kurbo::{CubicBez, ParamCurve, ParamCurveArclen, ParamCurveDeriv, ParamCurveNearest};

use super::{SubCoords, Task, on_parent_grid};
use crate::context::Context;
use crate::foundation::core::{
    FULL_PLANE, Point, Rect, Vec2, rect_expand_point, rect_intersect, rect_is_finite, rect_is_valid,
    rect_union,
};
use crate::foundation::math::{spherify, unspherify};
use crate::surface::Interpolation;

const ARCLEN_ACCURACY: f64 = 1e-6;
const TOO_THIN: f64 = 0.01;
const FAKE_TANGENT_STEP: f64 = 0.000_001;
const BOUNDARY_SAMPLES: usize = 64;

/// Rotation about `center` whose angle varies linearly with the distance to it.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Twirl {
    pub center: Point,
    pub radius: f64,
    /// Angle per radius of distance, in radians. The center turns by `-rotations`,
    /// the circle at `radius` stays put and points outside keep turning the other way.
    pub rotations: f64,
    pub distort_inside: bool,
    pub distort_outside: bool,
}

impl Default for Twirl {
    fn default() -> Self {
        Self {
            center: Point::ZERO,
            radius: 1.0,
            rotations: 0.0,
            distort_inside: true,
            distort_outside: false,
        }
    }
}

impl Twirl {
    pub fn point(&self, p: Point) -> Point {
        let v = p - self.center;
        let d = v.hypot();
        if self.radius == 0.0 || d == 0.0 {
            return p;
        }
        let inside = d < self.radius;
        if (inside && !self.distort_inside) || (!inside && !self.distort_outside) {
            return p;
        }
        let (s, c) = (self.rotations * (d - self.radius) / self.radius).sin_cos();
        self.center + Vec2::new(c * v.x - s * v.y, s * v.x + c * v.y)
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SpherizeType {
    #[default]
    Normal,
    Horizontal,
    Vertical,
}

impl SpherizeType {
    pub fn id(self) -> i32 {
        match self {
            SpherizeType::Normal => 0,
            SpherizeType::Horizontal => 1,
            SpherizeType::Vertical => 2,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(SpherizeType::Normal),
            1 => Some(SpherizeType::Horizontal),
            2 => Some(SpherizeType::Vertical),
            _ => None,
        }
    }
}

/// Bulge (positive amount) or pinch (negative amount) inside a circle or band.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Spherize {
    pub center: Point,
    pub radius: f64,
    pub amount: f64,
    pub kind: SpherizeType,
    /// Points outside the affected area become transparent.
    pub clip: bool,
}

impl Default for Spherize {
    fn default() -> Self {
        Self {
            center: Point::ZERO,
            radius: 1.0,
            amount: 1.0,
            kind: SpherizeType::Normal,
            clip: false,
        }
    }
}

impl Spherize {
    /// Source point for `p`, and whether `p` lies outside the affected area.
    pub fn point_clipped(&self, p: Point) -> (Point, bool) {
        if self.radius == 0.0 || !self.radius.is_finite() {
            return (p, true);
        }
        let v = (p - self.center) / self.radius;
        let t = self.amount;
        let warp = |m: f64| {
            if t > 0.0 {
                t * unspherify(m) + (1.0 - t) * m
            } else if t < 0.0 {
                (1.0 + t) * m - t * spherify(m)
            } else {
                m
            }
        };
        match self.kind {
            SpherizeType::Normal => {
                let m = v.hypot();
                if m >= 1.0 {
                    return (p, true);
                }
                if m == 0.0 {
                    return (p, false);
                }
                let d = warp(m) * self.radius;
                (self.center + v * (d / m), false)
            }
            SpherizeType::Horizontal => {
                if v.x <= -1.0 || v.x >= 1.0 {
                    return (p, true);
                }
                if v.x == 0.0 {
                    return (p, false);
                }
                (Point::new(self.center.x + warp(v.x) * self.radius, p.y), false)
            }
            SpherizeType::Vertical => {
                if v.y <= -1.0 || v.y >= 1.0 {
                    return (p, true);
                }
                if v.y == 0.0 {
                    return (p, false);
                }
                (Point::new(p.x, self.center.y + warp(v.y) * self.radius), false)
            }
        }
    }

    pub fn point(&self, p: Point) -> Option<Point> {
        let (q, clipped) = self.point_clipped(p);
        if self.clip && clipped { None } else { Some(q) }
    }

    /// How far a source point may lie from the center, in radii.
    fn reach(&self) -> f64 {
        1.0 + 2.0 * self.amount.abs()
    }

    /// Affected area grown by `reach`, limited to the `span` of the unaffected axis.
    fn area(&self, reach: f64, span: Rect) -> Rect {
        let r = self.radius.abs() * reach;
        let c = self.center;
        match self.kind {
            SpherizeType::Normal => Rect::new(c.x - r, c.y - r, c.x + r, c.y + r),
            SpherizeType::Horizontal => Rect::new(c.x - r, span.y0, c.x + r, span.y1),
            SpherizeType::Vertical => Rect::new(span.x0, c.y - r, span.x1, c.y + r),
        }
    }
}

/// Vertex of a spline with per-vertex width and independent in/out tangents.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BLinePoint {
    pub vertex: Point,
    pub width: f64,
    pub tangent1: Vec2,
    pub tangent2: Vec2,
    pub split_tangent: bool,
}

impl BLinePoint {
    pub fn new(vertex: Point, tangent: Vec2) -> Self {
        Self {
            vertex,
            width: 1.0,
            tangent1: tangent,
            tangent2: tangent,
            split_tangent: false,
        }
    }
}

/// Maps the neighbourhood of a spline onto the straight segment `start_point -> end_point`.
#[derive(Clone, Debug, PartialEq)]
pub struct CurveWarp {
    pub origin: Point,
    pub perp_width: f64,
    pub start_point: Point,
    pub end_point: Point,
    pub bline: Vec<BLinePoint>,
    pub fast: bool,
    curve_length: f64,
    perp: Vec2,
}

impl Default for CurveWarp {
    fn default() -> Self {
        Self::new(
            Point::new(-2.5, -0.5),
            Point::new(2.5, -0.3),
            Vec::new(),
        )
    }
}

impl CurveWarp {
    pub fn new(start_point: Point, end_point: Point, bline: Vec<BLinePoint>) -> Self {
        let mut out = Self {
            origin: Point::ZERO,
            perp_width: 1.0,
            start_point,
            end_point,
            bline,
            fast: true,
            curve_length: 0.0,
            perp: Vec2::ZERO,
        };
        out.sync();
        out
    }

    /// Recomputes cached values after a field changed.
    pub fn sync(&mut self) {
        self.curve_length = self.segments().map(|s| s.arclen(ARCLEN_ACCURACY)).sum();
        self.perp = normalized(perp(self.end_point - self.start_point));
    }

    fn segment(&self, i: usize) -> CubicBez {
        let a = &self.bline[i];
        let b = &self.bline[(i + 1) % self.bline.len()];
        hermite(a.vertex, b.vertex, a.tangent2, b.tangent1)
    }

    /// Zero-length curve resting on vertex `k`, shaped by its own tangents.
    fn knot(&self, k: usize) -> CubicBez {
        let b = &self.bline[k];
        hermite(b.vertex, b.vertex, b.tangent2, b.tangent1)
    }

    /// Segment ending where segment `i` starts; the first vertex's knot for `i == 0`.
    fn segment_before(&self, i: usize) -> CubicBez {
        if i > 0 { self.segment(i - 1) } else { self.knot(0) }
    }

    /// Segment starting where segment `i` ends; the last vertex's knot past the end.
    fn segment_after(&self, i: usize) -> CubicBez {
        if i + 2 < self.bline.len() {
            self.segment(i + 1)
        } else {
            self.knot(self.bline.len() - 1)
        }
    }

    fn segments(&self) -> impl Iterator<Item = CubicBez> + '_ {
        (0..self.bline.len().saturating_sub(1)).map(|i| self.segment(i))
    }

    /// Segment index, parameter, arc length up to the closest point, and whether the
    /// closest point is past either end of the spline.
    fn closest(&self, p: Point) -> (usize, f64, f64, bool) {
        const PROBES: [f64; 7] = [0.0001, 1.0 / 6.0, 2.0 / 6.0, 0.5, 4.0 / 6.0, 5.0 / 6.0, 0.9999];
        let n = self.bline.len() - 1;
        let mut best = (0usize, 0.0f64, f64::INFINITY);
        let mut consider = |i: usize, t: f64, seg: &CubicBez| {
            let d = (seg.eval(t) - p).hypot2();
            if d < best.2 {
                best = (i, t, d);
            }
        };
        for i in 0..n {
            let seg = self.segment(i);
            if self.fast {
                for t in PROBES {
                    consider(i, t, &seg);
                }
            } else {
                consider(i, seg.nearest(p, ARCLEN_ACCURACY).t, &seg);
            }
        }
        let (i, mut t, _) = best;
        let seg = self.segment(i);
        if self.fast {
            t = seg.nearest(p, ARCLEN_ACCURACY).t;
        }
        let before: f64 = (0..i).map(|k| self.segment(k).arclen(ARCLEN_ACCURACY)).sum();
        let len = before + seg.subsegment(0.0..t).arclen(ARCLEN_ACCURACY);
        let (lo, hi) = if self.fast { (0.01, 0.99) } else { (0.0, 1.0) };
        let extreme = (i == 0 && t <= lo) || (i + 1 == n && t >= hi);
        (i, t, len, extreme)
    }

    /// Source point for `p`, or `None` when the spline is degenerate.
    pub fn point(&self, p: Point) -> Option<Point> {
        if self.bline.is_empty() {
            return Some(Point::ZERO);
        }
        if !(self.curve_length > 0.0) && self.bline.len() > 1 {
            return None;
        }
        let local = p - self.origin.to_vec2();

        let (p1, tangent, thickness, len, extreme, edge_case) = if self.bline.len() == 1 {
            let b = &self.bline[0];
            (b.vertex, normalized(b.tangent1), b.width, 0.0, false, false)
        } else {
            let (i, t, len, extreme) = self.closest(local);
            let seg = self.segment(i);
            let deriv = seg.deriv();
            let p1 = seg.eval(t);
            let mut tangent = deriv.eval(t).to_vec2();
            let mut edge_case = false;
            let iter = &self.bline[i];
            let next = &self.bline[(i + 1) % self.bline.len()];
            let zero = tangent == Vec2::ZERO;
            if t < 0.00001 && (iter.split_tangent || zero) {
                if zero {
                    tangent = seg.eval(FAKE_TANGENT_STEP) - seg.eval(0.0);
                }
                let mut other = iter.tangent1;
                if other == Vec2::ZERO {
                    let other_curve = self.segment_before(i);
                    other = other_curve.eval(1.0) - other_curve.eval(1.0 - FAKE_TANGENT_STEP);
                }
                tangent = normalized(other) + normalized(tangent);
                edge_case = true;
            } else if t > 0.99999 && (next.split_tangent || zero) {
                if zero {
                    tangent = seg.eval(1.0) - seg.eval(1.0 - FAKE_TANGENT_STEP);
                }
                let mut other = next.tangent2;
                if other == Vec2::ZERO {
                    let other_curve = self.segment_after(i);
                    other = other_curve.eval(FAKE_TANGENT_STEP) - other_curve.eval(0.0);
                }
                tangent = normalized(other) + normalized(tangent);
                edge_case = true;
            }
            let thickness = (next.width - iter.width) * t + iter.width;
            (p1, normalized(tangent), thickness, len, extreme, edge_case)
        };

        let thickness = if thickness.abs() < TOO_THIN {
            if thickness > 0.0 { TOO_THIN } else { -TOO_THIN }
        } else {
            thickness
        };

        let offset = local - p1;
        let (len, diff) = if extreme {
            let (t_end, base) = if len < self.curve_length * 0.5 || self.bline.len() == 1 {
                (normalized(self.bline[0].tangent1), 0.0)
            } else {
                let last = &self.bline[self.bline.len() - 1];
                (normalized(last.tangent2), self.curve_length)
            };
            (base + offset.dot(t_end), perp(t_end))
        } else if edge_case {
            let mut diff = p1 - local;
            if diff.dot(perp(tangent)) < 0.0 {
                diff = -diff;
            }
            (len, normalized(diff))
        } else {
            (len, perp(tangent))
        };

        let unscaled = offset.dot(diff);
        let along = if self.curve_length > 0.0 {
            len / self.curve_length
        } else {
            0.5
        };
        let out = self.start_point
            + (self.end_point - self.start_point) * along
            + self.perp * (unscaled / (thickness * self.perp_width));
        (out.x.is_finite() && out.y.is_finite()).then_some(out)
    }
}

/// Projective map of the source rectangle onto a destination quad.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Perspective {
    pub src_tl: Point,
    pub src_br: Point,
    pub dest_tl: Point,
    pub dest_tr: Point,
    pub dest_bl: Point,
    pub dest_br: Point,
    /// Points outside the source rectangle become transparent.
    pub clip: bool,
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            src_tl: Point::new(-2.0, 2.0),
            src_br: Point::new(2.0, -2.0),
            dest_tl: Point::new(-1.8, 2.1),
            dest_tr: Point::new(1.8, 2.1),
            dest_bl: Point::new(-2.2, -2.0),
            dest_br: Point::new(2.2, -2.0),
            clip: true,
        }
    }
}

type Mat3 = [[f64; 3]; 3];

impl Perspective {
    /// Homography taking the unit square corners `(0,0) (1,0) (1,1) (0,1)` to `q`.
    fn square_to_quad(q: [Point; 4]) -> Mat3 {
        let sx = q[0].x - q[1].x + q[2].x - q[3].x;
        let sy = q[0].y - q[1].y + q[2].y - q[3].y;
        if sx == 0.0 && sy == 0.0 {
            return [
                [q[1].x - q[0].x, q[2].x - q[1].x, q[0].x],
                [q[1].y - q[0].y, q[2].y - q[1].y, q[0].y],
                [0.0, 0.0, 1.0],
            ];
        }
        let dx1 = q[1].x - q[2].x;
        let dx2 = q[3].x - q[2].x;
        let dy1 = q[1].y - q[2].y;
        let dy2 = q[3].y - q[2].y;
        let det = dx1 * dy2 - dx2 * dy1;
        let g = (sx * dy2 - dx2 * sy) / det;
        let h = (dx1 * sy - sx * dy1) / det;
        [
            [q[1].x - q[0].x + g * q[1].x, q[3].x - q[0].x + h * q[3].x, q[0].x],
            [q[1].y - q[0].y + g * q[1].y, q[3].y - q[0].y + h * q[3].y, q[0].y],
            [g, h, 1.0],
        ]
    }

    fn dest_quad(&self) -> [Point; 4] {
        [self.dest_tl, self.dest_tr, self.dest_br, self.dest_bl]
    }

    fn src_quad(&self) -> [Point; 4] {
        let (a, b) = (self.src_tl, self.src_br);
        [a, Point::new(b.x, a.y), b, Point::new(a.x, b.y)]
    }

    /// Destination to source.
    fn inverse_matrix(&self) -> Option<Mat3> {
        let to_dest = Self::square_to_quad(self.dest_quad());
        let to_src = Self::square_to_quad(self.src_quad());
        Some(mat_mul(&to_src, &mat_inverse(&to_dest)?))
    }

    /// Source to destination.
    fn forward_matrix(&self) -> Option<Mat3> {
        let to_dest = Self::square_to_quad(self.dest_quad());
        let to_src = Self::square_to_quad(self.src_quad());
        Some(mat_mul(&to_dest, &mat_inverse(&to_src)?))
    }

    pub fn point(&self, p: Point) -> Option<Point> {
        let q = apply_projective(&self.inverse_matrix()?, p)?;
        if self.clip {
            let r = Rect::from_points(self.src_tl, self.src_br).inflate(1e-9, 1e-9);
            if q.x < r.x0 || q.x > r.x1 || q.y < r.y0 || q.y > r.y1 {
                return None;
            }
        }
        Some(q)
    }

    fn map_rect(m: &Mat3, r: Rect) -> Rect {
        let corners = [
            Point::new(r.x0, r.y0),
            Point::new(r.x1, r.y0),
            Point::new(r.x1, r.y1),
            Point::new(r.x0, r.y1),
        ];
        let mut out = Rect::ZERO;
        for c in corners {
            match apply_projective(m, c) {
                Some(q) => out = rect_expand_point(out, q),
                None => return FULL_PLANE,
            }
        }
        out
    }
}

fn apply_projective(m: &Mat3, p: Point) -> Option<Point> {
    let w = m[2][0] * p.x + m[2][1] * p.y + m[2][2];
    if !(w > 1e-12) {
        return None;
    }
    let x = (m[0][0] * p.x + m[0][1] * p.y + m[0][2]) / w;
    let y = (m[1][0] * p.x + m[1][1] * p.y + m[1][2]) / w;
    (x.is_finite() && y.is_finite()).then(|| Point::new(x, y))
}

fn mat_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn mat_inverse(m: &Mat3) -> Option<Mat3> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if !det.is_finite() || det.abs() < 1e-12 {
        return None;
    }
    let inv = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv,
        ],
    ])
}

/// Cubic through `p0` and `p1` with Hermite end tangents `t0` and `t1`.
pub fn hermite(p0: Point, p1: Point, t0: Vec2, t1: Vec2) -> CubicBez {
    CubicBez::new(p0, p0 + t0 / 3.0, p1 - t1 / 3.0, p1)
}

fn perp(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

fn normalized(v: Vec2) -> Vec2 {
    let len = v.hypot();
    if len > 0.0 && len.is_finite() { v / len } else { Vec2::ZERO }
}

/// Destination-to-source point mapping of a non-linear distortion.
#[derive(Clone, Debug, PartialEq)]
pub enum Distortion {
    Twirl(Twirl),
    Spherize(Spherize),
    CurveWarp(CurveWarp),
    Perspective(Perspective),
}

impl Distortion {
    /// Source point sampled for destination `p`; `None` means transparent.
    pub fn point(&self, p: Point) -> Option<Point> {
        if !p.x.is_finite() || !p.y.is_finite() {
            return None;
        }
        let q = match self {
            Distortion::Twirl(d) => Some(d.point(p)),
            Distortion::Spherize(d) => d.point(p),
            Distortion::CurveWarp(d) => d.point(p),
            Distortion::Perspective(d) => d.point(p),
        }?;
        (q.x.is_finite() && q.y.is_finite()).then_some(q)
    }

    /// World area the distortion may draw, given the bounds of its source.
    pub fn bounds(&self, src: Rect) -> Rect {
        if !rect_is_valid(&src) {
            return Rect::ZERO;
        }
        match self {
            Distortion::Twirl(d) => {
                if !rect_is_finite(&src) {
                    return FULL_PLANE;
                }
                let r = max_corner_distance(d.center, src);
                let disc = Rect::new(d.center.x - r, d.center.y - r, d.center.x + r, d.center.y + r);
                if d.distort_outside {
                    disc
                } else {
                    let r = d.radius.abs();
                    let inner =
                        Rect::new(d.center.x - r, d.center.y - r, d.center.x + r, d.center.y + r);
                    rect_union(src, rect_intersect(inner, disc))
                }
            }
            Distortion::Spherize(d) => {
                let area = d.area(1.0, src);
                if d.clip {
                    area
                } else {
                    rect_union(src, area)
                }
            }
            Distortion::CurveWarp(_) => FULL_PLANE,
            Distortion::Perspective(d) => {
                let Some(fwd) = d.forward_matrix() else {
                    return Rect::ZERO;
                };
                let src = if d.clip {
                    rect_intersect(src, Rect::from_points(d.src_tl, d.src_br))
                } else {
                    src
                };
                if !rect_is_finite(&src) {
                    return if rect_is_valid(&src) {
                        FULL_PLANE
                    } else {
                        Rect::ZERO
                    };
                }
                Perspective::map_rect(&fwd, src)
            }
        }
    }

    /// Points whose images must be covered in addition to the sampled boundary.
    fn extra_area(&self, dest: Rect) -> Rect {
        match self {
            Distortion::Twirl(d) => {
                let r = if d.distort_outside {
                    max_corner_distance(d.center, dest)
                } else {
                    d.radius.abs()
                };
                rect_union(
                    dest,
                    Rect::new(d.center.x - r, d.center.y - r, d.center.x + r, d.center.y + r),
                )
            }
            Distortion::Spherize(d) => rect_union(dest, d.area(d.reach(), dest)),
            Distortion::CurveWarp(_) | Distortion::Perspective(_) => Rect::ZERO,
        }
    }
}

fn max_corner_distance(c: Point, r: Rect) -> f64 {
    [
        Point::new(r.x0, r.y0),
        Point::new(r.x1, r.y0),
        Point::new(r.x1, r.y1),
        Point::new(r.x0, r.y1),
    ]
    .iter()
    .map(|p| (*p - c).hypot())
    .fold(0.0, f64::max)
}

/// Conservative source-space rectangle read when filling `dest` through `distortion`.
///
/// Samples the destination boundary (and, for mappings that are not monotone along the
/// boundary, an interior grid), then adds the distortion's own reach and `margin`.
pub fn compute_required_source_rect(dest: Rect, distortion: &Distortion, margin: Vec2) -> Rect {
    if !rect_is_finite(&dest) {
        return if rect_is_valid(&dest) {
            FULL_PLANE
        } else {
            Rect::ZERO
        };
    }
    let mut out = distortion.extra_area(dest);
    let mut hit = rect_is_valid(&out);
    let mut add = |p: Point| {
        if let Some(q) = distortion.point(p) {
            out = if hit {
                rect_expand_point(out, q)
            } else {
                Rect::from_points(q, q)
            };
            hit = true;
        }
    };

    let n = BOUNDARY_SAMPLES;
    for i in 0..=n {
        let f = i as f64 / n as f64;
        let x = dest.x0 + dest.width() * f;
        let y = dest.y0 + dest.height() * f;
        add(Point::new(x, dest.y0));
        add(Point::new(x, dest.y1));
        add(Point::new(dest.x0, y));
        add(Point::new(dest.x1, y));
    }
    if matches!(distortion, Distortion::CurveWarp(_)) {
        let g = 24;
        for j in 0..=g {
            for i in 0..=g {
                add(Point::new(
                    dest.x0 + dest.width() * i as f64 / g as f64,
                    dest.y0 + dest.height() * j as f64 / g as f64,
                ));
            }
        }
        // Interior sampling is not exhaustive for tight curves.
        out = out.inflate(out.width() * 0.25, out.height() * 0.25);
    }
    if !hit {
        return Rect::ZERO;
    }
    out.inflate(margin.x.abs(), margin.y.abs())
}

/// Resamples its sub-task through a [`Distortion`].
#[derive(Clone, Debug)]
pub struct TaskDistort {
    pub distortion: Distortion,
    pub interpolation: Interpolation,
    /// Answers samples that fall outside the rendered source.
    pub fallback: Option<Context>,
}

impl TaskDistort {
    pub fn new(distortion: Distortion, interpolation: Interpolation) -> Self {
        Self {
            distortion,
            interpolation,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, context: Context) -> Self {
        self.fallback = Some(context);
        self
    }

    pub(super) fn bounds(&self, subs: &[Rect]) -> Rect {
        self.distortion
            .bounds(subs.first().copied().unwrap_or(Rect::ZERO))
    }

    pub(super) fn sub_task_coords(&self, task: &Task, subs: &[Rect]) -> SubCoords {
        let px = task.pixel_size();
        let margin = f64::from(self.interpolation.margin() + 1);
        let mut need = compute_required_source_rect(
            task.source_rect,
            &self.distortion,
            Vec2::new(px.x * margin, px.y * margin),
        );
        if !rect_is_finite(&need) {
            let r = task.source_rect;
            need = rect_intersect(need, r.inflate(r.width(), r.height()));
        }
        subs.iter()
            .map(|b| on_parent_grid(task, need, (0, 0), *b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(r: Rect, n: usize) -> impl Iterator<Item = Point> {
        (0..=n).flat_map(move |j| {
            (0..=n).map(move |i| {
                Point::new(
                    r.x0 + r.width() * i as f64 / n as f64,
                    r.y0 + r.height() * j as f64 / n as f64,
                )
            })
        })
    }

    fn assert_sound(d: &Distortion, dest: Rect) {
        let need = compute_required_source_rect(dest, d, Vec2::ZERO);
        for p in grid(dest, 37) {
            if let Some(q) = d.point(p) {
                assert!(
                    need.inflate(1e-9, 1e-9).contains(q),
                    "{d:?}: {p:?} -> {q:?} outside {need:?}"
                );
            }
        }
    }

    #[test]
    fn twirl_is_identity_at_center_and_zero_radius() {
        let t = Twirl {
            rotations: 3.0,
            ..Twirl::default()
        };
        assert_eq!(t.point(Point::ZERO), Point::ZERO);
        let flat = Twirl {
            radius: 0.0,
            ..t
        };
        assert_eq!(flat.point(Point::new(0.3, 0.1)), Point::new(0.3, 0.1));
        assert_eq!(t.point(Point::new(2.0, 0.0)), Point::new(2.0, 0.0));
    }

    #[test]
    fn twirl_preserves_distance_to_center() {
        let t = Twirl {
            rotations: 2.0,
            center: Point::new(1.0, 1.0),
            ..Twirl::default()
        };
        let p = Point::new(1.4, 1.2);
        let q = t.point(p);
        assert!(((q - t.center).hypot() - (p - t.center).hypot()).abs() < 1e-12);
        assert_ne!(p, q);
    }

    #[test]
    fn twirl_keeps_turning_past_twice_the_radius() {
        let t = Twirl {
            rotations: std::f64::consts::FRAC_PI_2,
            distort_outside: true,
            ..Twirl::default()
        };
        let q = t.point(Point::new(3.0, 0.0));
        assert!((q - Point::new(-3.0, 0.0)).hypot() < 1e-9, "{q:?}");

        let (s, c) = (-std::f64::consts::FRAC_PI_4).sin_cos();
        let near = t.point(Point::new(0.5, 0.0));
        assert!((near - Point::new(0.5 * c, 0.5 * s)).hypot() < 1e-9, "{near:?}");
        assert_eq!(t.point(Point::new(1.0, 0.0)), Point::new(1.0, 0.0));
    }

    #[test]
    fn spherize_matches_closed_form() {
        let s = Spherize::default();
        let (q, clipped) = s.point_clipped(Point::new(0.5, 0.0));
        assert!(!clipped);
        assert!((q.x - unspherify(0.5)).abs() < 1e-12);
        assert_eq!(s.point_clipped(Point::new(2.0, 0.0)), (Point::new(2.0, 0.0), true));
        assert_eq!(s.point_clipped(Point::ZERO), (Point::ZERO, false));

        let pinch = Spherize {
            amount: -1.0,
            ..s
        };
        let (q, _) = pinch.point_clipped(Point::new(0.5, 0.0));
        assert!((q.x - spherify(0.5)).abs() < 1e-12);

        let clip = Spherize { clip: true, ..s };
        assert_eq!(clip.point(Point::new(3.0, 3.0)), None);
    }

    #[test]
    fn spherize_horizontal_keeps_y() {
        let s = Spherize {
            kind: SpherizeType::Horizontal,
            ..Spherize::default()
        };
        let q = s.point(Point::new(0.5, 7.0)).unwrap();
        assert_eq!(q.y, 7.0);
        assert!((q.x - unspherify(0.5)).abs() < 1e-12);
    }

    #[test]
    fn curve_warp_degenerate_blines() {
        let empty = CurveWarp::default();
        assert_eq!(empty.point(Point::new(1.0, 2.0)), Some(Point::ZERO));

        let single = CurveWarp::new(
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            vec![BLinePoint::new(Point::ZERO, Vec2::new(1.0, 0.0))],
        );
        let q = single.point(Point::new(0.0, 0.5)).unwrap();
        assert!(q.x.is_finite() && q.y.is_finite());
    }

    #[test]
    fn curve_warp_straight_line_maps_along_axis() {
        let line = vec![
            BLinePoint::new(Point::new(0.0, 0.0), Vec2::new(2.0, 0.0)),
            BLinePoint::new(Point::new(2.0, 0.0), Vec2::new(2.0, 0.0)),
        ];
        let mut w = CurveWarp::new(Point::new(0.0, 0.0), Point::new(4.0, 0.0), line);
        w.fast = false;
        let q = w.point(Point::new(1.0, 0.0)).unwrap();
        assert!((q.x - 2.0).abs() < 1e-4, "{q:?}");
        assert!(q.y.abs() < 1e-6);
    }

    #[test]
    fn curve_warp_neighbours_stop_at_the_end_vertices() {
        let bend = vec![
            BLinePoint::new(Point::new(0.0, 0.0), Vec2::new(0.0, 6.0)),
            BLinePoint::new(Point::new(4.0, 0.0), Vec2::ZERO),
            BLinePoint::new(Point::new(8.0, 1.0), Vec2::new(1.0, 1.0)),
        ];
        let w = CurveWarp::new(Point::ZERO, Point::new(1.0, 0.0), bend);
        assert_eq!(w.segment_after(0), w.segment(1));
        assert_eq!(w.segment_before(1), w.segment(0));

        let tail = w.segment_after(1);
        assert_eq!((tail.p0, tail.p3), (Point::new(8.0, 1.0), Point::new(8.0, 1.0)));
        let head = w.segment_before(0);
        assert_eq!((head.p0, head.p3), (Point::ZERO, Point::ZERO));

        let leaving = normalized(tail.eval(FAKE_TANGENT_STEP) - tail.eval(0.0));
        let diagonal = Vec2::new(1.0, 1.0) / 2f64.sqrt();
        assert!((leaving - diagonal).hypot() < 1e-3, "{leaving:?}");
    }

    #[test]
    fn perspective_maps_dest_corners_to_source_corners() {
        let p = Perspective::default();
        let q = p.point(p.dest_tl).unwrap();
        assert!((q - p.src_tl).hypot() < 1e-9);
        let q = p.point(p.dest_br).unwrap();
        assert!((q - p.src_br).hypot() < 1e-9);
        assert_eq!(p.point(Point::new(50.0, 50.0)), None);
    }

    #[test]
    fn required_source_rect_is_sound() {
        let dest = Rect::new(-1.3, -0.7, 1.1, 0.9);
        let cases = [
            Distortion::Twirl(Twirl {
                rotations: 4.0,
                radius: 1.5,
                ..Twirl::default()
            }),
            Distortion::Twirl(Twirl {
                rotations: 1.0,
                radius: 0.5,
                distort_outside: true,
                ..Twirl::default()
            }),
            Distortion::Spherize(Spherize {
                amount: 0.8,
                ..Spherize::default()
            }),
            Distortion::Spherize(Spherize {
                amount: -2.0,
                kind: SpherizeType::Vertical,
                ..Spherize::default()
            }),
            Distortion::Perspective(Perspective {
                clip: false,
                ..Perspective::default()
            }),
        ];
        for d in &cases {
            assert_sound(d, dest);
        }
    }

    #[test]
    fn non_finite_input_is_transparent() {
        let d = Distortion::Twirl(Twirl::default());
        assert_eq!(d.point(Point::new(f64::NAN, 0.0)), None);
    }
}
