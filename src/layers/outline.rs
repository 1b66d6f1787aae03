use std::f64::consts::PI;

use kurbo::{ParamCurve, ParamCurveDeriv};

use crate::color::Color;
use crate::context::{Context, ContextParams};
use crate::foundation::core::{Affine, BezPath, Point, Rect, Vec2};
use crate::layer::param::{ParamDesc, ParamTable};
use crate::layer::{Composite, Hit, Layer, LayerBase};
use crate::rendering::task::{BLinePoint, TaskContour, TaskGraph, TaskId, TaskKind, hermite};
use crate::{layer_common, param};

/// Points sampled along each spline segment.
const SAMPLES: usize = 48;
/// Points on each round tip.
const TIP_SAMPLES: usize = 16;

/// A stroke along a spline whose width follows the per-vertex widths.
///
/// The half width at a vertex is `width * vertex.width / 2 + expand`, scaled by
/// `exp(outline_grow)` of the render parameters.
#[derive(Clone, Debug)]
pub struct Outline {
    base: LayerBase,
    pub composite: Composite,
    pub color: Color,
    pub origin: Vec2,
    pub bline: Vec<BLinePoint>,
    pub width: f64,
    pub expand: f64,
    /// Join the last vertex back to the first.
    pub looped: bool,
    pub round_tip: bool,
    pub antialias: bool,
}

impl Default for Outline {
    fn default() -> Self {
        let bline = vec![
            BLinePoint::new(Point::new(0.0, 1.0), Vec2::new(-0.5, -1.0)),
            BLinePoint::new(Point::new(0.0, -1.0), Vec2::new(1.0, -0.5)),
            BLinePoint::new(Point::new(1.0, 0.0), Vec2::new(0.0, 1.5)),
        ];
        Self::new(bline, 1.0, Color::white())
    }
}

impl ParamTable for Outline {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Outline>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("color", color),
            param!("origin", origin),
            param!("bline", bline),
            param!("width", width),
            param!("expand", expand),
            param!("loop", looped),
            param!("round_tip", round_tip),
            param!("antialias", antialias),
        ];
        TABLE
    }
}

impl Outline {
    pub fn new(bline: Vec<BLinePoint>, width: f64, color: Color) -> Self {
        Self {
            base: LayerBase::default(),
            composite: Composite::default(),
            color,
            origin: Vec2::ZERO,
            bline,
            width,
            expand: 0.0,
            looped: false,
            round_tip: true,
            antialias: true,
        }
    }

    /// Straight polyline through `points`.
    pub fn polyline(points: impl IntoIterator<Item = Point>, width: f64, color: Color) -> Self {
        let bline = points
            .into_iter()
            .map(|p| BLinePoint::new(p, Vec2::ZERO))
            .collect();
        Self::new(bline, width, color)
    }

    fn half_width(&self, vertex_width: f64, grow: f64) -> f64 {
        grow * (vertex_width * self.width * 0.5 + self.expand)
    }

    /// Filled area of the stroke for an accumulated `outline_grow`.
    pub fn path(&self, outline_grow: f64) -> BezPath {
        let grow = outline_grow.exp();
        let n = self.bline.len();
        let segments = if self.looped { n } else { n.saturating_sub(1) };
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut ends: Option<((Point, Vec2, f64), (Point, Vec2, f64))> = None;

        for i in 0..segments {
            let a = &self.bline[i];
            let b = &self.bline[(i + 1) % n];
            let (mut t0, mut t1) = (a.tangent2, b.tangent1);
            if t0 == Vec2::ZERO && t1 == Vec2::ZERO {
                t0 = b.vertex - a.vertex;
                t1 = t0;
                if t0 == Vec2::ZERO {
                    continue;
                }
            }
            let curve = hermite(a.vertex, b.vertex, t0, t1);
            let deriv = curve.deriv();
            let chord = b.vertex - a.vertex;
            for k in 0..=SAMPLES {
                let t = k as f64 / SAMPLES as f64;
                let p = curve.eval(t);
                let mut d = deriv.eval(t).to_vec2();
                if d.hypot2() == 0.0 {
                    d = if k == 0 { t0 } else { chord };
                }
                let len = d.hypot();
                if !(len > 0.0) {
                    continue;
                }
                let dir = d / len;
                let normal = Vec2::new(-dir.y, dir.x);
                let w = self.half_width(a.width + (b.width - a.width) * t, grow);
                left.push(p + normal * w);
                right.push(p - normal * w);
                let here = (p, dir, w);
                ends = Some(match ends {
                    None => (here, here),
                    Some((first, _)) => (first, here),
                });
            }
        }

        let mut path = BezPath::new();
        let Some((start, end)) = ends else {
            return path;
        };
        if self.looped {
            push_ring(&mut path, left.iter().copied());
            push_ring(&mut path, right.iter().rev().copied());
            return path;
        }
        let mut ring = left;
        if self.round_tip {
            ring.extend(tip(end.0, end.1, end.2));
        }
        ring.extend(right.into_iter().rev());
        if self.round_tip {
            ring.extend(tip(start.0, -start.1, start.2));
        }
        push_ring(&mut path, ring);
        path
    }

    pub fn contour(&self, params: &ContextParams) -> TaskContour {
        TaskContour {
            transform: Affine::translate(self.origin),
            antialias: self.antialias,
            ..TaskContour::new(self.path(params.outline_grow), self.color)
        }
    }
}

/// Half circle of radius `w` around `center`, from the left side over `dir` to the right.
fn tip(center: Point, dir: Vec2, w: f64) -> impl Iterator<Item = Point> {
    let start = dir.y.atan2(dir.x) + PI * 0.5;
    (1..TIP_SAMPLES).map(move |k| {
        let a = start - PI * k as f64 / TIP_SAMPLES as f64;
        center + Vec2::new(a.cos(), a.sin()) * w
    })
}

fn push_ring(path: &mut BezPath, points: impl IntoIterator<Item = Point>) {
    let mut points = points.into_iter();
    let Some(first) = points.next() else {
        return;
    };
    path.move_to(first);
    for p in points {
        path.line_to(p);
    }
    path.close_path();
}

impl Layer for Outline {
    layer_common!("outline");

    fn composite(&self) -> Option<&Composite> {
        Some(&self.composite)
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        let own = if self.contour(context.params()).contains(pos) {
            self.color
        } else {
            Color::alpha()
        };
        self.composite.blend(own, context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        let own = self.contour(context.params()).bounds();
        self.composite.full_bounding_rect(own, context)
    }

    fn hit_check(&self, context: &Context, pos: Point) -> Hit {
        if self.composite.amount != 0.0
            && self.color.a > 0.0
            && self.contour(context.params()).contains(pos)
        {
            return Hit::This;
        }
        context.hit_check(pos).into()
    }

    fn build_composite_task(&self, params: &ContextParams, graph: &mut TaskGraph) -> Option<TaskId> {
        Some(graph.add_leaf(TaskKind::Contour(self.contour(params))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::rect_is_valid;

    fn bar() -> Outline {
        Outline::polyline([Point::new(-1.0, 0.0), Point::new(1.0, 0.0)], 0.2, Color::red())
    }

    #[test]
    fn stroke_covers_its_width_only() {
        let ctx = Context::empty(ContextParams::default(), 0);
        let l = bar();
        assert_eq!(l.get_color(&ctx, Point::new(0.0, 0.05)), Color::red());
        assert_eq!(l.get_color(&ctx, Point::new(0.0, -0.05)), Color::red());
        assert_eq!(l.get_color(&ctx, Point::new(0.0, 0.15)), Color::alpha());
        assert_eq!(l.get_color(&ctx, Point::new(1.05, 0.0)), Color::red());
        assert_eq!(l.get_color(&ctx, Point::new(1.15, 0.0)), Color::alpha());

        let mut square = bar();
        square.round_tip = false;
        assert_eq!(square.get_color(&ctx, Point::new(1.05, 0.0)), Color::alpha());
    }

    #[test]
    fn outline_grow_widens_exponentially() {
        let grown = ContextParams {
            outline_grow: 2f64.ln(),
            ..ContextParams::default()
        };
        let ctx = Context::empty(grown, 0);
        let l = bar();
        assert_eq!(l.get_color(&ctx, Point::new(0.0, 0.15)), Color::red());
        assert_eq!(l.get_color(&ctx, Point::new(0.0, 0.25)), Color::alpha());
        let b = l.get_full_bounding_rect(&ctx);
        assert!((b.y1 - 0.2).abs() < 1e-9, "{b:?}");
    }

    #[test]
    fn closed_loop_leaves_its_middle_empty() {
        let mut ring = Outline::polyline(
            [
                Point::new(-1.0, -1.0),
                Point::new(1.0, -1.0),
                Point::new(1.0, 1.0),
                Point::new(-1.0, 1.0),
            ],
            0.2,
            Color::red(),
        );
        ring.looped = true;
        let ctx = Context::empty(ContextParams::default(), 0);
        assert_eq!(ring.get_color(&ctx, Point::ZERO), Color::alpha());
        assert_eq!(ring.get_color(&ctx, Point::new(0.0, 1.05)), Color::red());
        assert_eq!(ring.get_color(&ctx, Point::new(-1.05, 0.0)), Color::red());
    }

    #[test]
    fn empty_spline_draws_nothing() {
        let l = Outline::new(Vec::new(), 1.0, Color::red());
        assert!(l.path(0.0).elements().is_empty());
        assert!(!rect_is_valid(&l.contour(&ContextParams::default()).bounds()));
    }
}
