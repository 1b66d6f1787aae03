use crate::color::Color;
use crate::context::{Context, ContextParams};
use crate::foundation::core::{Affine, BezPath, Point, Rect, Vec2};
use crate::layer::param::{ParamDesc, ParamTable};
use crate::layer::{Composite, Hit, Layer, LayerBase};
use crate::rendering::task::{BLinePoint, TaskContour, TaskGraph, TaskId, TaskKind, WindingStyle};
use crate::{layer_common, param};

/// A filled closed spline. Vertices with zero tangents give straight edges.
#[derive(Clone, Debug)]
pub struct Region {
    base: LayerBase,
    pub composite: Composite,
    pub color: Color,
    pub origin: Vec2,
    pub bline: Vec<BLinePoint>,
    pub winding: WindingStyle,
    pub antialias: bool,
    pub invert: bool,
}

impl Default for Region {
    /// A unit circle built from four spline vertices.
    fn default() -> Self {
        // Tangents put the cubic control points at the usual quarter-arc distance.
        let k = 3.0 * 0.552_284_75;
        let bline = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)]
            .into_iter()
            .map(|(x, y)| BLinePoint::new(Point::new(x, y), Vec2::new(-y, x) * k))
            .collect();
        Self::new(bline, Color::white())
    }
}

impl ParamTable for Region {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Region>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("color", color),
            param!("origin", origin),
            param!("bline", bline),
            param!("winding_style", winding),
            param!("antialias", antialias),
            param!("invert", invert),
        ];
        TABLE
    }
}

impl Region {
    pub fn new(bline: Vec<BLinePoint>, color: Color) -> Self {
        Self {
            base: LayerBase::default(),
            composite: Composite::default(),
            color,
            origin: Vec2::ZERO,
            bline,
            winding: WindingStyle::NonZero,
            antialias: true,
            invert: false,
        }
    }

    /// A straight-edged polygon through `points`.
    pub fn polygon(points: impl IntoIterator<Item = Point>, color: Color) -> Self {
        let bline = points
            .into_iter()
            .map(|p| BLinePoint::new(p, Vec2::ZERO))
            .collect();
        Self::new(bline, color)
    }

    /// Axis-aligned rectangle with corners `p0` and `p1`.
    pub fn rectangle(p0: Point, p1: Point, color: Color) -> Self {
        Self::polygon(
            [
                Point::new(p0.x, p0.y),
                Point::new(p1.x, p0.y),
                Point::new(p1.x, p1.y),
                Point::new(p0.x, p1.y),
            ],
            color,
        )
    }

    pub fn polygon_default() -> Self {
        Self::polygon(
            [
                Point::new(0.0, 0.5),
                Point::new(-0.333_333, 0.0),
                Point::new(0.333_333, 0.0),
            ],
            Color::white(),
        )
    }

    /// Closed outline of the spline, before `origin` is applied.
    pub fn path(&self) -> BezPath {
        let mut path = BezPath::new();
        let Some(first) = self.bline.first() else {
            return path;
        };
        path.move_to(first.vertex);
        let next = self.bline.iter().skip(1).chain(std::iter::once(first));
        for (a, b) in self.bline.iter().zip(next) {
            let t_out = if a.split_tangent { a.tangent2 } else { a.tangent1 };
            if t_out == Vec2::ZERO && b.tangent1 == Vec2::ZERO {
                path.line_to(b.vertex);
            } else {
                path.curve_to(a.vertex + t_out / 3.0, b.vertex - b.tangent1 / 3.0, b.vertex);
            }
        }
        path.close_path();
        path
    }

    pub fn contour(&self) -> TaskContour {
        TaskContour {
            transform: Affine::translate(self.origin),
            winding: self.winding,
            antialias: self.antialias,
            invert: self.invert,
            ..TaskContour::new(self.path(), self.color)
        }
    }
}

impl Layer for Region {
    layer_common!("region");

    fn composite(&self) -> Option<&Composite> {
        Some(&self.composite)
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        let contour = self.contour();
        let own = if contour.contains(pos) {
            self.color
        } else {
            Color::alpha()
        };
        self.composite.blend(own, context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        self.composite.full_bounding_rect(self.contour().bounds(), context)
    }

    fn hit_check(&self, context: &Context, pos: Point) -> Hit {
        if self.composite.amount != 0.0 && self.color.a > 0.0 && self.contour().contains(pos) {
            return Hit::This;
        }
        context.hit_check(pos).into()
    }

    fn build_composite_task(&self, _params: &ContextParams, graph: &mut TaskGraph) -> Option<TaskId> {
        Some(graph.add_leaf(TaskKind::Contour(self.contour())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::rect_is_valid;

    #[test]
    fn rectangle_fills_inside_only() {
        let r = Region::rectangle(Point::new(0.0, 0.0), Point::new(1.0, 1.0), Color::red());
        let ctx = Context::empty(ContextParams::default(), 0);
        assert_eq!(r.get_color(&ctx, Point::new(0.5, 0.5)), Color::red());
        assert_eq!(r.get_color(&ctx, Point::new(1.5, 0.5)), Color::alpha());
        assert_eq!(r.get_full_bounding_rect(&ctx), Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(matches!(r.hit_check(&ctx, Point::new(0.5, 0.5)), Hit::This));
    }

    #[test]
    fn default_circle_covers_its_center() {
        let r = Region::default();
        let c = r.contour();
        assert!(c.contains(Point::ZERO));
        assert!(!c.contains(Point::new(1.2, 0.0)));
        let b = c.bounds();
        assert!((b.x1 - 1.0).abs() < 0.05, "{b:?}");
    }

    #[test]
    fn empty_spline_draws_nothing() {
        let r = Region::new(Vec::new(), Color::red());
        assert!(!rect_is_valid(&r.contour().bounds()));
    }
}
