//! Layers that move everything below them through an affine map.

use crate::color::Color;
use crate::context::Context;
use crate::foundation::core::{Affine, Point, Rect, Vec2, affine_is_invertible, transform_bounds};
use crate::layer::param::{Param, ParamDesc, ParamTable};
use crate::layer::{Hit, Layer, LayerBase};
use crate::rendering::task::{TaskGraph, TaskId, TaskKind, TaskTransformationAffine};
use crate::{layer_common, param};

fn back(m: Affine, pos: Point) -> Option<Point> {
    affine_is_invertible(&m).then(|| m.inverse() * pos)
}

fn color_through(m: Affine, context: &Context, pos: Point) -> Color {
    back(m, pos).map_or(Color::alpha(), |p| context.get_color(p))
}

fn bounds_through(m: Affine, context: &Context) -> Rect {
    if !affine_is_invertible(&m) {
        return Rect::ZERO;
    }
    transform_bounds(m, context.get_full_bounding_rect())
}

fn hit_through(m: Affine, context: &Context, pos: Point) -> Hit {
    back(m, pos).and_then(|p| context.hit_check(p)).into()
}

fn task_through(m: Affine, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
    let sub = context.build_rendering_task(graph)?;
    if m == Affine::IDENTITY {
        return Some(sub);
    }
    let t = TaskTransformationAffine::new(m, graph.interpolation());
    Some(graph.add(TaskKind::TransformationAffine(t), &[Some(sub)]))
}

/// Moves the context by `origin`.
#[derive(Clone, Debug, Default)]
pub struct Translate {
    base: LayerBase,
    pub origin: Param<Point>,
}

impl ParamTable for Translate {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Translate>] = &[param!("origin", origin, Param)];
        TABLE
    }
}

impl Translate {
    pub fn new(origin: Point) -> Self {
        Self {
            base: LayerBase::default(),
            origin: Param::Static(origin),
        }
    }

    fn matrix(&self, context: &Context) -> Affine {
        Affine::translate(self.origin.get(context.params()).to_vec2())
    }
}

impl Layer for Translate {
    layer_common!("translate");

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        color_through(self.matrix(context), context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        bounds_through(self.matrix(context), context)
    }

    fn hit_check(&self, context: &Context, pos: Point) -> Hit {
        hit_through(self.matrix(context), context, pos)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        task_through(self.matrix(context), context, graph)
    }
}

/// Rotates the context about `origin`.
#[derive(Clone, Debug, Default)]
pub struct Rotate {
    base: LayerBase,
    pub origin: Point,
    /// Degrees, counter-clockwise.
    pub amount: Param<f64>,
}

impl ParamTable for Rotate {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Rotate>] = &[
            param!("origin", origin),
            param!("amount", amount, Param),
        ];
        TABLE
    }
}

impl Rotate {
    pub fn new(origin: Point, degrees: f64) -> Self {
        Self {
            base: LayerBase::default(),
            origin,
            amount: Param::Static(degrees),
        }
    }

    fn matrix(&self, context: &Context) -> Affine {
        let o = self.origin.to_vec2();
        Affine::translate(o)
            * Affine::rotate(self.amount.get(context.params()).to_radians())
            * Affine::translate(-o)
    }
}

impl Layer for Rotate {
    layer_common!("rotate");

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        color_through(self.matrix(context), context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        bounds_through(self.matrix(context), context)
    }

    fn hit_check(&self, context: &Context, pos: Point) -> Hit {
        hit_through(self.matrix(context), context, pos)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        task_through(self.matrix(context), context, graph)
    }
}

/// Scales the context about `center`.
#[derive(Clone, Debug)]
pub struct Stretch {
    base: LayerBase,
    pub amount: Vec2,
    pub center: Point,
}

impl Default for Stretch {
    fn default() -> Self {
        Self {
            base: LayerBase::default(),
            amount: Vec2::new(1.0, 1.0),
            center: Point::ZERO,
        }
    }
}

impl ParamTable for Stretch {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Stretch>] = &[
            param!("amount", amount),
            param!("center", center),
        ];
        TABLE
    }
}

impl Stretch {
    fn matrix(&self) -> Affine {
        let c = self.center.to_vec2();
        Affine::translate(c)
            * Affine::scale_non_uniform(self.amount.x, self.amount.y)
            * Affine::translate(-c)
    }
}

impl Layer for Stretch {
    layer_common!("stretch");

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        color_through(self.matrix(), context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        bounds_through(self.matrix(), context)
    }

    fn hit_check(&self, context: &Context, pos: Point) -> Hit {
        hit_through(self.matrix(), context, pos)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        task_through(self.matrix(), context, graph)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::ContextParams;
    use crate::layer::LayerHandle;
    use crate::layers::Region;

    fn over_square(top: LayerHandle) -> Context {
        let square: LayerHandle = Arc::new(Region::rectangle(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Color::red(),
        ));
        Context::new(&[top, square], ContextParams::default(), 0)
    }

    #[test]
    fn rotate_quarter_turn_moves_square() {
        let ctx = over_square(Arc::new(Rotate::new(Point::ZERO, 90.0)));
        assert_eq!(ctx.get_color(Point::new(-0.5, 0.5)), Color::red());
        assert_eq!(ctx.get_color(Point::new(0.5, 0.5)), Color::alpha());
        let b = ctx.get_full_bounding_rect();
        assert!((b.x0 + 1.0).abs() < 1e-9 && b.x1.abs() < 1e-9, "{b:?}");
    }

    #[test]
    fn stretch_scales_about_center_and_collapses_safely() {
        let ctx = over_square(Arc::new(Stretch {
            amount: Vec2::new(2.0, 2.0),
            ..Stretch::default()
        }));
        assert_eq!(ctx.get_color(Point::new(1.5, 1.5)), Color::red());
        let flat = over_square(Arc::new(Stretch {
            amount: Vec2::new(0.0, 1.0),
            ..Stretch::default()
        }));
        assert_eq!(flat.get_color(Point::new(0.0, 0.5)), Color::alpha());
        assert_eq!(flat.get_full_bounding_rect(), Rect::ZERO);
        let mut graph = TaskGraph::new();
        let root = flat.build_rendering_task(&mut graph).unwrap();
        assert_eq!(graph.get_bounds(root), Rect::ZERO);
    }
}
