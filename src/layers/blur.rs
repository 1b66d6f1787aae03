use crate::color::{BlendMethod, Color};
use crate::context::Context;
use crate::foundation::core::{Point, Rect, Vec2};
use crate::layer::composite::build_fork_task;
use crate::layer::param::{ParamDesc, ParamTable};
use crate::layer::{Composite, Layer, LayerBase};
use crate::rendering::task::{self, BlurType, TaskBlur, TaskGraph, TaskId, TaskKind, TaskRadialBlur};
use crate::{layer_common, param};

/// Blurs everything below it.
#[derive(Clone, Debug)]
pub struct Blur {
    base: LayerBase,
    pub composite: Composite,
    pub size: Vec2,
    pub kind: BlurType,
}

impl Default for Blur {
    fn default() -> Self {
        Self::new(Vec2::new(0.1, 0.1), BlurType::FastGaussian)
    }
}

impl ParamTable for Blur {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Blur>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("size", size),
            param!("type", kind),
        ];
        TABLE
    }
}

impl Blur {
    pub fn new(size: Vec2, kind: BlurType) -> Self {
        Self {
            base: LayerBase::default(),
            composite: Composite::new(1.0, BlendMethod::Straight),
            size,
            kind,
        }
    }

    fn blur(&self) -> task::Blur {
        task::Blur::new(self.size, self.kind)
    }
}

impl Layer for Blur {
    layer_common!("blur");

    fn composite(&self) -> Option<&Composite> {
        Some(&self.composite)
    }

    fn reads_context(&self) -> bool {
        true
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        if self.composite.effective_amount(context) == 0.0 {
            return context.get_color(pos);
        }
        let blurred = self.blur().sample(pos, |p| context.get_color(p));
        self.composite.blend(blurred, context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        let own = self.blur().expand(context.get_full_bounding_rect());
        self.composite.full_bounding_rect(own, context)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        let blur = self.blur();
        build_fork_task(&self.composite, context, graph, |graph, copy| {
            let copy = copy?;
            if blur.is_identity() {
                return Some(copy);
            }
            Some(graph.add(TaskKind::Blur(TaskBlur::new(blur)), &[Some(copy)]))
        })
    }
}

/// Streaks everything below it towards `origin`.
#[derive(Clone, Debug)]
pub struct RadialBlur {
    base: LayerBase,
    pub composite: Composite,
    pub origin: Point,
    pub size: f64,
    pub fade_out: bool,
}

impl Default for RadialBlur {
    fn default() -> Self {
        Self::new(Point::ZERO, 0.2, false)
    }
}

impl ParamTable for RadialBlur {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<RadialBlur>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("origin", origin),
            param!("size", size),
            param!("fade_out", fade_out),
        ];
        TABLE
    }
}

impl RadialBlur {
    pub fn new(origin: Point, size: f64, fade_out: bool) -> Self {
        Self {
            base: LayerBase::default(),
            composite: Composite::new(1.0, BlendMethod::Straight),
            origin,
            size,
            fade_out,
        }
    }

    fn task(&self) -> TaskRadialBlur {
        TaskRadialBlur::new(self.origin, self.size, self.fade_out)
    }
}

impl Layer for RadialBlur {
    layer_common!("radial_blur");

    fn composite(&self) -> Option<&Composite> {
        Some(&self.composite)
    }

    fn reads_context(&self) -> bool {
        true
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        if self.composite.effective_amount(context) == 0.0 {
            return context.get_color(pos);
        }
        let streaked = self.task().sample(pos, |p| context.get_color(p));
        self.composite.blend(streaked, context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        let own = self.task().bounds(&[context.get_full_bounding_rect()]);
        self.composite.full_bounding_rect(own, context)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        let t = self.task();
        build_fork_task(&self.composite, context, graph, |graph, copy| {
            let copy = copy?;
            if t.size == 0.0 {
                return Some(copy);
            }
            Some(graph.add(TaskKind::RadialBlur(t), &[Some(copy)]))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::ContextParams;
    use crate::layer::LayerHandle;
    use crate::layers::{Region, SolidColor};

    fn over(top: LayerHandle, below: LayerHandle) -> Context {
        Context::new(&[top, below], ContextParams::default(), 0)
    }

    #[test]
    fn blur_of_flat_color_is_flat() {
        let ctx = over(
            Arc::new(Blur::default()),
            Arc::new(SolidColor::new(Color::blue())),
        );
        let c = ctx.get_color(Point::new(0.3, -0.2));
        assert!((c.b - 1.0).abs() < 1e-5 && (c.a - 1.0).abs() < 1e-5, "{c:?}");
    }

    #[test]
    fn blur_spreads_bounds_and_softens_edges() {
        let square: LayerHandle = Arc::new(Region::rectangle(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Color::red(),
        ));
        let ctx = over(Arc::new(Blur::new(Vec2::new(0.2, 0.2), BlurType::Box)), square);
        let b = ctx.get_full_bounding_rect();
        assert!(b.x0 < 0.0 && b.x1 > 1.0, "{b:?}");
        let edge = ctx.get_color(Point::new(0.0, 0.5));
        assert!(edge.a > 0.0 && edge.a < 1.0, "{edge:?}");
    }

    #[test]
    fn radial_blur_keeps_origin_fixed() {
        let ctx = over(
            Arc::new(RadialBlur::new(Point::ZERO, 0.5, true)),
            Arc::new(SolidColor::new(Color::green())),
        );
        assert_eq!(ctx.get_color(Point::ZERO), Color::green());
    }
}
