use crate::color::{Color, ColorMatrix};
use crate::context::{Context, ContextParams};
use crate::foundation::core::{FULL_PLANE, Point, Rect};
use crate::layer::param::{Param, ParamDesc, ParamTable};
use crate::layer::{Composite, Hit, Layer, LayerBase};
use crate::rendering::task::{PixelOp, TaskGraph, TaskId, TaskKind, TaskPixelProcessor};
use crate::{layer_common, param};

/// Fills the whole plane with one color.
#[derive(Clone, Debug)]
pub struct SolidColor {
    base: LayerBase,
    pub composite: Composite,
    pub color: Param<Color>,
}

impl Default for SolidColor {
    fn default() -> Self {
        Self::new(Color::black())
    }
}

impl ParamTable for SolidColor {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<SolidColor>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("color", color, Param),
        ];
        TABLE
    }
}

impl SolidColor {
    pub fn new(color: Color) -> Self {
        Self {
            base: LayerBase::default(),
            composite: Composite::default(),
            color: Param::Static(color),
        }
    }
}

impl Layer for SolidColor {
    layer_common!("solid_color");

    fn composite(&self) -> Option<&Composite> {
        Some(&self.composite)
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        let color = self.color.get(context.params());
        self.composite.blend(color, context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        self.composite.full_bounding_rect(FULL_PLANE, context)
    }

    fn hit_check(&self, context: &Context, pos: Point) -> Hit {
        if self.composite.amount != 0.0 && self.color.get(context.params()).a > 0.0 {
            return Hit::This;
        }
        context.hit_check(pos).into()
    }

    fn build_composite_task(&self, params: &ContextParams, graph: &mut TaskGraph) -> Option<TaskId> {
        let op = PixelOp::ColorMatrix(ColorMatrix::constant(self.color.get(params)));
        Some(graph.add(TaskKind::PixelProcessor(TaskPixelProcessor::new(op)), &[None]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::BlendMethod;

    #[test]
    fn half_amount_mixes_with_context() {
        let mut top = SolidColor::new(Color::white());
        top.composite = Composite::new(0.5, BlendMethod::Composite);
        let below = Context::new(
            &[std::sync::Arc::new(SolidColor::new(Color::black()))],
            ContextParams::default(),
            0,
        );
        let c = top.get_color(&below, Point::ZERO);
        assert!((c.r - 0.5).abs() < 1e-6 && (c.a - 1.0).abs() < 1e-6, "{c:?}");
    }

    #[test]
    fn linked_color_follows_index() {
        let mut l = SolidColor::new(Color::black());
        l.color = Param::linked(|p| Color::new(p.index as f32 / 4.0, 0.0, 0.0, 1.0));
        let params = ContextParams {
            index: 2.0,
            ..ContextParams::default()
        };
        let ctx = Context::empty(params, 0);
        assert_eq!(l.get_color(&ctx, Point::ZERO).r, 0.5);
    }
}
