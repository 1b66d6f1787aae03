use crate::color::Color;
use crate::context::{Context, ContextParams};
use crate::foundation::core::{FULL_PLANE, Point, Rect};
use crate::layer::param::{ParamDesc, ParamTable};
use crate::layer::{Composite, Hit, Layer, LayerBase};
use crate::rendering::task::{self, PixelOp, TaskGraph, TaskId, TaskKind, TaskPixelProcessor};
use crate::{layer_common, param};

/// An endless grid of colored and clear cells.
#[derive(Clone, Debug, Default)]
pub struct Checkerboard {
    base: LayerBase,
    pub composite: Composite,
    pub board: task::Checkerboard,
}

impl ParamTable for Checkerboard {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Checkerboard>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("color", board.color),
            param!("origin", board.origin),
            param!("size", board.size),
        ];
        TABLE
    }
}

impl Checkerboard {
    pub fn new(board: task::Checkerboard) -> Self {
        Self {
            board,
            ..Self::default()
        }
    }
}

impl Layer for Checkerboard {
    layer_common!("checkerboard");

    fn composite(&self) -> Option<&Composite> {
        Some(&self.composite)
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        self.composite.blend(self.board.apply(pos), context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        self.composite.full_bounding_rect(FULL_PLANE, context)
    }

    fn hit_check(&self, context: &Context, pos: Point) -> Hit {
        if self.composite.amount != 0.0 && self.board.contains(pos) {
            return Hit::This;
        }
        context.hit_check(pos).into()
    }

    fn build_composite_task(&self, _params: &ContextParams, graph: &mut TaskGraph) -> Option<TaskId> {
        let op = PixelOp::Checkerboard(self.board);
        Some(graph.add(TaskKind::PixelProcessor(TaskPixelProcessor::new(op)), &[None]))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::layers::SolidColor;

    #[test]
    fn clear_cells_show_the_context() {
        let board = Checkerboard::new(task::Checkerboard {
            color: Color::red(),
            ..task::Checkerboard::default()
        });
        let below = Context::new(
            &[Arc::new(SolidColor::new(Color::blue()))],
            ContextParams::default(),
            0,
        );
        assert_eq!(board.get_color(&below, Point::new(0.2, 0.2)), Color::blue());
        assert_eq!(board.get_color(&below, Point::new(0.45, 0.2)), Color::red());
        assert!(matches!(board.hit_check(&below, Point::new(0.45, 0.2)), Hit::This));
    }
}
