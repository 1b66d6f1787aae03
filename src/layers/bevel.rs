use crate::color::{BlendMethod, Color};
use crate::context::Context;
use crate::foundation::core::{Affine, Point, Rect, Vec2, rect_is_valid};
use crate::layer::composite::build_fork_task;
use crate::layer::param::{ParamDesc, ParamTable, Value};
use crate::layer::{Composite, Layer, LayerBase};
use crate::rendering::task::{
    self, BlurType, TaskBlur, TaskGraph, TaskId, TaskKind, TaskShade, TaskTransformationAffine,
};
use crate::{layer_common, param};

/// Raised-edge shading from two offset, softened copies of the context's alpha.
#[derive(Clone, Debug)]
pub struct Bevel {
    base: LayerBase,
    pub composite: Composite,
    pub kind: BlurType,
    pub softness: f64,
    /// Highlight.
    pub color1: Color,
    /// Shadow.
    pub color2: Color,
    pub depth: f64,
    /// Light direction, degrees.
    pub angle: f64,
    pub use_luma: bool,
    pub solid: bool,
}

impl Default for Bevel {
    fn default() -> Self {
        Self {
            base: LayerBase::default(),
            composite: Composite::new(0.75, BlendMethod::Onto),
            kind: BlurType::FastGaussian,
            softness: 0.1,
            color1: Color::white(),
            color2: Color::black(),
            depth: 0.2,
            angle: 135.0,
            use_luma: false,
            solid: false,
        }
    }
}

impl ParamTable for Bevel {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Bevel>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("type", kind),
            ParamDesc {
                name: "softness",
                get: |l| Value::Real(l.softness),
                set: |l, v| {
                    l.softness = f64::try_from(v)?.max(0.0);
                    Ok(())
                },
            },
            param!("color1", color1),
            param!("color2", color2),
            param!("depth", depth),
            ParamDesc {
                name: "angle",
                get: |l| Value::Angle(l.angle),
                set: |l, v| {
                    l.angle = f64::try_from(v)?;
                    Ok(())
                },
            },
            param!("use_luma", use_luma),
            param!("solid", solid),
        ];
        TABLE
    }
}

impl Bevel {
    /// Displacement between the highlight and the shadow sample.
    pub fn offset(&self) -> Vec2 {
        let (s, c) = self.angle.to_radians().sin_cos();
        Vec2::new(c, s) * self.depth
    }

    fn blur(&self) -> task::Blur {
        task::Blur::new(Vec2::new(self.softness, self.softness), self.kind)
    }

    fn shade(&self) -> TaskShade {
        TaskShade {
            use_luma: self.use_luma,
            solid: self.solid,
            ..TaskShade::new(self.color1, self.color2)
        }
    }
}

impl Layer for Bevel {
    layer_common!("bevel");

    fn composite(&self) -> Option<&Composite> {
        Some(&self.composite)
    }

    fn reads_context(&self) -> bool {
        true
    }

    // Point sampling has no shading; the bevel only renders through the task graph.
    fn get_color(&self, context: &Context, pos: Point) -> Color {
        context.get_color(pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        let under = context.get_full_bounding_rect();
        if !rect_is_valid(&under) {
            return under;
        }
        let o = self.offset();
        let own = self.blur().expand(under).inflate(o.x.abs(), o.y.abs());
        self.composite.full_bounding_rect(own, context)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        let blur = self.blur();
        let offset = self.offset();
        let shade = self.shade();
        build_fork_task(&self.composite, context, graph, |graph, copy| {
            let copy = copy?;
            let interpolation = graph.interpolation();
            let blurred = if blur.is_identity() {
                copy
            } else {
                graph.add(TaskKind::Blur(TaskBlur::new(blur)), &[Some(copy)])
            };
            let hi = graph.add(
                TaskKind::TransformationAffine(TaskTransformationAffine::new(
                    Affine::translate(-offset),
                    interpolation,
                )),
                &[Some(blurred)],
            );
            let twin = graph.clone_recursive(blurred);
            let lo = graph.add(
                TaskKind::TransformationAffine(TaskTransformationAffine::new(
                    Affine::translate(offset),
                    interpolation,
                )),
                &[Some(twin)],
            );
            Some(graph.add(TaskKind::Shade(shade), &[Some(hi), Some(lo)]))
        })
    }
}
