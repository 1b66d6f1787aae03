//! Per-pixel color filters over the context.

use crate::color::{BlendMethod, Color, ColorMatrix, Gamma};
use crate::context::Context;
use crate::foundation::core::{Point, Rect, Vec2};
use crate::layer::composite::build_fork_task;
use crate::layer::param::{ParamDesc, ParamTable, Value};
use crate::layer::{Composite, Layer, LayerBase};
use crate::rendering::task::{
    self, HalftoneType, PixelOp, TaskGraph, TaskId, TaskKind, TaskPixelProcessor,
};
use crate::{layer_common, param};

fn filter_color(ops: &[PixelOp], context: &Context, pos: Point) -> Color {
    let c = context.get_color(pos);
    ops.iter().fold(c, |c, op| op.apply(c, pos, 0.0))
}

/// Chains one pixel processor per op over `sub`.
fn filter_task(ops: &[PixelOp], sub: Option<TaskId>, graph: &mut TaskGraph) -> Option<TaskId> {
    ops.iter()
        .filter(|op| !op.is_identity())
        .fold(sub, |acc, op| {
            if acc.is_none() && !op.affects_transparent() {
                return None;
            }
            let input = if op.is_constant() { None } else { acc };
            Some(graph.add(TaskKind::PixelProcessor(TaskPixelProcessor::new(*op)), &[input]))
        })
}

/// Limits channel values.
#[derive(Clone, Debug, Default)]
pub struct Clamp {
    base: LayerBase,
    pub clamp: task::Clamp,
}

impl ParamTable for Clamp {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Clamp>] = &[
            param!("invert_negative", clamp.invert_negative),
            param!("clamp_ceiling", clamp.clamp_ceiling),
            param!("ceiling", clamp.ceiling),
            param!("floor", clamp.floor),
        ];
        TABLE
    }
}

impl Clamp {
    fn ops(&self) -> [PixelOp; 1] {
        [PixelOp::Clamp(self.clamp)]
    }
}

impl Layer for Clamp {
    layer_common!("clamp");

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        filter_color(&self.ops(), context, pos)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        let sub = context.build_rendering_task(graph);
        filter_task(&self.ops(), sub, graph)
    }
}

/// Gamma, then exposure, contrast about mid grey, brightness offset and hue rotation.
#[derive(Clone, Debug)]
pub struct ColorCorrect {
    base: LayerBase,
    /// Degrees.
    pub hue_adjust: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub exposure: f64,
    pub gamma: f64,
}

impl Default for ColorCorrect {
    fn default() -> Self {
        Self {
            base: LayerBase::default(),
            hue_adjust: 0.0,
            brightness: 0.0,
            contrast: 1.0,
            exposure: 0.0,
            gamma: 1.0,
        }
    }
}

impl ParamTable for ColorCorrect {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<ColorCorrect>] = &[
            ParamDesc {
                name: "hue_adjust",
                get: |l| Value::Angle(l.hue_adjust),
                set: |l, v| {
                    l.hue_adjust = f64::try_from(v)?;
                    Ok(())
                },
            },
            param!("brightness", brightness),
            param!("contrast", contrast),
            param!("exposure", exposure),
            param!("gamma", gamma),
        ];
        TABLE
    }
}

impl ColorCorrect {
    fn ops(&self) -> [PixelOp; 2] {
        let gamma = if self.gamma == 0.0 {
            Gamma::default()
        } else {
            Gamma::uniform((1.0 / self.gamma) as f32)
        };
        let linear = ColorMatrix::exposure(self.exposure as f32)
            * ColorMatrix::contrast(self.contrast as f32)
            * ColorMatrix::brightness(self.brightness as f32)
            * ColorMatrix::hue_saturation(self.hue_adjust.to_radians() as f32, 1.0);
        [PixelOp::Gamma(gamma), PixelOp::ColorMatrix(linear)]
    }
}

impl Layer for ColorCorrect {
    layer_common!("color_correct");

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        filter_color(&self.ops(), context, pos)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        let sub = context.build_rendering_task(graph);
        filter_task(&self.ops(), sub, graph)
    }
}

/// Moves luma into alpha.
#[derive(Clone, Debug, Default)]
pub struct LumaKey {
    base: LayerBase,
}

impl ParamTable for LumaKey {
    fn param_table() -> &'static [ParamDesc<Self>] {
        &[]
    }
}

impl Layer for LumaKey {
    layer_common!("luma_key");

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        filter_color(&[PixelOp::LumaKey], context, pos)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        let sub = context.build_rendering_task(graph);
        filter_task(&[PixelOp::LumaKey], sub, graph)
    }
}

/// Three rotated dot screens.
#[derive(Clone, Debug)]
pub struct Halftone {
    base: LayerBase,
    pub composite: Composite,
    pub origin: Point,
    pub size: Vec2,
    pub kind: HalftoneType,
    pub subtractive: bool,
    pub colors: [Color; 3],
    /// Screen angles, degrees.
    pub angles: [f64; 3],
}

impl Default for Halftone {
    fn default() -> Self {
        let screens = task::Halftone::default();
        Self {
            base: LayerBase::default(),
            composite: Composite::new(1.0, BlendMethod::Straight),
            origin: screens.origin,
            size: screens.size,
            kind: screens.kind,
            subtractive: screens.subtractive,
            colors: screens.colors,
            angles: [0.0, 30.0, 60.0],
        }
    }
}

macro_rules! screen_color {
    ($name:literal, $i:literal) => {
        ParamDesc {
            name: $name,
            get: |l| Value::Color(l.colors[$i]),
            set: |l, v| {
                l.colors[$i] = Color::try_from(v)?;
                Ok(())
            },
        }
    };
}

macro_rules! screen_angle {
    ($name:literal, $i:literal) => {
        ParamDesc {
            name: $name,
            get: |l| Value::Angle(l.angles[$i]),
            set: |l, v| {
                l.angles[$i] = f64::try_from(v)?;
                Ok(())
            },
        }
    };
}

impl ParamTable for Halftone {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Halftone>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("origin", origin),
            param!("size", size),
            param!("type", kind),
            param!("subtractive", subtractive),
            screen_color!("tone1_color", 0),
            screen_angle!("tone1_angle", 0),
            screen_color!("tone2_color", 1),
            screen_angle!("tone2_angle", 1),
            screen_color!("tone3_color", 2),
            screen_angle!("tone3_angle", 2),
        ];
        TABLE
    }
}

impl Halftone {
    pub fn screens(&self) -> task::Halftone {
        task::Halftone {
            origin: self.origin,
            size: self.size,
            kind: self.kind,
            angles: self.angles.map(f64::to_radians),
            colors: self.colors,
            subtractive: self.subtractive,
        }
    }
}

impl Layer for Halftone {
    layer_common!("halftone");

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
        let own = filter_color(&[PixelOp::Halftone(self.screens())], context, pos);
        self.composite.blend(own, context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        let under = context.get_full_bounding_rect();
        self.composite.full_bounding_rect(under, context)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        let op = PixelOp::Halftone(self.screens());
        build_fork_task(&self.composite, context, graph, |graph, copy| {
            filter_task(&[op], copy, graph)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::ContextParams;
    use crate::layer::LayerHandle;
    use crate::layers::SolidColor;

    fn over(top: LayerHandle, color: Color) -> Context {
        Context::new(
            &[top, Arc::new(SolidColor::new(color))],
            ContextParams::default(),
            0,
        )
    }

    #[test]
    fn constant_filter_drops_its_input() {
        let mut graph = TaskGraph::new();
        let below = graph.add(
            TaskKind::PixelProcessor(TaskPixelProcessor::new(PixelOp::ColorMatrix(
                ColorMatrix::constant(Color::blue()),
            ))),
            &[None],
        );
        let fill = PixelOp::ColorMatrix(ColorMatrix::constant(Color::red()));
        let gamma = PixelOp::Gamma(Gamma::uniform(2.0));
        let top = filter_task(&[fill, gamma], Some(below), &mut graph).unwrap();

        let gamma_task = graph.get(top).unwrap();
        let fill_id = gamma_task.sub_tasks[0].unwrap();
        assert_ne!(fill_id, below);
        let fill_task = graph.get(fill_id).unwrap();
        assert!(matches!(&fill_task.kind, TaskKind::PixelProcessor(t) if t.op == fill));
        assert_eq!(fill_task.sub_tasks.as_slice(), &[None]);
        assert!(!graph.reachable(top).contains(&below));
    }

    #[test]
    fn clamp_limits_overbright_channels() {
        let ctx = over(Arc::new(Clamp::default()), Color::new(2.0, -0.5, 0.5, 1.0));
        assert_eq!(ctx.get_color(Point::ZERO), Color::new(1.0, 0.0, 0.5, 1.0));
    }

    #[test]
    fn default_color_correct_is_identity() {
        let c = Color::new(0.25, 0.5, 0.75, 1.0);
        let ctx = over(Arc::new(ColorCorrect::default()), c);
        let out = ctx.get_color(Point::ZERO);
        assert!((out.r - c.r).abs() < 1e-5, "{out:?}");
        assert!((out.g - c.g).abs() < 1e-5, "{out:?}");
        assert!((out.b - c.b).abs() < 1e-5, "{out:?}");
    }

    #[test]
    fn exposure_scales_by_exponential() {
        let layer = ColorCorrect {
            exposure: 2f64.ln(),
            ..ColorCorrect::default()
        };
        let out = over(Arc::new(layer), Color::new(0.25, 0.25, 0.25, 1.0)).get_color(Point::ZERO);
        assert!((out.r - 0.5).abs() < 1e-5, "{out:?}");
    }

    #[test]
    fn luma_key_turns_black_transparent() {
        let ctx = over(Arc::new(LumaKey::default()), Color::black());
        assert_eq!(ctx.get_color(Point::ZERO).a, 0.0);
        let white = over(Arc::new(LumaKey::default()), Color::white());
        assert!((white.get_color(Point::ZERO).a - 1.0).abs() < 1e-5);
    }

    #[test]
    fn halftone_of_white_stays_white() {
        let ctx = over(Arc::new(Halftone::default()), Color::white());
        let out = ctx.get_color(Point::new(0.13, 0.37));
        assert!((out.r - 1.0).abs() < 1e-5 && (out.b - 1.0).abs() < 1e-5, "{out:?}");
    }
}
