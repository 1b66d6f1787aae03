use crate::color::{BlendMethod, Color};
use crate::context::Context;
use crate::foundation::core::{Point, Rect, rect_union};
use crate::layer::composite::build_blend_task_with;
use crate::layer::param::{ParamDesc, ParamTable};
use crate::layer::{Composite, Layer, LayerBase};
use crate::rendering::task::{TaskBlend, TaskGraph, TaskId, TaskKind};
use crate::{layer_common, param};

/// Quality the pull path samples time with.
pub const PULL_QUALITY: i32 = 3;

/// Weighting of the time samples across the shutter.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Subsampling {
    Constant,
    /// From `subsample_start` at the oldest sample to `subsample_end` at the current time.
    Linear,
    /// Sample `i` of `n` weighs `1 / (n - i)`.
    #[default]
    Hyperbolic,
}

impl Subsampling {
    pub fn id(self) -> i32 {
        match self {
            Subsampling::Constant => 0,
            Subsampling::Linear => 1,
            Subsampling::Hyperbolic => 2,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Subsampling::Constant),
            1 => Some(Subsampling::Linear),
            2 => Some(Subsampling::Hyperbolic),
            _ => None,
        }
    }
}

/// Averages the context below over the `aperture` seconds leading up to the current time.
#[derive(Clone, Debug)]
pub struct MotionBlur {
    base: LayerBase,
    pub composite: Composite,
    pub aperture: f64,
    pub subsamples_factor: f64,
    pub subsampling: Subsampling,
    pub subsample_start: f64,
    pub subsample_end: f64,
}

impl Default for MotionBlur {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ParamTable for MotionBlur {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<MotionBlur>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("aperture", aperture),
            param!("subsamples_factor", subsamples_factor),
            param!("subsampling_type", subsampling),
            param!("subsample_start", subsample_start),
            param!("subsample_end", subsample_end),
        ];
        TABLE
    }
}

fn samples_for_quality(quality: i32) -> usize {
    match quality {
        i32::MIN..=1 => 32,
        2 => 24,
        3 => 16,
        4 => 12,
        5 => 7,
        6 => 6,
        7 => 5,
        8 => 3,
        9 => 2,
        _ => 1,
    }
}

impl MotionBlur {
    pub fn new(aperture: f64) -> Self {
        Self {
            base: LayerBase::default(),
            composite: Composite::new(1.0, BlendMethod::Straight),
            aperture,
            subsamples_factor: 1.0,
            subsampling: Subsampling::Hyperbolic,
            subsample_start: 0.0,
            subsample_end: 1.0,
        }
    }

    /// `(time, weight)` of every sample with a non-zero weight, oldest first. An empty list
    /// means the layer passes the context through.
    pub fn samples(&self, time: f64, quality: i32) -> Vec<(f64, f64)> {
        if self.aperture == 0.0 || quality > 10 {
            return Vec::new();
        }
        let scaled = samples_for_quality(quality) as f64 * self.subsamples_factor;
        if !(scaled >= 2.0) {
            return Vec::new();
        }
        let mut n = scaled.min(f64::from(u16::MAX)) as usize;
        if self.subsampling == Subsampling::Linear {
            n += usize::from(self.subsample_start == 0.0) + usize::from(self.subsample_end == 0.0);
        }
        (0..n)
            .filter_map(|i| {
                let pos = i as f64 / (n as f64 - 1.0);
                let ipos = 1.0 - pos;
                let weight = match self.subsampling {
                    Subsampling::Constant => 1.0,
                    Subsampling::Linear => ipos * self.subsample_start + pos * self.subsample_end,
                    Subsampling::Hyperbolic => 1.0 / (n - i) as f64,
                };
                (weight != 0.0).then_some((time - self.aperture * ipos, weight))
            })
            .collect()
    }

    fn shifted<'a>(
        &self,
        context: &'a Context,
        quality: i32,
    ) -> impl Iterator<Item = (Context, f32)> + 'a {
        let mut total = 0.0;
        self.samples(context.params().time, quality)
            .into_iter()
            .map(move |(time, weight)| {
                total += weight;
                let mut params = context.params().clone();
                params.time = time;
                (context.with_params(params), (weight / total) as f32)
            })
    }
}

impl Layer for MotionBlur {
    layer_common!("motion_blur");

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
        let mut shifted = self.shifted(context, PULL_QUALITY).peekable();
        if shifted.peek().is_none() {
            return self.composite.blend(context.get_color(pos), context, pos);
        }
        // Each step mixes in its weight over the running total, leaving the weighted mean.
        let mean = shifted.fold(Color::alpha(), |acc, (ctx, share)| {
            Color::blend(ctx.get_color(pos), acc, share, BlendMethod::Straight)
        });
        self.composite.blend(mean, context, pos)
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        let own = self
            .shifted(context, PULL_QUALITY)
            .fold(context.get_full_bounding_rect(), |acc, (ctx, _)| {
                rect_union(acc, ctx.get_full_bounding_rect())
            });
        self.composite.full_bounding_rect(own, context)
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        let shifted: Vec<_> = self.shifted(context, graph.quality()).collect();
        build_blend_task_with(&self.composite, true, context, graph, |graph| {
            if shifted.is_empty() {
                return context.build_rendering_task(graph);
            }
            let mut acc = None;
            for (ctx, share) in shifted {
                let sample = ctx.build_rendering_task(graph);
                acc = Some(graph.add(
                    TaskKind::Blend(TaskBlend::new(BlendMethod::Straight, share)),
                    &[acc, sample],
                ));
            }
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextParams;
    use crate::layer::param::Param;
    use crate::layers::SolidColor;
    use std::sync::Arc;

    fn fading_red() -> Context {
        let mut red = SolidColor::new(Color::black());
        red.color = Param::linked(|p| Color::new(p.time as f32, 0.0, 0.0, 1.0));
        Context::new(&[Arc::new(red)], ContextParams::at_time(1.0), 0)
    }

    #[test]
    fn sample_weights_follow_the_subsampling() {
        let mut l = MotionBlur::new(1.0);
        l.subsampling = Subsampling::Constant;
        assert_eq!(l.samples(1.0, 9), vec![(0.0, 1.0), (1.0, 1.0)]);

        l.subsampling = Subsampling::Hyperbolic;
        assert_eq!(l.samples(1.0, 9), vec![(0.0, 0.5), (1.0, 1.0)]);

        l.subsampling = Subsampling::Linear;
        assert_eq!(l.samples(2.0, 9), vec![(1.5, 0.5), (2.0, 1.0)]);

        assert!(l.samples(1.0, 10).is_empty());
        l.aperture = 0.0;
        assert!(l.samples(1.0, 1).is_empty());
    }

    #[test]
    fn constant_shutter_averages_over_time() {
        let mut l = MotionBlur::new(1.0);
        l.subsampling = Subsampling::Constant;
        let c = l.get_color(&fading_red(), Point::ZERO);
        assert!((c.r - 0.5).abs() < 1e-5, "{c:?}");
        assert!((c.a - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_aperture_passes_through() {
        let l = MotionBlur::new(0.0);
        let c = l.get_color(&fading_red(), Point::ZERO);
        assert_eq!(c, Color::new(1.0, 0.0, 0.0, 1.0));
    }
}
