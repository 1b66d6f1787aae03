//! Renders the context below several times, once per index value.

use crate::color::Color;
use crate::context::Context;
use crate::foundation::core::{Point, Rect, rect_union};
use crate::layer::composite::Composite;
use crate::layer::param::{ParamDesc, ParamTable};
use crate::layer::{Hit, Layer, LayerBase};
use crate::rendering::task::{TaskBlend, TaskGraph, TaskId, TaskKind};
use crate::{layer_common, param};

/// Upper bound on the copies a single duplicate layer renders.
pub const MAX_STEPS: usize = 4096;

/// Index values `from, from ± step, ...` up to and including `to`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct IndexStepper {
    pub from: f64,
    pub to: f64,
    pub step: f64,
}

impl Default for IndexStepper {
    fn default() -> Self {
        Self {
            from: 1.0,
            to: 3.0,
            step: 1.0,
        }
    }
}

impl IndexStepper {
    pub fn new(from: f64, to: f64, step: f64) -> Self {
        Self { from, to, step }
    }

    /// Number of index values; a zero or non-finite step yields `from` only.
    pub fn count(&self) -> usize {
        let span = self.to - self.from;
        let step = self.step.abs();
        if !span.is_finite() || !self.from.is_finite() || !step.is_finite() || step == 0.0 {
            return 1;
        }
        let n = (span.abs() / step + 1e-9).floor();
        (n as usize).saturating_add(1).min(MAX_STEPS)
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let dir = if self.to >= self.from { 1.0 } else { -1.0 };
        let step = self.step.abs() * dir;
        (0..self.count()).map(move |i| self.from + step * i as f64)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Duplicate {
    base: LayerBase,
    pub composite: Composite,
    pub index: IndexStepper,
}

impl ParamTable for Duplicate {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Duplicate>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("from", index.from),
            param!("to", index.to),
            param!("step", index.step),
        ];
        TABLE
    }
}

impl Duplicate {
    pub fn new(index: IndexStepper) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    fn copies<'a>(&'a self, context: &'a Context) -> impl Iterator<Item = Context> + 'a {
        self.index.iter().map(move |i| {
            let mut params = context.params().clone();
            params.index = i;
            context.with_params(params)
        })
    }
}

impl Layer for Duplicate {
    layer_common!("duplicate");

    fn composite(&self) -> Option<&Composite> {
        Some(&self.composite)
    }

    fn reads_context(&self) -> bool {
        true
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        let amount = self.composite.effective_amount(context);
        self.copies(context).fold(Color::alpha(), |acc, copy| {
            Color::blend(copy.get_color(pos), acc, amount, self.composite.blend_method)
        })
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        self.copies(context)
            .fold(Rect::ZERO, |acc, copy| rect_union(acc, copy.get_full_bounding_rect()))
    }

    fn hit_check(&self, context: &Context, pos: Point) -> Hit {
        self.copies(context)
            .last()
            .and_then(|copy| copy.hit_check(pos))
            .into()
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        let amount = self.composite.effective_amount(context);
        let mut acc = None;
        for copy in self.copies(context) {
            let b = copy.build_rendering_task(graph);
            acc = Some(graph.add(
                TaskKind::Blend(TaskBlend::new(self.composite.blend_method, amount)),
                &[acc, b],
            ));
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepper_counts_inclusive_range_both_ways() {
        assert_eq!(IndexStepper::new(1.0, 3.0, 1.0).iter().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
        assert_eq!(IndexStepper::new(3.0, 1.0, 1.0).iter().collect::<Vec<_>>(), vec![3.0, 2.0, 1.0]);
        assert_eq!(IndexStepper::new(0.0, 1.0, 0.4).count(), 3);
        assert_eq!(IndexStepper::new(0.0, 5.0, 0.0).count(), 1);
        assert_eq!(IndexStepper::new(0.0, 1e12, 1.0).count(), MAX_STEPS);
    }
}
