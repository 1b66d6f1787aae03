//! Amount and blend method shared by composite layers, and the blend policy that wraps their
//! own contribution over the context below.

use crate::color::{BlendMethod, Color};
use crate::context::Context;
use crate::foundation::core::{Point, Rect, rect_union};
use crate::rendering::task::{TaskBlend, TaskGraph, TaskId, TaskKind, TaskLayer};

use super::Layer;

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Composite {
    pub amount: f32,
    pub blend_method: BlendMethod,
}

impl Default for Composite {
    fn default() -> Self {
        Self::new(1.0, BlendMethod::Composite)
    }
}

impl Composite {
    pub fn new(amount: f32, blend_method: BlendMethod) -> Self {
        Self {
            amount,
            blend_method,
        }
    }

    /// Amount scaled by the z-range visibility of the layer owning `below`.
    pub fn effective_amount(&self, below: &Context) -> f32 {
        self.amount * below.owner_visibility()
    }

    /// Blends the layer's own color at `pos` over the context below.
    pub fn blend(&self, own: Color, below: &Context, pos: Point) -> Color {
        let amount = self.effective_amount(below);
        if amount == 0.0 {
            return below.get_color(pos);
        }
        if self.replaces_context() {
            return Color::blend(own, Color::alpha(), amount, self.blend_method);
        }
        Color::blend(own, below.get_color(pos), amount, self.blend_method)
    }

    /// A fully weighted STRAIGHT blend hides everything below.
    pub fn replaces_context(&self) -> bool {
        self.blend_method == BlendMethod::Straight && self.amount == 1.0
    }

    /// Bounds of the layer given its own bounds and the context below.
    pub fn full_bounding_rect(&self, own: Rect, below: &Context) -> Rect {
        if self.amount == 0.0 {
            return below.get_full_bounding_rect();
        }
        if self.blend_method.is_onto() {
            return below.get_full_bounding_rect();
        }
        if self.replaces_context() {
            return own;
        }
        rect_union(own, below.get_full_bounding_rect())
    }
}

/// `Blend(a: context below, b: own contribution)`.
///
/// The own contribution comes from [`Layer::build_composite_task`], or from evaluating the
/// layer alone point by point when it has none.
pub fn build_blend_task<L: Layer + ?Sized>(
    layer: &L,
    c: &Composite,
    below: &Context,
    graph: &mut TaskGraph,
) -> Option<TaskId> {
    build_blend_task_with(c, layer.reads_context(), below, graph, |graph| {
        layer.build_composite_task(below.params(), graph).or_else(|| {
            let own = below.owner().isolated();
            Some(graph.add_leaf(TaskKind::Layer(TaskLayer::new(own))))
        })
    })
}

/// [`build_blend_task`] with the own contribution built by `own`; `None` is transparent.
///
/// A STRAIGHT layer at full amount that does not read its context drops the context task.
pub fn build_blend_task_with(
    c: &Composite,
    reads_context: bool,
    below: &Context,
    graph: &mut TaskGraph,
    own: impl FnOnce(&mut TaskGraph) -> Option<TaskId>,
) -> Option<TaskId> {
    let amount = c.effective_amount(below);
    let a = if c.replaces_context() && !reads_context {
        None
    } else {
        below.build_rendering_task(graph)
    };
    if amount == 0.0 {
        return a;
    }
    let b = own(graph);
    Some(graph.add(
        TaskKind::Blend(TaskBlend::new(c.blend_method, amount)),
        &[a, b],
    ))
}

/// `Blend(a: context below, b: f(copy of the context below))` for layers whose own
/// contribution is a filtered version of what is below them.
pub fn build_fork_task(
    c: &Composite,
    below: &Context,
    graph: &mut TaskGraph,
    own: impl FnOnce(&mut TaskGraph, Option<TaskId>) -> Option<TaskId>,
) -> Option<TaskId> {
    let a = below.build_rendering_task(graph);
    let amount = c.effective_amount(below);
    if amount == 0.0 {
        return a;
    }
    let copy = a.map(|id| graph.clone_recursive(id));
    let b = own(graph, copy);
    if c.replaces_context() {
        return b;
    }
    Some(graph.add(
        TaskKind::Blend(TaskBlend::new(c.blend_method, amount)),
        &[a, b],
    ))
}
