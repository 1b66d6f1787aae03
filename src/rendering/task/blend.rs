use crate::color::{BlendMethod, COLOR_EPSILON};
use crate::foundation::core::{Rect, rect_union};

/// Blends sub-task `b` onto sub-task `a`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskBlend {
    pub method: BlendMethod,
    pub amount: f32,
}

impl TaskBlend {
    pub fn new(method: BlendMethod, amount: f32) -> Self {
        Self { method, amount }
    }

    pub(super) fn bounds(&self, subs: &[Rect]) -> Rect {
        let a = subs.first().copied().unwrap_or(Rect::ZERO);
        let b = subs.get(1).copied().unwrap_or(Rect::ZERO);
        if self.amount.abs() <= COLOR_EPSILON || self.method.is_onto() {
            return a;
        }
        rect_union(a, b)
    }
}
