use super::{MAX_TARGET_DIM, SubCoords, Task, snap_to_grid};
use crate::foundation::core::{
    Affine, Point, Rect, Vec2, affine_is_invertible, rect_intersect, rect_is_finite,
    transform_bounds,
};
use crate::surface::Interpolation;

/// Resamples its sub-task through an affine map: `out(p) = sub(inverse(transform) * p)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskTransformationAffine {
    pub transform: Affine,
    pub interpolation: Interpolation,
}

impl TaskTransformationAffine {
    pub fn new(transform: Affine, interpolation: Interpolation) -> Self {
        Self {
            transform,
            interpolation,
        }
    }

    pub(super) fn bounds(&self, subs: &[Rect]) -> Rect {
        if !affine_is_invertible(&self.transform) {
            return Rect::ZERO;
        }
        transform_bounds(self.transform, subs.first().copied().unwrap_or(Rect::ZERO))
    }

    pub(super) fn sub_task_coords(&self, task: &Task, subs: &[Rect]) -> SubCoords {
        subs.iter()
            .map(|b| {
                let (rect, px) = self.source_coords(task, *b)?;
                snap_to_grid(rect, Point::ZERO, px)
            })
            .collect()
    }

    /// Source-space rectangle and resolution needed to fill `task`.
    fn source_coords(&self, task: &Task, sub_bounds: Rect) -> Option<(Rect, Vec2)> {
        if !affine_is_invertible(&self.transform) {
            return None;
        }
        let inv = self.transform.inverse();
        let want = rect_intersect(transform_bounds(inv, task.source_rect), sub_bounds);
        if !rect_is_finite(&want) {
            return None;
        }

        // Keep roughly the parent's density in source space.
        let scale = self.transform.determinant().abs().sqrt();
        let parent_px = task.pixel_size();
        let mut px = Vec2::new(parent_px.x / scale, parent_px.y / scale);

        let margin = f64::from(self.interpolation.margin() + 1);
        let limit = f64::from(MAX_TARGET_DIM) - 2.0 * margin - 2.0;
        let k = (want.width() / px.x / limit).max(want.height() / px.y / limit);
        if k > 1.0 {
            px *= k;
        }
        let grown = want.inflate(margin * px.x, margin * px.y);
        Some((grown, px))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::{FULL_PLANE, VectorInt};
    use crate::rendering::task::{TaskGraph, TaskKind};

    #[test]
    fn translated_source_rect_follows_inverse() {
        let mut g = TaskGraph::new();
        let leaf = g.add_leaf(TaskKind::Surface(crate::rendering::task::TaskSurface::new(
            std::sync::Arc::new(crate::surface::Surface::new(4, 4)),
            FULL_PLANE,
            Interpolation::Nearest,
        )));
        let t = g.add(
            TaskKind::TransformationAffine(TaskTransformationAffine::new(
                Affine::translate((1.0, 0.0)),
                Interpolation::Nearest,
            )),
            &[Some(leaf)],
        );
        g.set_coords(t, Rect::new(0.0, 0.0, 2.0, 2.0), VectorInt::new(2, 2));
        let sub = g.get(leaf).unwrap();
        assert!(sub.is_valid());
        // [-1, 1] x [0, 2] plus one pixel of margin on each side.
        assert_eq!(sub.source_rect, Rect::new(-2.0, -1.0, 2.0, 3.0));
        assert_eq!(sub.target_size, VectorInt::new(4, 4));
    }

    #[test]
    fn singular_transform_draws_nothing() {
        let tr = TaskTransformationAffine::new(Affine::scale(0.0), Interpolation::Linear);
        assert_eq!(tr.bounds(&[Rect::new(0.0, 0.0, 1.0, 1.0)]), Rect::ZERO);
    }

    #[test]
    fn downscale_is_capped() {
        let mut g = TaskGraph::new();
        let leaf = g.add_leaf(TaskKind::Surface(crate::rendering::task::TaskSurface::new(
            std::sync::Arc::new(crate::surface::Surface::new(1, 1)),
            FULL_PLANE,
            Interpolation::Nearest,
        )));
        let t = g.add(
            TaskKind::TransformationAffine(TaskTransformationAffine::new(
                Affine::scale_non_uniform(1e-3, 1e3),
                Interpolation::Cubic,
            )),
            &[Some(leaf)],
        );
        g.set_coords(t, Rect::new(0.0, 0.0, 64.0, 64.0), VectorInt::new(64, 64));
        let sub = g.get(leaf).unwrap();
        assert!(sub.is_valid());
        assert!(sub.target_size.x <= MAX_TARGET_DIM && sub.target_size.y <= MAX_TARGET_DIM);
    }
}
