use std::sync::Arc;

use crate::context::Context;
use crate::foundation::core::{Point, Rect, rect_is_valid};
use crate::surface::{Interpolation, Surface};

/// Pre-rendered pixels spread from `tl` (pixel `(0, 0)`) to `br` in world space.
///
/// The corners keep their orientation, so `tl.y > br.y` places row 0 at the top of a
/// y-up world.
#[derive(Clone, Debug)]
pub struct TaskSurface {
    pub surface: Arc<Surface>,
    pub tl: Point,
    pub br: Point,
    pub interpolation: Interpolation,
}

impl TaskSurface {
    /// Places row 0 along `rect.y0`.
    pub fn new(surface: Arc<Surface>, rect: Rect, interpolation: Interpolation) -> Self {
        Self::between(surface, rect.origin(), Point::new(rect.x1, rect.y1), interpolation)
    }

    pub fn between(surface: Arc<Surface>, tl: Point, br: Point, interpolation: Interpolation) -> Self {
        Self {
            surface,
            tl,
            br,
            interpolation,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_points(self.tl, self.br)
    }

    /// Surface pixel coordinates of world point `p`.
    pub fn pixel_coords(&self, p: Point) -> (f64, f64) {
        let span = self.br - self.tl;
        (
            (p.x - self.tl.x) / span.x * f64::from(self.surface.width()),
            (p.y - self.tl.y) / span.y * f64::from(self.surface.height()),
        )
    }

    pub fn bounds(&self) -> Rect {
        let rect = self.rect();
        if self.surface.is_empty() || !rect_is_valid(&rect) {
            return Rect::ZERO;
        }
        rect
    }
}

/// Evaluates a context point by point for layers that have no task builder.
#[derive(Clone, Debug)]
pub struct TaskLayer {
    pub context: Context,
}

impl TaskLayer {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    pub(super) fn bounds(&self) -> Rect {
        self.context.get_full_bounding_rect()
    }
}
