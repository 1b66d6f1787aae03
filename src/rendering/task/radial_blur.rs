use super::{SubCoords, Task, on_parent_grid};
use crate::color::Color;
use crate::foundation::core::{
    FULL_PLANE, Point, Rect, rect_expand_point, rect_is_finite, rect_is_valid, rect_union,
};

/// Smears each pixel along the segment towards `origin`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskRadialBlur {
    pub origin: Point,
    /// Fraction of the distance to `origin` covered by the streak.
    pub size: f64,
    /// Weight samples near the pixel higher than samples near the origin.
    pub fade_out: bool,
}

impl TaskRadialBlur {
    pub fn new(origin: Point, size: f64, fade_out: bool) -> Self {
        Self {
            origin,
            size,
            fade_out,
        }
    }

    /// Far end of the streak starting at `p`.
    pub fn end_point(&self, p: Point) -> Point {
        self.origin + (p - self.origin) * (1.0 - self.size)
    }

    /// Weight of sample `i` out of `n`, where `i == 0` is the pixel itself.
    pub fn weight(&self, i: i32, n: i32) -> f32 {
        if self.fade_out { (i - n) as f32 } else { 1.0 }
    }

    pub fn bounds(&self, subs: &[Rect]) -> Rect {
        let b = subs.first().copied().unwrap_or(Rect::ZERO);
        if !rect_is_valid(&b) {
            return Rect::ZERO;
        }
        let k = 1.0 - self.size;
        if !rect_is_finite(&b) || k <= 1e-6 || !k.is_finite() {
            return FULL_PLANE;
        }
        // Pixels whose streak end lands inside `b`.
        let o = self.origin;
        let grown = Rect::new(
            o.x + (b.x0 - o.x) / k,
            o.y + (b.y0 - o.y) / k,
            o.x + (b.x1 - o.x) / k,
            o.y + (b.y1 - o.y) / k,
        );
        rect_union(b, grown.abs())
    }

    pub(super) fn sub_task_coords(&self, task: &Task, subs: &[Rect]) -> SubCoords {
        let r = task.source_rect;
        let mut want = r;
        for c in [
            Point::new(r.x0, r.y0),
            Point::new(r.x1, r.y0),
            Point::new(r.x0, r.y1),
            Point::new(r.x1, r.y1),
        ] {
            want = rect_expand_point(want, self.end_point(c));
        }
        subs.iter()
            .map(|b| on_parent_grid(task, want, (2, 2), *b))
            .collect()
    }

    /// Deterministic point estimate along the streak, using `source` for unblurred colors.
    pub fn sample(&self, pos: Point, source: impl Fn(Point) -> Color) -> Color {
        const N: i32 = 16;
        let end = self.end_point(pos);
        if !end.x.is_finite() || !end.y.is_finite() {
            return source(pos);
        }
        let mut pool = Color::alpha();
        let mut total = 0.0f32;
        for i in 0..N {
            let t = f64::from(i) / f64::from(N);
            let w = self.weight(i, N);
            pool = pool + source(pos.lerp(end, t)).premult_alpha() * w;
            total += w;
        }
        if total == 0.0 {
            return source(pos);
        }
        (pool / total).demult_alpha()
    }
}
