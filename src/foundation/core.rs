pub use kurbo::{Affine, BezPath, CubicBez, Point, Rect, Vec2};

/// Rectangle covering the whole plane. Used as the bounds of layers that paint everywhere.
pub const FULL_PLANE: Rect = Rect::new(
    f64::NEG_INFINITY,
    f64::NEG_INFINITY,
    f64::INFINITY,
    f64::INFINITY,
);

/// Integer 2D vector, used for pixel sizes and pixel offsets.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct VectorInt {
    pub x: i32,
    pub y: i32,
}

impl VectorInt {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// `true` when both components are strictly positive.
    pub fn is_positive(self) -> bool {
        self.x > 0 && self.y > 0
    }
}

/// Half-open integer pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct RectInt {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl RectInt {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn from_size(size: VectorInt) -> Self {
        Self::new(0, 0, size.x, size.y)
    }

    pub fn is_valid(&self) -> bool {
        self.x0 < self.x1 && self.y0 < self.y1
    }

    pub fn width(&self) -> i32 {
        (self.x1 - self.x0).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y1 - self.y0).max(0)
    }

    pub fn size(&self) -> VectorInt {
        VectorInt::new(self.width(), self.height())
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    pub fn intersect(&self, other: &RectInt) -> RectInt {
        RectInt::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        )
    }

    pub fn expand(&self, dx: i32, dy: i32) -> RectInt {
        RectInt::new(self.x0 - dx, self.y0 - dy, self.x1 + dx, self.y1 + dy)
    }

    pub fn offset(&self, v: VectorInt) -> RectInt {
        RectInt::new(self.x0 + v.x, self.y0 + v.y, self.x1 + v.x, self.y1 + v.y)
    }
}

/// `true` when `r` has positive, non-NaN extent. Infinite rectangles are valid.
pub fn rect_is_valid(r: &Rect) -> bool {
    r.x0 < r.x1 && r.y0 < r.y1
}

/// `true` when `r` is valid and every coordinate is finite.
pub fn rect_is_finite(r: &Rect) -> bool {
    rect_is_valid(r) && r.x0.is_finite() && r.y0.is_finite() && r.x1.is_finite() && r.y1.is_finite()
}

/// Union that ignores invalid (empty) operands.
pub fn rect_union(a: Rect, b: Rect) -> Rect {
    match (rect_is_valid(&a), rect_is_valid(&b)) {
        (true, true) => a.union(b),
        (true, false) => a,
        (false, true) => b,
        (false, false) => Rect::ZERO,
    }
}

/// Intersection; the result is invalid when the operands do not overlap.
pub fn rect_intersect(a: Rect, b: Rect) -> Rect {
    if !rect_is_valid(&a) || !rect_is_valid(&b) {
        return Rect::ZERO;
    }
    Rect::new(a.x0.max(b.x0), a.y0.max(b.y0), a.x1.min(b.x1), a.y1.min(b.y1))
}

/// Grow `r` by `point` so that the result contains it.
pub fn rect_expand_point(r: Rect, p: Point) -> Rect {
    if !p.x.is_finite() || !p.y.is_finite() {
        return r;
    }
    if !rect_is_valid(&r) {
        return Rect::new(p.x, p.y, p.x, p.y);
    }
    Rect::new(r.x0.min(p.x), r.y0.min(p.y), r.x1.max(p.x), r.y1.max(p.y))
}

/// Bounding box of `r` after `affine`. Infinite inputs stay infinite.
pub fn transform_bounds(affine: Affine, r: Rect) -> Rect {
    if !rect_is_valid(&r) {
        return Rect::ZERO;
    }
    if !rect_is_finite(&r) {
        return FULL_PLANE;
    }
    affine.transform_rect_bbox(r)
}

/// `true` when `a` has a finite, non-singular linear part.
pub fn affine_is_invertible(a: &Affine) -> bool {
    let det = a.determinant();
    det.is_finite() && det.abs() > 1e-12
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_ignores_empty_rects() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(rect_union(a, Rect::ZERO), a);
        assert_eq!(rect_union(Rect::ZERO, a), a);
        assert!(!rect_is_valid(&rect_union(Rect::ZERO, Rect::ZERO)));
    }

    #[test]
    fn intersect_of_disjoint_is_invalid() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(2.0, 2.0, 3.0, 3.0);
        assert!(!rect_is_valid(&rect_intersect(a, b)));
        assert_eq!(rect_intersect(a, FULL_PLANE), a);
    }

    #[test]
    fn full_plane_is_valid_but_not_finite() {
        assert!(rect_is_valid(&FULL_PLANE));
        assert!(!rect_is_finite(&FULL_PLANE));
        assert_eq!(transform_bounds(Affine::rotate(0.3), FULL_PLANE), FULL_PLANE);
    }

    #[test]
    fn rect_int_intersection_and_size() {
        let a = RectInt::new(0, 0, 4, 4);
        let b = RectInt::new(2, -1, 6, 3);
        let i = a.intersect(&b);
        assert_eq!(i, RectInt::new(2, 0, 4, 3));
        assert_eq!(i.size(), VectorInt::new(2, 3));
        assert!(!RectInt::new(3, 0, 3, 5).is_valid());
    }

    #[test]
    fn expand_point_starts_from_degenerate_rect() {
        let r = rect_expand_point(Rect::ZERO, Point::new(2.0, 3.0));
        let r = rect_expand_point(r, Point::new(-1.0, 5.0));
        assert_eq!(r, Rect::new(-1.0, 3.0, 2.0, 5.0));
        let same = rect_expand_point(r, Point::new(f64::NAN, 0.0));
        assert_eq!(same, r);
    }
}
