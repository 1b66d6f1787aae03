use kurbo::Shape;

use crate::color::Color;
use crate::foundation::core::{Affine, BezPath, FULL_PLANE, Point, Rect, affine_is_invertible};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WindingStyle {
    #[default]
    NonZero,
    EvenOdd,
}

impl WindingStyle {
    pub fn id(self) -> i32 {
        match self {
            WindingStyle::NonZero => 0,
            WindingStyle::EvenOdd => 1,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(WindingStyle::NonZero),
            1 => Some(WindingStyle::EvenOdd),
            _ => None,
        }
    }

    pub fn is_inside(self, winding: i32) -> bool {
        match self {
            WindingStyle::NonZero => winding != 0,
            WindingStyle::EvenOdd => winding % 2 != 0,
        }
    }
}

/// Solid fill of a closed outline.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskContour {
    pub path: BezPath,
    pub transform: Affine,
    pub color: Color,
    pub winding: WindingStyle,
    pub antialias: bool,
    /// Fill the outside instead of the inside.
    pub invert: bool,
}

impl Default for TaskContour {
    fn default() -> Self {
        Self {
            path: BezPath::new(),
            transform: Affine::IDENTITY,
            color: Color::white(),
            winding: WindingStyle::NonZero,
            antialias: true,
            invert: false,
        }
    }
}

impl TaskContour {
    pub fn new(path: BezPath, color: Color) -> Self {
        Self {
            path,
            color,
            ..Self::default()
        }
    }

    pub fn move_to(&mut self, p: Point) -> &mut Self {
        self.path.move_to(p);
        self
    }

    pub fn line_to(&mut self, p: Point) -> &mut Self {
        self.path.line_to(p);
        self
    }

    /// Quadratic segment through control point `p1`.
    pub fn conic_to(&mut self, p1: Point, p2: Point) -> &mut Self {
        self.path.quad_to(p1, p2);
        self
    }

    pub fn cubic_to(&mut self, p1: Point, p2: Point, p3: Point) -> &mut Self {
        self.path.curve_to(p1, p2, p3);
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.path.close_path();
        self
    }

    pub fn bounds(&self) -> Rect {
        if self.invert {
            return FULL_PLANE;
        }
        if self.path.elements().is_empty() || !affine_is_invertible(&self.transform) {
            return Rect::ZERO;
        }
        self.transform.transform_rect_bbox(self.path.bounding_box())
    }

    /// Whether world point `p` is filled, ignoring antialiasing.
    pub fn contains(&self, p: Point) -> bool {
        if !affine_is_invertible(&self.transform) {
            return self.invert;
        }
        let local = self.transform.inverse() * p;
        let inside = self.winding.is_inside(self.path.winding(local));
        inside != self.invert
    }

    /// Color of the fill at full coverage `coverage` in `[0, 1]`.
    pub fn color_at(&self, coverage: f32) -> Color {
        let mut k = coverage.clamp(0.0, 1.0);
        if !self.antialias {
            k = if k >= 0.5 { 1.0 } else { 0.0 };
        }
        if self.invert {
            k = 1.0 - k;
        }
        self.color.with_alpha(self.color.a * k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::rect_is_valid;

    fn square() -> TaskContour {
        let mut c = TaskContour::new(BezPath::new(), Color::red());
        c.move_to(Point::new(0.0, 0.0))
            .line_to(Point::new(2.0, 0.0))
            .line_to(Point::new(2.0, 2.0))
            .line_to(Point::new(0.0, 2.0))
            .close();
        c
    }

    #[test]
    fn contains_respects_invert_and_transform() {
        let mut c = square();
        assert!(c.contains(Point::new(1.0, 1.0)));
        assert!(!c.contains(Point::new(3.0, 1.0)));
        c.transform = Affine::translate((10.0, 0.0));
        assert!(c.contains(Point::new(11.0, 1.0)));
        c.invert = true;
        assert!(!c.contains(Point::new(11.0, 1.0)));
        assert_eq!(c.bounds(), FULL_PLANE);
    }

    #[test]
    fn even_odd_punches_holes() {
        let mut c = square();
        c.move_to(Point::new(0.5, 0.5))
            .line_to(Point::new(1.5, 0.5))
            .line_to(Point::new(1.5, 1.5))
            .line_to(Point::new(0.5, 1.5))
            .close();
        assert!(c.contains(Point::new(1.0, 1.0)));
        c.winding = WindingStyle::EvenOdd;
        assert!(!c.contains(Point::new(1.0, 1.0)));
        assert!(c.contains(Point::new(0.25, 1.0)));
    }

    #[test]
    fn aliased_coverage_snaps_at_half() {
        let mut c = square();
        c.antialias = false;
        assert_eq!(c.color_at(0.49).a, 0.0);
        assert_eq!(c.color_at(0.5).a, 1.0);
        assert!(!rect_is_valid(&TaskContour::default().bounds()));
        assert_eq!(square().bounds(), Rect::new(0.0, 0.0, 2.0, 2.0));
    }
}
