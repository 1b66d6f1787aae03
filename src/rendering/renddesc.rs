use crate::foundation::core::{Affine, Point, Rect, Vec2, VectorInt};

/// Output raster description: pixel size, world corners and an optional world transform.
///
/// Pixel `(x, y)` covers world `[tl + x * pw, tl + (x + 1) * pw)` per axis. `pw`/`ph` are
/// negative when `br` lies left of or above `tl`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RendDesc {
    pub w: u32,
    pub h: u32,
    pub tl: Point,
    pub br: Point,
    #[serde(default = "identity")]
    pub transformation: Affine,
}

fn identity() -> Affine {
    Affine::IDENTITY
}

impl Default for RendDesc {
    fn default() -> Self {
        Self::new(480, 270, Point::new(-4.0, -2.25), Point::new(4.0, 2.25))
    }
}

impl RendDesc {
    pub fn new(w: u32, h: u32, tl: Point, br: Point) -> Self {
        Self {
            w,
            h,
            tl,
            br,
            transformation: Affine::IDENTITY,
        }
    }

    pub fn with_transformation(mut self, transformation: Affine) -> Self {
        self.transformation = transformation;
        self
    }

    pub fn pw(&self) -> f64 {
        (self.br.x - self.tl.x) / f64::from(self.w)
    }

    pub fn ph(&self) -> f64 {
        (self.br.y - self.tl.y) / f64::from(self.h)
    }

    pub fn size(&self) -> VectorInt {
        VectorInt::new(
            i32::try_from(self.w).unwrap_or(i32::MAX),
            i32::try_from(self.h).unwrap_or(i32::MAX),
        )
    }

    /// World rectangle covered by the raster, normalized.
    pub fn rect(&self) -> Rect {
        Rect::from_points(self.tl, self.br)
    }

    /// `true` when columns run right to left.
    pub fn flip_x(&self) -> bool {
        self.br.x < self.tl.x
    }

    /// `true` when rows run bottom to top.
    pub fn flip_y(&self) -> bool {
        self.br.y < self.tl.y
    }

    pub fn is_valid(&self) -> bool {
        self.w > 0
            && self.h > 0
            && self.pw().is_finite()
            && self.ph().is_finite()
            && self.pw() != 0.0
            && self.ph() != 0.0
    }

    /// Continuous pixel coordinates of a world point.
    pub fn world_to_pixel(&self, p: Point) -> Point {
        Point::new((p.x - self.tl.x) / self.pw(), (p.y - self.tl.y) / self.ph())
    }

    /// World point at continuous pixel coordinates.
    pub fn pixel_to_world(&self, p: Point) -> Point {
        self.tl + Vec2::new(p.x * self.pw(), p.y * self.ph())
    }

    /// World position of the center of pixel `(x, y)`.
    pub fn pixel_center(&self, x: u32, y: u32) -> Point {
        self.pixel_to_world(Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_centers_of_two_by_two() {
        let d = RendDesc::new(2, 2, Point::new(-1.0, -1.0), Point::new(1.0, 1.0));
        assert_eq!(d.pw(), 1.0);
        assert_eq!(d.pixel_center(0, 0), Point::new(-0.5, -0.5));
        assert_eq!(d.pixel_center(1, 1), Point::new(0.5, 0.5));
        assert_eq!(d.world_to_pixel(Point::new(0.0, 0.0)), Point::new(1.0, 1.0));
    }

    #[test]
    fn y_up_desc_has_negative_ph() {
        let d = RendDesc::new(4, 2, Point::new(-2.0, 1.0), Point::new(2.0, -1.0));
        assert!(d.ph() < 0.0);
        assert!(d.flip_y() && !d.flip_x());
        assert_eq!(d.rect(), Rect::new(-2.0, -1.0, 2.0, 1.0));
        assert_eq!(d.pixel_center(0, 0), Point::new(-1.5, 0.5));
    }

    #[test]
    fn zero_size_is_invalid() {
        assert!(!RendDesc::new(0, 4, Point::ZERO, Point::new(1.0, 1.0)).is_valid());
        assert!(!RendDesc::new(4, 4, Point::ZERO, Point::ZERO).is_valid());
        assert!(RendDesc::default().is_valid());
    }
}
