//! Float RGBA colors (straight alpha), the blend-method table, color matrices and gamma.

mod blend;
mod gamma;
mod gradient;
mod matrix;

use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Sub};

pub use blend::{BlendMethod, migrate_legacy_blend};
pub use gamma::Gamma;
pub use gradient::{Gradient, GradientStop};
pub use matrix::ColorMatrix;

/// Tolerance used when dividing by alpha.
pub const COLOR_EPSILON: f32 = 1e-6;

const ENCODE_YUV: [[f32; 3]; 3] = [
    [0.299, 0.587, 0.114],
    [-0.168_736, -0.331_264, 0.5],
    [0.5, -0.418_688, -0.081_312],
];

const DECODE_YUV: [[f32; 3]; 3] = [
    [1.0, 0.0, 1.402],
    [1.0, -0.344_136, -0.714_136],
    [1.0, 1.772, 0.0],
];

/// RGBA color with straight (non-premultiplied) alpha.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Fully transparent black.
    pub const fn alpha() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }

    pub const fn red() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0)
    }

    pub const fn green() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0)
    }

    pub const fn blue() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn with_alpha(mut self, a: f32) -> Self {
        self.a = a;
        self
    }

    /// `true` when all channels are finite numbers.
    pub fn is_valid(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    /// Replaces non-finite channels with zero.
    pub fn sanitized(self) -> Self {
        if self.is_valid() {
            return self;
        }
        let fix = |v: f32| if v.is_finite() { v } else { 0.0 };
        Self::new(fix(self.r), fix(self.g), fix(self.b), fix(self.a))
    }

    pub fn premult_alpha(self) -> Self {
        Self::new(self.r * self.a, self.g * self.a, self.b * self.a, self.a)
    }

    pub fn demult_alpha(self) -> Self {
        if self.a.abs() > COLOR_EPSILON {
            let inv = 1.0 / self.a;
            Self::new(self.r * inv, self.g * inv, self.b * inv, self.a)
        } else {
            Self::alpha()
        }
    }

    /// Channels clamped to `[0, 1]`.
    pub fn clamped(self) -> Self {
        Self::new(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
    }

    /// Inverts the color channels, keeping alpha.
    pub fn inverse(self) -> Self {
        Self::new(1.0 - self.r, 1.0 - self.g, 1.0 - self.b, self.a)
    }

    /// Luma.
    pub fn get_y(&self) -> f32 {
        ENCODE_YUV[0][0] * self.r + ENCODE_YUV[0][1] * self.g + ENCODE_YUV[0][2] * self.b
    }

    pub fn get_u(&self) -> f32 {
        ENCODE_YUV[1][0] * self.r + ENCODE_YUV[1][1] * self.g + ENCODE_YUV[1][2] * self.b
    }

    pub fn get_v(&self) -> f32 {
        ENCODE_YUV[2][0] * self.r + ENCODE_YUV[2][1] * self.g + ENCODE_YUV[2][2] * self.b
    }

    /// Chroma magnitude.
    pub fn get_s(&self) -> f32 {
        self.get_u().hypot(self.get_v())
    }

    /// Hue angle in radians.
    pub fn get_hue(&self) -> f32 {
        self.get_u().atan2(self.get_v())
    }

    pub fn set_yuv(&mut self, y: f32, u: f32, v: f32) -> &mut Self {
        self.r = DECODE_YUV[0][0] * y + DECODE_YUV[0][1] * u + DECODE_YUV[0][2] * v;
        self.g = DECODE_YUV[1][0] * y + DECODE_YUV[1][1] * u + DECODE_YUV[1][2] * v;
        self.b = DECODE_YUV[2][0] * y + DECODE_YUV[2][1] * u + DECODE_YUV[2][2] * v;
        self
    }

    pub fn set_y(&mut self, y: f32) -> &mut Self {
        let (u, v) = (self.get_u(), self.get_v());
        self.set_yuv(y, u, v)
    }

    pub fn set_uv(&mut self, u: f32, v: f32) -> &mut Self {
        let y = self.get_y();
        self.set_yuv(y, u, v)
    }

    pub fn set_s(&mut self, s: f32) -> &mut Self {
        let (u, v) = (self.get_u(), self.get_v());
        let cur = u.hypot(v);
        if cur > COLOR_EPSILON {
            let k = s / cur;
            self.set_uv(u * k, v * k);
        }
        self
    }

    pub fn set_hue(&mut self, theta: f32) -> &mut Self {
        let s = self.get_s();
        self.set_uv(theta.sin() * s, theta.cos() * s)
    }

    /// Linear blend between two colors in premultiplied space.
    pub fn mix_premult(a: Color, b: Color, t: f32) -> Color {
        let pa = a.premult_alpha();
        let pb = b.premult_alpha();
        (pa + (pb - pa) * t).demult_alpha()
    }

    /// Converts to premultiplied RGBA8.
    pub fn to_rgba8_premul(self) -> [u8; 4] {
        let c = self.clamped().premult_alpha();
        [to_u8(c.r), to_u8(c.g), to_u8(c.b), to_u8(c.a)]
    }

    /// Converts to straight RGBA8.
    pub fn to_rgba8(self) -> [u8; 4] {
        let c = self.clamped();
        [to_u8(c.r), to_u8(c.g), to_u8(c.b), to_u8(c.a)]
    }

    pub fn from_rgba8(px: [u8; 4]) -> Self {
        Self::new(
            f32::from(px[0]) / 255.0,
            f32::from(px[1]) / 255.0,
            f32::from(px[2]) / 255.0,
            f32::from(px[3]) / 255.0,
        )
    }

    pub fn from_rgba8_premul(px: [u8; 4]) -> Self {
        Self::from_rgba8(px).demult_alpha()
    }
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

impl Add for Color {
    type Output = Color;
    fn add(self, rhs: Color) -> Color {
        Color::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b, self.a + rhs.a)
    }
}

impl AddAssign for Color {
    fn add_assign(&mut self, rhs: Color) {
        *self = *self + rhs;
    }
}

impl Sub for Color {
    type Output = Color;
    fn sub(self, rhs: Color) -> Color {
        Color::new(self.r - rhs.r, self.g - rhs.g, self.b - rhs.b, self.a - rhs.a)
    }
}

impl Mul<f32> for Color {
    type Output = Color;
    fn mul(self, k: f32) -> Color {
        Color::new(self.r * k, self.g * k, self.b * k, self.a * k)
    }
}

impl MulAssign<f32> for Color {
    fn mul_assign(&mut self, k: f32) {
        *self = *self * k;
    }
}

impl Div<f32> for Color {
    type Output = Color;
    fn div(self, k: f32) -> Color {
        Color::new(self.r / k, self.g / k, self.b / k, self.a / k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn yuv_roundtrip_preserves_rgb() {
        let c = Color::new(0.2, 0.5, 0.8, 1.0);
        let mut d = c;
        d.set_yuv(c.get_y(), c.get_u(), c.get_v());
        assert!(close(d.r, c.r) && close(d.g, c.g) && close(d.b, c.b));
    }

    #[test]
    fn set_y_changes_only_luma() {
        let mut c = Color::new(0.2, 0.5, 0.8, 1.0);
        let (u, v) = (c.get_u(), c.get_v());
        c.set_y(0.7);
        assert!(close(c.get_y(), 0.7));
        assert!(close(c.get_u(), u) && close(c.get_v(), v));
    }

    #[test]
    fn demult_of_transparent_is_alpha() {
        assert_eq!(Color::new(0.3, 0.3, 0.3, 0.0).demult_alpha(), Color::alpha());
        let c = Color::new(0.5, 0.25, 1.0, 0.5);
        let back = c.premult_alpha().demult_alpha();
        assert!(close(back.r, c.r) && close(back.g, c.g) && close(back.a, c.a));
    }

    #[test]
    fn rgba8_conversions() {
        assert_eq!(Color::red().to_rgba8_premul(), [255, 0, 0, 255]);
        assert_eq!(Color::new(1.0, 1.0, 1.0, 0.5).to_rgba8_premul(), [128, 128, 128, 128]);
        let c = Color::from_rgba8_premul([128, 0, 0, 128]);
        assert!(close(c.r, 1.0) && close(c.a, 128.0 / 255.0));
    }

    #[test]
    fn sanitized_removes_nan() {
        let c = Color::new(f32::NAN, 1.0, f32::INFINITY, 1.0).sanitized();
        assert!(c.is_valid());
        assert_eq!(c, Color::new(0.0, 1.0, 0.0, 1.0));
    }
}
