use std::ops::{Mul, MulAssign};

use super::{COLOR_EPSILON, Color};

/// 5x5 affine color transform in row-vector convention.
///
/// `out.r = r*m[0][0] + g*m[1][0] + b*m[2][0] + a*m[3][0] + m[4][0]`, and the same pattern for
/// the other channels. Row 4 is the constant offset; column 4 is always `(0, 0, 0, 0, 1)`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorMatrix {
    pub m: [[f32; 5]; 5],
}

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ColorMatrix {
    pub const IDENTITY: Self = Self {
        m: [
            [1.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn scale(r: f32, g: f32, b: f32, a: f32) -> Self {
        let mut out = Self::IDENTITY;
        out.m[0][0] = r;
        out.m[1][1] = g;
        out.m[2][2] = b;
        out.m[3][3] = a;
        out
    }

    pub fn scale_rgb(k: f32) -> Self {
        Self::scale(k, k, k, 1.0)
    }

    pub fn translate(r: f32, g: f32, b: f32, a: f32) -> Self {
        let mut out = Self::IDENTITY;
        out.m[4] = [r, g, b, a, 1.0];
        out
    }

    /// Ignores the input and yields `c` everywhere.
    pub fn constant(c: Color) -> Self {
        let mut out = Self::scale(0.0, 0.0, 0.0, 0.0);
        out.m[4] = [c.r, c.g, c.b, c.a, 1.0];
        out
    }

    /// Replaces the color channels, keeps alpha.
    pub fn replace_color(c: Color) -> Self {
        let mut out = Self::scale(0.0, 0.0, 0.0, 1.0);
        out.m[4] = [c.r, c.g, c.b, 0.0, 1.0];
        out
    }

    /// Replaces alpha, keeps the color channels.
    pub fn replace_alpha(a: f32) -> Self {
        let mut out = Self::scale(1.0, 1.0, 1.0, 0.0);
        out.m[4][3] = a;
        out
    }

    pub fn brightness(x: f32) -> Self {
        Self::translate(x, x, x, 0.0)
    }

    /// Contrast around mid grey.
    pub fn contrast(x: f32) -> Self {
        Self::translate(-0.5, -0.5, -0.5, 0.0)
            * Self::scale(x, x, x, 1.0)
            * Self::translate(0.5, 0.5, 0.5, 0.0)
    }

    pub fn exposure(x: f32) -> Self {
        Self::scale_rgb(x.exp())
    }

    pub fn encode_yuv() -> Self {
        let mut out = Self::IDENTITY;
        out.m[0][0] = 0.299;
        out.m[0][1] = -0.168_736;
        out.m[0][2] = 0.5;
        out.m[1][0] = 0.587;
        out.m[1][1] = -0.331_264;
        out.m[1][2] = -0.418_688;
        out.m[2][0] = 0.114;
        out.m[2][1] = 0.5;
        out.m[2][2] = -0.081_312;
        out
    }

    pub fn decode_yuv() -> Self {
        let mut out = Self::IDENTITY;
        out.m[0][0] = 1.0;
        out.m[0][1] = 1.0;
        out.m[0][2] = 1.0;
        out.m[1][0] = 0.0;
        out.m[1][1] = -0.344_136;
        out.m[1][2] = 1.772;
        out.m[2][0] = 1.402;
        out.m[2][1] = -0.714_136;
        out.m[2][2] = 0.0;
        out
    }

    /// Rotates the chroma plane by `angle` radians.
    pub fn rotate_uv(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let mut out = Self::IDENTITY;
        out.m[1][1] = c;
        out.m[1][2] = -s;
        out.m[2][1] = s;
        out.m[2][2] = c;
        out
    }

    pub fn hue_saturation(hue: f32, saturation: f32) -> Self {
        Self::encode_yuv()
            * Self::scale(1.0, saturation, saturation, 1.0)
            * Self::rotate_uv(hue)
            * Self::decode_yuv()
    }

    pub fn invert_color() -> Self {
        Self::scale(-1.0, -1.0, -1.0, 1.0) * Self::translate(1.0, 1.0, 1.0, 0.0)
    }

    pub fn invert_alpha() -> Self {
        Self::scale(1.0, 1.0, 1.0, -1.0) * Self::translate(0.0, 0.0, 0.0, 1.0)
    }

    pub fn apply(&self, c: Color) -> Color {
        let m = &self.m;
        let v = [c.r, c.g, c.b, c.a];
        let ch = |j: usize| {
            v[0] * m[0][j] + v[1] * m[1][j] + v[2] * m[2][j] + v[3] * m[3][j] + m[4][j]
        };
        Color::new(ch(0), ch(1), ch(2), ch(3))
    }

    pub fn is_copy(&self) -> bool {
        self.approx_eq(&Self::IDENTITY)
    }

    /// `true` when the output does not depend on the input.
    pub fn is_constant(&self) -> bool {
        self.m[..4]
            .iter()
            .all(|row| row[..4].iter().all(|v| v.abs() <= COLOR_EPSILON))
    }

    /// `true` when every output is transparent black.
    pub fn is_zero(&self) -> bool {
        self.m
            .iter()
            .all(|row| row[..4].iter().all(|v| v.abs() <= COLOR_EPSILON))
    }

    /// `true` when the output alpha is always zero.
    pub fn is_transparent(&self) -> bool {
        (0..5).all(|i| self.m[i][3].abs() <= COLOR_EPSILON)
    }

    /// `true` when transparent input pixels may become visible.
    pub fn affects_transparent(&self) -> bool {
        self.m[4][3].abs() > COLOR_EPSILON
    }

    fn approx_eq(&self, other: &Self) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(other.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= COLOR_EPSILON)
    }
}

impl MulAssign for ColorMatrix {
    /// Appends `rhs`: the result applies `self` first, then `rhs`.
    fn mul_assign(&mut self, rhs: ColorMatrix) {
        let mut out = [[0.0f32; 5]; 5];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..5).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        self.m = out;
    }
}

impl Mul for ColorMatrix {
    type Output = ColorMatrix;
    fn mul(mut self, rhs: ColorMatrix) -> ColorMatrix {
        self *= rhs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Color, b: Color) -> bool {
        (a.r - b.r).abs() < 1e-4
            && (a.g - b.g).abs() < 1e-4
            && (a.b - b.b).abs() < 1e-4
            && (a.a - b.a).abs() < 1e-4
    }

    const C: Color = Color::new(0.2, 0.6, 0.9, 0.5);

    #[test]
    fn composition_applies_left_first() {
        let m = ColorMatrix::scale(2.0, 2.0, 2.0, 1.0) * ColorMatrix::translate(0.1, 0.1, 0.1, 0.0);
        assert!(close(m.apply(C), Color::new(0.5, 1.3, 1.9, 0.5)));
    }

    #[test]
    fn yuv_encode_decode_is_identity() {
        let m = ColorMatrix::encode_yuv() * ColorMatrix::decode_yuv();
        assert!(close(m.apply(C), C));
        let y = ColorMatrix::encode_yuv().apply(C).r;
        assert!((y - C.get_y()).abs() < 1e-5);
    }

    #[test]
    fn neutral_hue_saturation_is_copy() {
        assert!(close(ColorMatrix::hue_saturation(0.0, 1.0).apply(C), C));
        let grey = ColorMatrix::hue_saturation(0.3, 0.0).apply(C);
        assert!((grey.r - grey.g).abs() < 1e-4 && (grey.g - grey.b).abs() < 1e-4);
    }

    #[test]
    fn predicates() {
        assert!(ColorMatrix::IDENTITY.is_copy());
        assert!(ColorMatrix::constant(Color::red()).is_constant());
        assert!(ColorMatrix::constant(Color::red()).affects_transparent());
        assert!(!ColorMatrix::brightness(0.2).affects_transparent());
        assert!(ColorMatrix::scale(1.0, 1.0, 1.0, 0.0).is_transparent());
        assert!(ColorMatrix::scale(0.0, 0.0, 0.0, 0.0).is_zero());
    }

    #[test]
    fn inversions() {
        let c = ColorMatrix::invert_color().apply(C);
        assert!(close(c, Color::new(0.8, 0.4, 0.1, 0.5)));
        let a = ColorMatrix::invert_alpha().apply(C);
        assert!((a.a - 0.5).abs() < 1e-6);
        assert!((ColorMatrix::invert_alpha().apply(Color::red()).a).abs() < 1e-6);
    }

    #[test]
    fn contrast_keeps_mid_grey() {
        let g = Color::new(0.5, 0.5, 0.5, 1.0);
        assert!(close(ColorMatrix::contrast(3.0).apply(g), g));
    }
}
