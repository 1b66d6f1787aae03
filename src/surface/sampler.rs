use std::f32::consts::PI;

use super::Surface;
use crate::color::Color;

/// Resampling filter.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    Linear,
    Cosine,
    #[default]
    Cubic,
}

impl Interpolation {
    /// Quality 0 is best, 10 is fastest.
    pub fn from_quality(quality: i32) -> Self {
        match quality {
            q if q <= 4 => Self::Cubic,
            5 => Self::Cosine,
            6 => Self::Linear,
            _ => Self::Nearest,
        }
    }

    /// Extra source pixels the filter reads on each side.
    pub fn margin(self) -> i32 {
        match self {
            Self::Nearest => 0,
            Self::Linear | Self::Cosine => 1,
            Self::Cubic => 2,
        }
    }
}

/// Reads a [`Surface`] at fractional pixel coordinates.
///
/// Filtering happens on premultiplied values; results are straight again. Taps outside the
/// surface read as transparent.
#[derive(Clone, Copy, Debug)]
pub struct Sampler<'a> {
    surface: &'a Surface,
    interpolation: Interpolation,
}

impl<'a> Sampler<'a> {
    pub fn new(surface: &'a Surface, interpolation: Interpolation) -> Self {
        Self {
            surface,
            interpolation,
        }
    }

    /// `(x, y)` in surface pixel units; pixel `(i, j)` has its center at `(i + 0.5, j + 0.5)`.
    pub fn sample(&self, x: f64, y: f64) -> Color {
        if !x.is_finite() || !y.is_finite() {
            return Color::alpha();
        }
        let w = f64::from(self.surface.width());
        let h = f64::from(self.surface.height());
        let m = f64::from(self.interpolation.margin()) + 1.0;
        if x < -m || y < -m || x > w + m || y > h + m {
            return Color::alpha();
        }
        match self.interpolation {
            Interpolation::Nearest => self.surface.get(x.floor() as i32, y.floor() as i32),
            Interpolation::Linear => self.two_tap(x, y, |f| f),
            Interpolation::Cosine => self.two_tap(x, y, |f| (1.0 - (f * PI).cos()) * 0.5),
            Interpolation::Cubic => self.cubic(x, y),
        }
    }

    fn tap(&self, x: i32, y: i32) -> Color {
        self.surface.get(x, y).premult_alpha()
    }

    fn two_tap(&self, x: f64, y: f64, shape: impl Fn(f32) -> f32) -> Color {
        let u = x - 0.5;
        let v = y - 0.5;
        let x0 = u.floor();
        let y0 = v.floor();
        let fx = shape((u - x0) as f32);
        let fy = shape((v - y0) as f32);
        let (x0, y0) = (x0 as i32, y0 as i32);

        let top = self.tap(x0, y0) * (1.0 - fx) + self.tap(x0 + 1, y0) * fx;
        let bottom = self.tap(x0, y0 + 1) * (1.0 - fx) + self.tap(x0 + 1, y0 + 1) * fx;
        (top * (1.0 - fy) + bottom * fy).demult_alpha()
    }

    fn cubic(&self, x: f64, y: f64) -> Color {
        let u = x - 0.5;
        let v = y - 0.5;
        let x0 = u.floor();
        let y0 = v.floor();
        let wx = catmull_rom_weights((u - x0) as f32);
        let wy = catmull_rom_weights((v - y0) as f32);
        let (x0, y0) = (x0 as i32, y0 as i32);

        let mut acc = Color::alpha();
        for (j, ky) in wy.iter().enumerate() {
            let mut row = Color::alpha();
            for (i, kx) in wx.iter().enumerate() {
                row += self.tap(x0 - 1 + i as i32, y0 - 1 + j as i32) * *kx;
            }
            acc += row * *ky;
        }
        // Overshoot may push alpha slightly out of range.
        let a = acc.a.clamp(0.0, 1.0);
        if a <= 0.0 {
            return Color::alpha();
        }
        acc.with_alpha(a).demult_alpha()
    }
}

fn catmull_rom_weights(t: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        0.5 * (-t3 + 2.0 * t2 - t),
        0.5 * (3.0 * t3 - 5.0 * t2 + 2.0),
        0.5 * (-3.0 * t3 + 4.0 * t2 + t),
        0.5 * (t3 - t2),
    ]
}
