use super::Color;

/// Per-channel power curve. Alpha is left untouched.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Gamma {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Default for Gamma {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl Gamma {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn uniform(v: f32) -> Self {
        Self::new(v, v, v)
    }

    pub fn is_identity(&self) -> bool {
        (self.r - 1.0).abs() < 1e-6 && (self.g - 1.0).abs() < 1e-6 && (self.b - 1.0).abs() < 1e-6
    }

    /// Curve that undoes this one. Zero exponents map to zero.
    pub fn inverse(&self) -> Self {
        let inv = |v: f32| if v.abs() > 1e-12 { 1.0 / v } else { 0.0 };
        Self::new(inv(self.r), inv(self.g), inv(self.b))
    }

    pub fn apply(&self, c: Color) -> Color {
        Color::new(
            channel(c.r, self.r),
            channel(c.g, self.g),
            channel(c.b, self.b),
            c.a,
        )
    }
}

/// Sign-preserving power so out-of-gamut negatives stay finite.
fn channel(v: f32, exp: f32) -> f32 {
    if v < 0.0 {
        -(-v).powf(exp)
    } else {
        v.powf(exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_undoes_gamma() {
        let g = Gamma::new(2.2, 1.8, 0.5);
        let c = Color::new(0.3, 0.6, 0.9, 0.4);
        let back = g.inverse().apply(g.apply(c));
        assert!((back.r - c.r).abs() < 1e-5);
        assert!((back.g - c.g).abs() < 1e-5);
        assert!((back.b - c.b).abs() < 1e-5);
        assert_eq!(back.a, c.a);
    }

    #[test]
    fn negative_channels_stay_finite() {
        let out = Gamma::uniform(2.0).apply(Color::new(-0.5, 0.0, 1.0, 1.0));
        assert_eq!(out.r, -0.25);
        assert!(out.is_valid());
        assert!(Gamma::default().is_identity());
    }
}
