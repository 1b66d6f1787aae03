use std::sync::LazyLock;

use crate::color::{Color, ColorMatrix, Gamma};
use crate::foundation::core::{FULL_PLANE, Point, Rect, Vec2};

static LUMA_KEY: LazyLock<ColorMatrix> = LazyLock::new(PixelOp::luma_key_matrix);

/// Clamps channels into `[floor, ceiling]`, optionally mirroring negatives.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Clamp {
    pub invert_negative: bool,
    pub clamp_ceiling: bool,
    pub ceiling: f32,
    pub floor: f32,
}

impl Default for Clamp {
    fn default() -> Self {
        Self {
            invert_negative: false,
            clamp_ceiling: true,
            ceiling: 1.0,
            floor: 0.0,
        }
    }
}

impl Clamp {
    pub fn apply(&self, c: Color) -> Color {
        if c.a == 0.0 {
            return Color::alpha();
        }
        let low = |v: f32| {
            if v >= self.floor {
                v
            } else if self.invert_negative {
                -v
            } else {
                self.floor
            }
        };
        let high = |v: f32| {
            if self.clamp_ceiling && v > self.ceiling {
                self.ceiling
            } else {
                v
            }
        };
        let f = |v: f32| high(low(v));
        Color::new(f(c.r), f(c.g), f(c.b), f(c.a))
    }
}

/// Screen shape used by [`Halftone`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HalftoneType {
    #[default]
    Symmetric,
    Round,
    Line,
}

impl HalftoneType {
    pub fn id(self) -> i32 {
        match self {
            HalftoneType::Symmetric => 0,
            HalftoneType::Round => 1,
            HalftoneType::Line => 2,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(HalftoneType::Symmetric),
            1 => Some(HalftoneType::Round),
            2 => Some(HalftoneType::Line),
            _ => None,
        }
    }
}

/// Three-screen halftone. Each channel is decomposed along its screen color and
/// re-synthesized through a rotated dot pattern.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Halftone {
    pub origin: Point,
    pub size: Vec2,
    pub kind: HalftoneType,
    /// Screen angles, radians.
    pub angles: [f64; 3],
    pub colors: [Color; 3],
    pub subtractive: bool,
}

impl Default for Halftone {
    fn default() -> Self {
        Self {
            origin: Point::ZERO,
            size: Vec2::new(0.25, 0.25),
            kind: HalftoneType::Symmetric,
            angles: [0.0, 30f64.to_radians(), 60f64.to_radians()],
            colors: [
                Color::new(0.0, 1.0, 1.0, 1.0),
                Color::new(1.0, 0.0, 1.0, 1.0),
                Color::new(1.0, 1.0, 0.0, 1.0),
            ],
            subtractive: true,
        }
    }
}

impl Halftone {
    /// Rows project a color onto each screen's direction.
    fn projection(&self) -> [[f32; 3]; 3] {
        let mut m = [[0.0f32; 3]; 3];
        for (row, c) in m.iter_mut().zip(self.colors) {
            let v = if self.subtractive {
                [1.0 - c.r, 1.0 - c.g, 1.0 - c.b]
            } else {
                [c.r, c.g, c.b]
            };
            let mag2 = v[0] * v[0] + v[1] * v[1] + v[2] * v[2];
            if mag2 > 0.0 {
                *row = [v[0] / mag2, v[1] / mag2, v[2] / mag2];
            }
        }
        m
    }

    /// Coverage of screen `i` at `p` for tone value `value`, softened over `soft` cells.
    fn tone(&self, i: usize, p: Point, value: f32, soft: f64) -> f32 {
        if value <= 0.0 {
            return 0.0;
        }
        if value >= 1.0 {
            return 1.0;
        }
        let (s, c) = self.angles[i].sin_cos();
        let d = p - self.origin;
        let u = (c * d.x + s * d.y) / self.size.x;
        let v = (-s * d.x + c * d.y) / self.size.y;
        if !u.is_finite() || !v.is_finite() {
            return value.clamp(0.0, 1.0);
        }
        let fu = u - u.floor() - 0.5;
        let fv = v - v.floor() - 0.5;
        // Threshold in [0, 1]: the screen value a tone must exceed to cover this point.
        let threshold = match self.kind {
            HalftoneType::Symmetric => {
                let a = (fu * std::f64::consts::TAU).cos();
                let b = (fv * std::f64::consts::TAU).cos();
                0.5 - 0.25 * (a + b)
            }
            HalftoneType::Round => ((fu * fu + fv * fv).sqrt() * std::f64::consts::SQRT_2).min(1.0),
            HalftoneType::Line => fv.abs() * 2.0,
        };
        let soft = soft.clamp(1e-4, 1.0);
        let t = ((f64::from(value) - threshold) / soft + 0.5).clamp(0.0, 1.0);
        t as f32
    }

    /// `pixel` is the world size of one output pixel and sets the antialiasing width.
    pub fn apply(&self, c: Color, p: Point, pixel: f64) -> Color {
        let m = self.projection();
        let soft = (pixel / self.size.hypot()).abs();
        let mut out;
        if self.subtractive {
            let inv = [1.0 - c.r, 1.0 - c.g, 1.0 - c.b];
            out = Color::white();
            for (i, row) in m.iter().enumerate() {
                let chan = row[0] * inv[0] + row[1] * inv[1] + row[2] * inv[2];
                out = out - self.colors[i].inverse() * self.tone(i, p, chan, soft);
            }
        } else {
            out = Color::black();
            for (i, row) in m.iter().enumerate() {
                let chan = row[0] * c.r + row[1] * c.g + row[2] * c.b;
                out = out + self.colors[i] * self.tone(i, p, chan, soft);
            }
        }
        out.with_alpha(c.a)
    }
}

/// Alternating cells of `color` and transparency, aligned to `origin`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Checkerboard {
    pub color: Color,
    pub origin: Point,
    pub size: Vec2,
}

impl Default for Checkerboard {
    fn default() -> Self {
        Self {
            color: Color::black(),
            origin: Point::new(0.125, 0.125),
            size: Vec2::new(0.25, 0.25),
        }
    }
}

impl Checkerboard {
    /// Whether `p` falls on a colored cell. The cell touching `origin` from above right is
    /// transparent.
    pub fn contains(&self, p: Point) -> bool {
        let d = p - self.origin;
        // Truncation toward zero makes the two cells around each axis share an index.
        let mut cell = (d.x / self.size.x) as i64 + (d.y / self.size.y) as i64;
        if d.x < 0.0 {
            cell += 1;
        }
        if d.y < 0.0 {
            cell += 1;
        }
        cell & 1 == 1
    }

    pub fn apply(&self, p: Point) -> Color {
        if self.contains(p) {
            self.color
        } else {
            Color::alpha()
        }
    }
}

/// A stateless per-pixel color function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PixelOp {
    Clamp(Clamp),
    ColorMatrix(ColorMatrix),
    Gamma(Gamma),
    /// [`PixelOp::luma_key_matrix`], then the keyed alpha is scaled by the input alpha.
    LumaKey,
    Halftone(Halftone),
    /// Ignores its input.
    Checkerboard(Checkerboard),
}

impl PixelOp {
    /// The luma-key linear part: moves luma into alpha and sets luma to one.
    pub fn luma_key_matrix() -> ColorMatrix {
        let mut m = ColorMatrix::encode_yuv();
        let mut key = ColorMatrix::IDENTITY;
        key.m[0] = [0.0, 0.0, 0.0, 1.0, 0.0];
        key.m[3][3] = 0.0;
        key.m[4][0] = 1.0;
        m *= key;
        m *= ColorMatrix::decode_yuv();
        m
    }

    pub fn apply(&self, c: Color, pos: Point, pixel: f64) -> Color {
        match self {
            PixelOp::Clamp(op) => op.apply(c),
            PixelOp::ColorMatrix(m) => m.apply(c),
            PixelOp::Gamma(g) => g.apply(c),
            PixelOp::LumaKey => {
                let keyed = LUMA_KEY.apply(c);
                keyed.with_alpha(c.a * keyed.a)
            }
            PixelOp::Halftone(h) => h.apply(c, pos, pixel),
            PixelOp::Checkerboard(b) => b.apply(pos),
        }
    }

    /// Every output is transparent regardless of input.
    pub fn is_transparent(&self) -> bool {
        match self {
            PixelOp::ColorMatrix(m) => m.is_transparent(),
            PixelOp::Checkerboard(b) => b.color.a == 0.0,
            _ => false,
        }
    }

    /// Output does not depend on the input.
    pub fn is_constant(&self) -> bool {
        match self {
            PixelOp::ColorMatrix(m) => m.is_constant(),
            PixelOp::Checkerboard(_) => true,
            _ => false,
        }
    }

    pub fn is_identity(&self) -> bool {
        match self {
            PixelOp::ColorMatrix(m) => m.is_copy(),
            PixelOp::Gamma(g) => g.is_identity(),
            _ => false,
        }
    }

    /// Transparent input may produce visible output.
    pub fn affects_transparent(&self) -> bool {
        match self {
            PixelOp::ColorMatrix(m) => m.affects_transparent(),
            PixelOp::Checkerboard(b) => b.color.a != 0.0,
            _ => false,
        }
    }

}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskPixelProcessor {
    pub op: PixelOp,
}

impl TaskPixelProcessor {
    pub fn new(op: PixelOp) -> Self {
        Self { op }
    }

    pub(super) fn bounds(&self, subs: &[Rect]) -> Rect {
        if self.op.affects_transparent() {
            return FULL_PLANE;
        }
        if self.op.is_transparent() {
            return Rect::ZERO;
        }
        subs.first().copied().unwrap_or(Rect::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::rect_is_valid;

    fn close(a: Color, b: Color) -> bool {
        (a.r - b.r).abs() < 1e-4
            && (a.g - b.g).abs() < 1e-4
            && (a.b - b.b).abs() < 1e-4
            && (a.a - b.a).abs() < 1e-4
    }

    #[test]
    fn clamp_floors_and_mirrors() {
        let c = Color::new(-0.5, 2.0, 0.3, 1.0);
        assert_eq!(Clamp::default().apply(c), Color::new(0.0, 1.0, 0.3, 1.0));
        let mirror = Clamp {
            invert_negative: true,
            clamp_ceiling: false,
            ..Clamp::default()
        };
        assert_eq!(mirror.apply(c), Color::new(0.5, 2.0, 0.3, 1.0));
        assert_eq!(Clamp::default().apply(Color::red().with_alpha(0.0)), Color::alpha());
    }

    #[test]
    fn luma_key_moves_luma_into_alpha() {
        let c = Color::new(0.5, 0.5, 0.5, 0.8);
        let out = PixelOp::LumaKey.apply(c, Point::ZERO, 1.0);
        assert!((out.a - 0.4).abs() < 1e-5);
        assert!((out.get_y() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn luma_key_matrix_matches_linear_part() {
        let c = Color::new(0.2, 0.7, 0.1, 1.0);
        let m = PixelOp::luma_key_matrix().apply(c);
        let direct = PixelOp::LumaKey.apply(c, Point::ZERO, 1.0);
        assert!(close(m, direct), "{m:?} vs {direct:?}");
    }

    #[test]
    fn checkerboard_alternates_across_the_origin() {
        let b = Checkerboard {
            origin: Point::ZERO,
            size: Vec2::new(1.0, 1.0),
            ..Checkerboard::default()
        };
        assert!(!b.contains(Point::new(0.5, 0.5)));
        assert!(b.contains(Point::new(1.5, 0.5)));
        assert!(b.contains(Point::new(-0.5, 0.5)));
        assert!(!b.contains(Point::new(-0.5, -0.5)));
        assert!(b.contains(Point::new(0.5, -0.5)));
        assert!(!b.contains(Point::new(-1.5, 0.5)));

        let op = PixelOp::Checkerboard(b);
        assert!(op.is_constant() && op.affects_transparent());
        assert_eq!(op.apply(Color::red(), Point::new(1.5, 0.5), 1.0), Color::black());
        assert_eq!(op.apply(Color::red(), Point::new(0.5, 0.5), 1.0), Color::alpha());
    }

    #[test]
    fn solid_fill_covers_plane() {
        let t = TaskPixelProcessor::new(PixelOp::ColorMatrix(ColorMatrix::constant(Color::red())));
        assert_eq!(t.bounds(&[Rect::ZERO]), FULL_PLANE);
        let gone = TaskPixelProcessor::new(PixelOp::ColorMatrix(ColorMatrix::replace_alpha(0.0)));
        assert!(gone.op.is_transparent());
        assert!(!rect_is_valid(&gone.bounds(&[Rect::new(0.0, 0.0, 1.0, 1.0)])));
    }

    #[test]
    fn halftone_preserves_alpha_and_extremes() {
        let h = Halftone::default();
        let white = h.apply(Color::white().with_alpha(0.3), Point::new(0.1, 0.2), 0.01);
        assert!(close(white, Color::white().with_alpha(0.3)), "{white:?}");
        let additive = Halftone {
            subtractive: false,
            colors: [Color::red(), Color::green(), Color::blue()],
            ..h
        };
        let black = additive.apply(Color::black(), Point::new(0.4, -0.2), 0.01);
        assert!(close(black, Color::black()));
    }
}
