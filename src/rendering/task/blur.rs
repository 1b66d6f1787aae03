use std::sync::LazyLock;

use super::{SubCoords, Task, on_parent_grid};
use crate::color::Color;
use crate::foundation::core::{Point, Rect, Vec2, rect_is_valid};
use crate::foundation::math::gauss;

/// Kernel shape. The numeric ids are stable and used in saved parameters.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BlurType {
    Box,
    #[default]
    FastGaussian,
    Cross,
    Gaussian,
    Disc,
}

static GAUSS_EXTRA: LazyLock<f64> = LazyLock::new(|| {
    let min_value = 1.0 / 4096.0;
    (-2.0 * (min_value / gauss(0.0, 1.0)).ln()).sqrt()
});

impl BlurType {
    pub const ALL: [BlurType; 5] = [
        BlurType::Box,
        BlurType::FastGaussian,
        BlurType::Cross,
        BlurType::Gaussian,
        BlurType::Disc,
    ];

    pub fn id(self) -> i32 {
        match self {
            BlurType::Box => 0,
            BlurType::FastGaussian => 1,
            BlurType::Cross => 2,
            BlurType::Gaussian => 3,
            BlurType::Disc => 4,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    /// Measured factor that makes the kernels look equally wide for the same size.
    pub fn amplifier(self) -> f64 {
        match self {
            BlurType::Box | BlurType::Cross => 19.362962 / 9.182808 * 19.362962 / 20.634363,
            BlurType::FastGaussian => {
                20.297409 / 6.309251 * 20.297409 / 21.081510 * 20.297409 / 21.513471
            }
            BlurType::Disc => 17.821498 / 8.778783 * 17.821498 / 17.640771,
            BlurType::Gaussian => 1.0,
        }
    }

    /// Kernel support in units of the (amplified) size.
    pub fn extra(self) -> f64 {
        match self {
            BlurType::Box | BlurType::Cross | BlurType::Disc => 1.0,
            BlurType::FastGaussian | BlurType::Gaussian => *GAUSS_EXTRA,
        }
    }
}

/// Blur of a given world-space size.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Blur {
    pub size: Vec2,
    pub kind: BlurType,
}

impl Blur {
    pub fn new(size: Vec2, kind: BlurType) -> Self {
        Self { size, kind }
    }

    /// Effective kernel radius in world units.
    pub fn radius(&self) -> Vec2 {
        let k = self.kind.amplifier();
        Vec2::new((self.size.x * k).abs(), (self.size.y * k).abs())
    }

    /// Effective kernel radius in pixels of size `px`.
    pub fn radius_px(&self, px: Vec2) -> Vec2 {
        let r = self.radius();
        Vec2::new(r.x / px.x.abs(), r.y / px.y.abs())
    }

    /// Pixels of source needed on each side of the output.
    pub fn pixel_margin(&self, px: Vec2) -> (i32, i32) {
        let r = self.radius_px(px) * self.kind.extra();
        let m = |v: f64| {
            if v.is_finite() {
                (v.abs() + 0.5 - 1e-10).ceil().min(f64::from(super::MAX_TARGET_DIM)) as i32
            } else {
                0
            }
        };
        (m(r.x), m(r.y))
    }

    pub fn is_identity(&self) -> bool {
        let r = self.radius();
        r.x < 1e-10 && r.y < 1e-10
    }

    /// World rectangle that blurred content of `r` may spread to.
    pub fn expand(&self, r: Rect) -> Rect {
        if !rect_is_valid(&r) {
            return Rect::ZERO;
        }
        let s = self.radius() * self.kind.extra();
        r.inflate(s.x, s.y)
    }

    /// Deterministic point estimate of the blurred value at `pos` using `source` for
    /// unblurred colors.
    pub fn sample(&self, pos: Point, source: impl Fn(Point) -> Color) -> Color {
        const N: i32 = 4;
        if self.is_identity() {
            return source(pos);
        }
        let r = self.radius();
        let span = r * self.kind.extra();
        let mut acc = Color::alpha();
        let mut total = 0.0f32;
        for j in -N..=N {
            for i in -N..=N {
                let u = f64::from(i) / f64::from(N);
                let v = f64::from(j) / f64::from(N);
                let w = match self.kind {
                    BlurType::Box => 1.0,
                    BlurType::Cross => {
                        if i == 0 || j == 0 {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    BlurType::Disc => {
                        if u * u + v * v <= 1.0 {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    BlurType::FastGaussian | BlurType::Gaussian => {
                        gauss(u * span.x, r.x.max(1e-10)) * gauss(v * span.y, r.y.max(1e-10))
                    }
                } as f32;
                if w <= 0.0 {
                    continue;
                }
                let c = source(Point::new(pos.x + u * span.x, pos.y + v * span.y));
                acc = acc + c.premult_alpha() * w;
                total += w;
            }
        }
        if total <= 0.0 {
            return source(pos);
        }
        (acc / total).demult_alpha()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskBlur {
    pub blur: Blur,
}

impl TaskBlur {
    pub fn new(blur: Blur) -> Self {
        Self { blur }
    }

    pub(super) fn bounds(&self, subs: &[Rect]) -> Rect {
        self.blur.expand(subs.first().copied().unwrap_or(Rect::ZERO))
    }

    pub(super) fn sub_task_coords(&self, task: &Task, subs: &[Rect]) -> SubCoords {
        let margin = self.blur.pixel_margin(task.pixel_size());
        subs.iter()
            .map(|b| on_parent_grid(task, task.source_rect, margin, *b))
            .collect()
    }
}
