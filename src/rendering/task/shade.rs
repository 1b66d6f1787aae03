use super::{SubCoords, Task, pass_through};
use crate::color::{BlendMethod, Color};
use crate::foundation::core::{FULL_PLANE, Rect, rect_union};

/// Turns the difference between two offset copies of a matte into highlight and shadow.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskShade {
    /// Highlight color, used where `lo` is more opaque than `hi`.
    pub color1: Color,
    /// Shadow color.
    pub color2: Color,
    /// Matte is `alpha * luma` instead of alpha.
    pub use_luma: bool,
    /// Mix both colors everywhere instead of fading to transparent.
    pub solid: bool,
}

impl TaskShade {
    pub fn new(color1: Color, color2: Color) -> Self {
        Self {
            color1,
            color2,
            use_luma: false,
            solid: false,
        }
    }

    pub fn matte(&self, c: Color) -> f32 {
        if self.use_luma { c.a * c.get_y() } else { c.a }
    }

    /// Shade for matte values sampled at the highlight and shadow offsets.
    pub fn shade(&self, hi: f32, lo: f32) -> Color {
        let alpha = (1.0 - hi) - (1.0 - lo);
        if self.solid {
            return Color::blend(
                self.color1,
                self.color2,
                alpha * 0.5 + 0.5,
                BlendMethod::Straight,
            );
        }
        if alpha > 0.0 {
            self.color1.with_alpha(self.color1.a * alpha)
        } else {
            self.color2.with_alpha(self.color2.a * -alpha)
        }
    }

    pub(super) fn bounds(&self, subs: &[Rect]) -> Rect {
        if self.solid {
            return FULL_PLANE;
        }
        subs.iter().fold(Rect::ZERO, |acc, r| rect_union(acc, *r))
    }

    pub(super) fn sub_task_coords(&self, task: &Task, subs: &[Rect]) -> SubCoords {
        // Solid shading covers the whole rect, even where the matte is empty.
        subs.iter()
            .map(|b| pass_through(task, if self.solid { FULL_PLANE } else { *b }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_mattes_give_no_shade() {
        let s = TaskShade::new(Color::white(), Color::black());
        assert_eq!(s.shade(0.4, 0.4).a, 0.0);
        let hi = s.shade(0.0, 1.0);
        assert_eq!(hi, Color::white());
        let lo = s.shade(1.0, 0.25);
        assert_eq!(lo, Color::black().with_alpha(0.75));
    }

    #[test]
    fn solid_mixes_halfway_on_flat_matte() {
        let s = TaskShade {
            solid: true,
            ..TaskShade::new(Color::white(), Color::black())
        };
        let c = s.shade(0.5, 0.5);
        assert!((c.r - 0.5).abs() < 1e-5 && (c.a - 1.0).abs() < 1e-5);
        assert_eq!(s.bounds(&[Rect::ZERO, Rect::ZERO]), FULL_PLANE);
    }
}
