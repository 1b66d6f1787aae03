use super::Color;

/// One color stop of a [`Gradient`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GradientStop {
    pub pos: f64,
    pub color: Color,
}

/// Piecewise linear color ramp over `[0, 1]`, interpolated in premultiplied space.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Gradient {
    stops: Vec<GradientStop>,
}

impl Gradient {
    /// Two-stop ramp from `a` at 0 to `b` at 1.
    pub fn new(a: Color, b: Color) -> Self {
        Self::from_stops(vec![
            GradientStop { pos: 0.0, color: a },
            GradientStop { pos: 1.0, color: b },
        ])
    }

    pub fn from_stops(mut stops: Vec<GradientStop>) -> Self {
        stops.retain(|s| s.pos.is_finite());
        stops.sort_by(|a, b| a.pos.total_cmp(&b.pos));
        Self { stops }
    }

    pub fn stops(&self) -> &[GradientStop] {
        &self.stops
    }

    pub fn at(&self, x: f64) -> Color {
        let (Some(first), Some(last)) = (self.stops.first(), self.stops.last()) else {
            return Color::alpha();
        };
        if !(x > first.pos) {
            return first.color;
        }
        if x >= last.pos {
            return last.color;
        }
        for w in self.stops.windows(2) {
            let (a, b) = (w[0], w[1]);
            if x <= b.pos {
                let span = b.pos - a.pos;
                let t = if span > 0.0 { (x - a.pos) / span } else { 1.0 };
                return Color::mix_premult(a.color, b.color, t as f32);
            }
        }
        last.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_ends_and_middle() {
        let g = Gradient::new(Color::black(), Color::white());
        assert_eq!(g.at(-1.0), Color::black());
        assert_eq!(g.at(2.0), Color::white());
        let mid = g.at(0.5);
        assert!((mid.r - 0.5).abs() < 1e-5);
        assert_eq!(Gradient::default().at(0.3), Color::alpha());
    }
}
