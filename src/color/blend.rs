use super::{COLOR_EPSILON, Color};

/// Blend methods with their stable serialized ids.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum BlendMethod {
    #[default]
    Composite = 0,
    Straight = 1,
    Brighten = 2,
    Darken = 3,
    Add = 4,
    Subtract = 5,
    Multiply = 6,
    Divide = 7,
    Color = 8,
    Hue = 9,
    Saturation = 10,
    Luminance = 11,
    Behind = 12,
    Onto = 13,
    AlphaBrighten = 14,
    AlphaDarken = 15,
    Screen = 16,
    HardLight = 17,
    Difference = 18,
    AlphaOver = 19,
    Overlay = 20,
    StraightOnto = 21,
    AddComposite = 22,
}

impl BlendMethod {
    pub const ALL: [BlendMethod; 23] = [
        BlendMethod::Composite,
        BlendMethod::Straight,
        BlendMethod::Brighten,
        BlendMethod::Darken,
        BlendMethod::Add,
        BlendMethod::Subtract,
        BlendMethod::Multiply,
        BlendMethod::Divide,
        BlendMethod::Color,
        BlendMethod::Hue,
        BlendMethod::Saturation,
        BlendMethod::Luminance,
        BlendMethod::Behind,
        BlendMethod::Onto,
        BlendMethod::AlphaBrighten,
        BlendMethod::AlphaDarken,
        BlendMethod::Screen,
        BlendMethod::HardLight,
        BlendMethod::Difference,
        BlendMethod::AlphaOver,
        BlendMethod::Overlay,
        BlendMethod::StraightOnto,
        BlendMethod::AddComposite,
    ];

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<Self> {
        usize::try_from(id)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Methods that never paint outside what is already below them.
    pub fn is_onto(self) -> bool {
        matches!(
            self,
            BlendMethod::Brighten
                | BlendMethod::Darken
                | BlendMethod::Multiply
                | BlendMethod::Divide
                | BlendMethod::Color
                | BlendMethod::Hue
                | BlendMethod::Saturation
                | BlendMethod::Luminance
                | BlendMethod::Onto
                | BlendMethod::StraightOnto
                | BlendMethod::Screen
                | BlendMethod::Overlay
                | BlendMethod::HardLight
        )
    }

    /// Methods where transparent source pixels still change the result.
    pub fn is_straight(self) -> bool {
        matches!(
            self,
            BlendMethod::Straight | BlendMethod::StraightOnto | BlendMethod::AlphaBrighten
        )
    }
}

impl Color {
    /// Blends `a` (the layer's own color) onto `b` (what is below) with `amount`.
    pub fn blend(a: Color, b: Color, amount: f32, method: BlendMethod) -> Color {
        if amount.abs() <= COLOR_EPSILON {
            return b;
        }
        let out = match method {
            BlendMethod::Composite => composite(a, b, amount),
            BlendMethod::Straight => straight(a, b, amount),
            BlendMethod::Onto => onto(a, b, amount),
            BlendMethod::StraightOnto => straight_onto(a, b, amount),
            BlendMethod::Brighten => brighten(a, b, amount),
            BlendMethod::Darken => darken(a, b, amount),
            BlendMethod::Add => add(a, b, amount),
            BlendMethod::Subtract => subtract(a, b, amount),
            BlendMethod::Difference => difference(a, b, amount),
            BlendMethod::Multiply => multiply(a, b, amount),
            BlendMethod::Divide => divide(a, b, amount),
            BlendMethod::Color => chroma(a, b, amount, |t, a| {
                t.set_uv(a.get_u(), a.get_v());
            }),
            BlendMethod::Hue => chroma(a, b, amount, |t, a| {
                t.set_hue(a.get_hue());
            }),
            BlendMethod::Saturation => chroma(a, b, amount, |t, a| {
                t.set_s(a.get_s());
            }),
            BlendMethod::Luminance => chroma(a, b, amount, |t, a| {
                t.set_y(a.get_y());
            }),
            BlendMethod::Behind => behind(a, b, amount),
            BlendMethod::AlphaBrighten => alpha_brighten(a, b, amount),
            BlendMethod::AlphaDarken => alpha_darken(a, b, amount),
            BlendMethod::Screen => screen(a, b, amount),
            BlendMethod::Overlay => overlay(a, b, amount),
            BlendMethod::HardLight => hard_light(a, b, amount),
            BlendMethod::AlphaOver => alpha_over(a, b, amount),
            BlendMethod::AddComposite => add_composite(a, b, amount),
        };
        out.sanitized()
    }
}

fn composite(src: Color, dest: Color, amount: f32) -> Color {
    let a_src = src.a * amount;
    let a_dest = dest.a;
    let c = src * a_src + dest * a_dest * (1.0 - a_src);
    let a_out = a_src + a_dest * (1.0 - a_src);
    if a_out.abs() > COLOR_EPSILON {
        (c / a_out).with_alpha(a_out)
    } else {
        Color::alpha()
    }
}

fn straight(src: Color, bg: Color, amount: f32) -> Color {
    let a_out = (src.a - bg.a) * amount + bg.a;
    if a_out.abs() <= COLOR_EPSILON {
        return Color::alpha();
    }
    let c = ((src * src.a) - (bg * bg.a)) * amount + bg * bg.a;
    (c / a_out).with_alpha(a_out)
}

fn onto(a: Color, b: Color, amount: f32) -> Color {
    composite(a, b.with_alpha(1.0), amount).with_alpha(b.a)
}

fn straight_onto(a: Color, b: Color, amount: f32) -> Color {
    straight(a.with_alpha(a.a * b.a), b, amount)
}

fn brighten(a: Color, mut b: Color, amount: f32) -> Color {
    let alpha = a.a * amount;
    b.r = b.r.max(a.r * alpha);
    b.g = b.g.max(a.g * alpha);
    b.b = b.b.max(a.b * alpha);
    b
}

fn darken(a: Color, mut b: Color, amount: f32) -> Color {
    let alpha = a.a * amount;
    b.r = b.r.min((a.r - 1.0) * alpha + 1.0);
    b.g = b.g.min((a.g - 1.0) * alpha + 1.0);
    b.b = b.b.min((a.b - 1.0) * alpha + 1.0);
    b
}

fn add(a: Color, b: Color, amount: f32) -> Color {
    let (ba, aa) = (b.a, a.a * amount);
    Color::new(b.r * ba + a.r * aa, b.g * ba + a.g * aa, b.b * ba + a.b * aa, ba)
}

fn subtract(a: Color, b: Color, amount: f32) -> Color {
    let (ba, aa) = (b.a, a.a * amount);
    Color::new(b.r * ba - a.r * aa, b.g * ba - a.g * aa, b.b * ba - a.b * aa, ba)
}

fn difference(a: Color, b: Color, amount: f32) -> Color {
    let (ba, aa) = (b.a, a.a * amount);
    Color::new(
        (b.r * ba - a.r * aa).abs(),
        (b.g * ba - a.g * aa).abs(),
        (b.b * ba - a.b * aa).abs(),
        ba,
    )
}

fn multiply(mut a: Color, mut b: Color, mut amount: f32) -> Color {
    if amount < 0.0 {
        a = a.inverse();
        amount = -amount;
    }
    amount *= a.a;
    b.r += (b.r * a.r - b.r) * amount;
    b.g += (b.g * a.g - b.g) * amount;
    b.b += (b.b * a.b - b.b) * amount;
    b
}

fn divide(a: Color, mut b: Color, amount: f32) -> Color {
    let amount = amount * a.a;
    b.r += (b.r / (a.r + COLOR_EPSILON) - b.r) * amount;
    b.g += (b.g / (a.g + COLOR_EPSILON) - b.g) * amount;
    b.b += (b.b / (a.b + COLOR_EPSILON) - b.b) * amount;
    b
}

fn chroma(a: Color, b: Color, amount: f32, apply: impl Fn(&mut Color, &Color)) -> Color {
    let mut temp = b;
    apply(&mut temp, &a);
    (temp - b) * (amount * a.a) + b
}

fn behind(a: Color, b: Color, amount: f32) -> Color {
    let a = if a.a == 0.0 {
        a.with_alpha(COLOR_EPSILON * amount)
    } else {
        a.with_alpha(a.a * amount)
    };
    composite(b, a, 1.0)
}

fn alpha_brighten(a: Color, b: Color, amount: f32) -> Color {
    if a.a < b.a * amount {
        a.with_alpha(a.a * amount)
    } else {
        b
    }
}

fn alpha_darken(a: Color, b: Color, amount: f32) -> Color {
    if a.a * amount > b.a {
        a.with_alpha(a.a * amount)
    } else {
        b
    }
}

fn screen(mut a: Color, b: Color, mut amount: f32) -> Color {
    if amount < 0.0 {
        a = a.inverse();
        amount = -amount;
    }
    a.r = 1.0 - (1.0 - a.r) * (1.0 - b.r);
    a.g = 1.0 - (1.0 - a.g) * (1.0 - b.g);
    a.b = 1.0 - (1.0 - a.b) * (1.0 - b.b);
    onto(a, b, amount)
}

fn overlay(mut a: Color, b: Color, mut amount: f32) -> Color {
    if amount < 0.0 {
        a = a.inverse();
        amount = -amount;
    }
    let channel = |a: f32, b: f32| {
        let rm = b * a;
        let rs = 1.0 - (1.0 - a) * (1.0 - b);
        a * rs + (1.0 - a) * rm
    };
    a.r = channel(a.r, b.r);
    a.g = channel(a.g, b.g);
    a.b = channel(a.b, b.b);
    onto(a, b, amount)
}

fn hard_light(mut a: Color, b: Color, mut amount: f32) -> Color {
    if amount < 0.0 {
        a = a.inverse();
        amount = -amount;
    }
    let channel = |a: f32, b: f32| {
        if a > 0.5 {
            1.0 - (1.0 - (a * 2.0 - 1.0)) * (1.0 - b)
        } else {
            b * (a * 2.0)
        }
    };
    a.r = channel(a.r, b.r);
    a.g = channel(a.g, b.g);
    a.b = channel(a.b, b.b);
    onto(a, b, amount)
}

fn alpha_over(a: Color, b: Color, amount: f32) -> Color {
    let rm = b.with_alpha((1.0 - a.a) * b.a);
    straight(rm, b, amount)
}

fn add_composite(a: Color, mut b: Color, amount: f32) -> Color {
    let mut ba = b.a;
    let mut aa = a.a * amount;
    let alpha = (ba + aa).clamp(0.0, 1.0);
    let k = if alpha.abs() > 1e-8 { 1.0 / alpha } else { 0.0 };
    aa *= k;
    ba *= k;
    b.r = b.r * ba + a.r * aa;
    b.g = b.g * ba + a.g * aa;
    b.b = b.b * ba + a.b * aa;
    b.a = alpha;
    b
}

/// Rewrites blend settings saved by canvases older than version `0.3`.
///
/// Old files used STRAIGHT for layers that never read what is below them, which renders
/// the same as COMPOSITE. Such a layer with a fully transparent color punched a hole into
/// the layers below, which is ALPHA_OVER with an opaque color.
pub fn migrate_legacy_blend(
    version: &str,
    method: BlendMethod,
    color: Option<Color>,
    reads_context: bool,
) -> (BlendMethod, Option<Color>) {
    let legacy = matches!(version.trim(), "0.1" | "0.2");
    if !legacy || method != BlendMethod::Straight || reads_context {
        return (method, color);
    }
    match color {
        Some(c) if c.a <= COLOR_EPSILON => (BlendMethod::AlphaOver, Some(c.with_alpha(1.0))),
        _ => (BlendMethod::Composite, color),
    }
}
