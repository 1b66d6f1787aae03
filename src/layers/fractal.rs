//! Escape-time fractals that shade or displace the context.

use std::f64::consts::LN_2;

use crate::color::{BlendMethod, Color, Gradient};
use crate::context::Context;
use crate::foundation::core::{FULL_PLANE, Point, Rect, Vec2};
use crate::layer::param::{ParamDesc, ParamTable, Value};
use crate::layer::{Layer, LayerBase};
use crate::{layer_common, param};

pub const MAX_ITERATIONS: i32 = 500_000;

/// How points inside or outside the set are colored.
#[derive(Clone, Debug, PartialEq)]
pub struct Shading {
    /// Sample the context at `pos + z` instead of `pos`.
    pub distort: bool,
    /// Blend the gradient over the sampled color.
    pub shade: bool,
    /// Use the gradient alone.
    pub solid: bool,
    pub invert: bool,
    pub gradient: Gradient,
    pub offset: f64,
}

impl Default for Shading {
    fn default() -> Self {
        Self {
            distort: true,
            shade: true,
            solid: false,
            invert: false,
            gradient: Gradient::new(Color::alpha(), Color::black()),
            offset: 0.0,
        }
    }
}

impl Shading {
    fn color(&self, context: &Context, pos: Point, z: Vec2, amount: f64) -> Color {
        if self.solid {
            return self.gradient.at(amount);
        }
        let mut ret = if self.distort {
            context.get_color(pos + z)
        } else {
            context.get_color(pos)
        };
        if self.invert {
            ret = ret.inverse();
        }
        if self.shade {
            ret = Color::blend(self.gradient.at(amount), ret, 1.0, BlendMethod::Composite);
        }
        ret
    }
}

/// Iteration and coloring parameters shared by [`Mandelbrot`] and [`Julia`].
#[derive(Clone, Debug, PartialEq)]
pub struct Escape {
    pub iterations: i32,
    /// Escape radius; magnitudes are compared against its square.
    pub bailout: f64,
    /// Adds the imaginary part into the real one each step.
    pub broken: bool,
    pub inside: Shading,
    /// Wrap the inside gradient position into `[0, 1)`.
    pub loop_inside: bool,
    pub outside: Shading,
    /// Fractional escape count instead of whole iterations.
    pub smooth_outside: bool,
    pub scale_outside: f64,
}

impl Default for Escape {
    fn default() -> Self {
        Self {
            iterations: 32,
            bailout: 2.0,
            broken: false,
            inside: Shading::default(),
            loop_inside: true,
            outside: Shading::default(),
            smooth_outside: true,
            scale_outside: 1.0,
        }
    }
}

impl Escape {
    /// Iterates `z -> z^2 + c` from `z0` and colors `pos` by the outcome.
    pub fn color(&self, context: &Context, pos: Point, z0: Vec2, c: Vec2) -> Color {
        let iterations = self.iterations.clamp(0, MAX_ITERATIONS);
        let bailout = self.bailout * self.bailout;
        let lp = bailout.ln().ln();
        let (mut zr, mut zi) = (z0.x, z0.y);
        let mut mag = zr * zr + zi * zi;
        for i in 0..iterations {
            let hold = zr;
            zr = zr * zr - zi * zi + c.x;
            if self.broken {
                zr += zi;
            }
            zi = hold * zi * 2.0 + c.y;
            mag = zr * zr + zi * zi;
            if mag > bailout {
                let depth = if self.smooth_outside {
                    (f64::from(i) + LN_2 * lp - mag.sqrt().ln().ln() / LN_2).max(0.0)
                } else {
                    f64::from(i)
                };
                let amount = depth / f64::from(iterations) * self.scale_outside + self.outside.offset;
                let amount = amount - amount.floor();
                return self.outside.color(context, pos, Vec2::new(zr, zi), amount);
            }
        }
        let mut amount = (mag + self.inside.offset).abs();
        if self.loop_inside {
            amount -= amount.floor();
        }
        self.inside.color(context, pos, Vec2::new(zr, zi), amount)
    }
}

/// Parameter table entries for an [`Escape`] stored in field `escape`.
macro_rules! escape_params {
    ($($extra:expr),* $(,)?) => {
        &[
            $($extra,)*
            ParamDesc {
                name: "iterations",
                get: |l| Value::Integer(l.escape.iterations),
                set: |l, v| {
                    l.escape.iterations = i32::try_from(v)?.clamp(0, MAX_ITERATIONS);
                    Ok(())
                },
            },
            param!("bailout", escape.bailout),
            param!("broken", escape.broken),
            param!("distort_inside", escape.inside.distort),
            param!("shade_inside", escape.inside.shade),
            param!("solid_inside", escape.inside.solid),
            param!("invert_inside", escape.inside.invert),
            param!("gradient_inside", escape.inside.gradient),
            param!("gradient_offset_inside", escape.inside.offset),
            param!("gradient_loop_inside", escape.loop_inside),
            param!("distort_outside", escape.outside.distort),
            param!("shade_outside", escape.outside.shade),
            param!("solid_outside", escape.outside.solid),
            param!("invert_outside", escape.outside.invert),
            param!("gradient_outside", escape.outside.gradient),
            param!("gradient_offset_outside", escape.outside.offset),
            param!("smooth_outside", escape.smooth_outside),
            param!("gradient_scale_outside", escape.scale_outside),
        ]
    };
}

/// The Mandelbrot set: `c` is the position, `z` starts at zero.
#[derive(Clone, Debug, Default)]
pub struct Mandelbrot {
    base: LayerBase,
    pub escape: Escape,
}

impl ParamTable for Mandelbrot {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Mandelbrot>] = escape_params!();
        TABLE
    }
}

impl Layer for Mandelbrot {
    layer_common!("mandelbrot");

    fn reads_context(&self) -> bool {
        true
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        self.escape.color(context, pos, Vec2::ZERO, pos.to_vec2())
    }

    fn get_full_bounding_rect(&self, _context: &Context) -> Rect {
        FULL_PLANE
    }
}

/// A Julia set: `z` starts at the position, `c` is the fixed `seed`.
#[derive(Clone, Debug, Default)]
pub struct Julia {
    base: LayerBase,
    pub seed: Vec2,
    pub escape: Escape,
}

impl ParamTable for Julia {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Julia>] = escape_params!(param!("seed", seed));
        TABLE
    }
}

impl Layer for Julia {
    layer_common!("julia");

    fn reads_context(&self) -> bool {
        true
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        self.escape.color(context, pos, pos.to_vec2(), self.seed)
    }

    fn get_full_bounding_rect(&self, _context: &Context) -> Rect {
        FULL_PLANE
    }
}
