use super::{check_output, kind_mismatch};
use crate::color::Color;
use crate::foundation::error::StrataResult;
use crate::foundation::math::round_to_int;
use crate::rendering::backend::ExecContext;
use crate::rendering::task::{BlurType, TaskKind, Token};
use crate::surface::Surface;

/// Premultiplied working buffer.
struct Plane {
    w: usize,
    h: usize,
    data: Vec<Color>,
}

impl Plane {
    fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![Color::alpha(); w * h],
        }
    }

    fn get(&self, x: isize, y: isize) -> Color {
        if x < 0 || y < 0 || x as usize >= self.w || y as usize >= self.h {
            return Color::alpha();
        }
        self.data[y as usize * self.w + x as usize]
    }

    fn convolve(&self, kernel: &[f32], horizontal: bool) -> Plane {
        let r = (kernel.len() / 2) as isize;
        let mut out = Plane::new(self.w, self.h);
        for y in 0..self.h as isize {
            for x in 0..self.w as isize {
                let mut acc = Color::alpha();
                for (k, &wk) in kernel.iter().enumerate() {
                    let d = k as isize - r;
                    let c = if horizontal {
                        self.get(x + d, y)
                    } else {
                        self.get(x, y + d)
                    };
                    acc += c * wk;
                }
                out.data[y as usize * self.w + x as usize] = acc;
            }
        }
        out
    }

    fn separable(&self, kx: &[f32], ky: &[f32]) -> Plane {
        self.convolve(kx, true).convolve(ky, false)
    }
}

/// Box of half-width `r` pixels with fractional edge taps, normalized.
fn box_kernel(r: f64) -> Vec<f32> {
    let s = 0.5 + r.abs();
    let n = (s - 1e-10).floor().max(0.0) as isize;
    let mut k: Vec<f32> = (-n..=n)
        .map(|i| (s - (i.abs() as f64 - 0.5)).clamp(0.0, 1.0) as f32)
        .collect();
    normalize(&mut k);
    k
}

/// Gaussian with deviation `sigma` pixels truncated at `support` pixels, normalized.
fn gauss_kernel(sigma: f64, support: f64) -> Vec<f32> {
    if sigma < 1e-6 {
        return vec![1.0];
    }
    let n = support.ceil().max(1.0) as isize;
    let mut k: Vec<f32> = (-n..=n)
        .map(|i| {
            let x = i as f64;
            (-0.5 * x * x / (sigma * sigma)).exp() as f32
        })
        .collect();
    normalize(&mut k);
    k
}

fn normalize(k: &mut [f32]) {
    let sum: f32 = k.iter().sum();
    if sum > 0.0 {
        k.iter_mut().for_each(|v| *v /= sum);
    }
}

fn disc(plane: &Plane, rx: f64, ry: f64) -> Plane {
    let nx = rx.ceil() as isize;
    let ny = ry.ceil() as isize;
    let mut taps = Vec::new();
    for j in -ny..=ny {
        for i in -nx..=nx {
            let u = if rx > 0.0 { i as f64 / rx } else { 0.0 };
            let v = if ry > 0.0 { j as f64 / ry } else { 0.0 };
            if u * u + v * v <= 1.0 + 1e-9 {
                taps.push((i, j));
            }
        }
    }
    let k = 1.0 / taps.len().max(1) as f32;
    let mut out = Plane::new(plane.w, plane.h);
    for y in 0..plane.h as isize {
        for x in 0..plane.w as isize {
            let mut acc = Color::alpha();
            for &(i, j) in &taps {
                acc += plane.get(x + i, y + j);
            }
            out.data[y as usize * plane.w + x as usize] = acc * k;
        }
    }
    out
}

pub(super) fn run_blur(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    let TaskKind::Blur(t) = &cx.task.kind else {
        return Err(kind_mismatch(cx, Token::Blur));
    };
    check_output(cx, out)?;
    let Some(sub) = cx.sub(0) else {
        return Ok(());
    };

    let (mx, my) = t.blur.pixel_margin(cx.task.pixel_size());
    let (mx, my) = (mx.max(0) as usize, my.max(0) as usize);
    let (w, h) = (out.width() as usize, out.height() as usize);
    let mut plane = Plane::new(w + 2 * mx, h + 2 * my);
    let off = sub.task.offset_in(cx.task);
    for y in 0..plane.h {
        for x in 0..plane.w {
            let sx = x as i32 - mx as i32 - off.x;
            let sy = y as i32 - my as i32 - off.y;
            plane.data[y * plane.w + x] = sub.surface.get(sx, sy).premult_alpha();
        }
    }

    let r = t.blur.radius_px(cx.task.pixel_size());
    let blurred = match t.blur.kind {
        BlurType::Box => plane.separable(&box_kernel(r.x), &box_kernel(r.y)),
        BlurType::FastGaussian => {
            let (kx, ky) = (box_kernel(r.x / 3f64.sqrt()), box_kernel(r.y / 3f64.sqrt()));
            plane
                .separable(&kx, &ky)
                .separable(&kx, &ky)
                .separable(&kx, &ky)
        }
        BlurType::Cross => {
            let h = plane.convolve(&box_kernel(r.x), true);
            let v = plane.convolve(&box_kernel(r.y), false);
            let mut out = Plane::new(plane.w, plane.h);
            for (o, (a, b)) in out.data.iter_mut().zip(h.data.iter().zip(&v.data)) {
                *o = (*a + *b) * 0.5;
            }
            out
        }
        BlurType::Gaussian => {
            let e = BlurType::Gaussian.extra();
            plane.separable(&gauss_kernel(r.x, r.x * e), &gauss_kernel(r.y, r.y * e))
        }
        BlurType::Disc => disc(&plane, r.x, r.y),
    };

    for y in 0..h {
        for x in 0..w {
            let c = blurred.data[(y + my) * blurred.w + x + mx];
            out.set(x as u32, y as u32, c.demult_alpha().sanitized());
        }
    }
    Ok(())
}

pub(super) fn run_radial_blur(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    let TaskKind::RadialBlur(t) = &cx.task.kind else {
        return Err(kind_mismatch(cx, Token::RadialBlur));
    };
    check_output(cx, out)?;
    let Some(sub) = cx.sub(0) else {
        return Ok(());
    };
    let off = sub.task.offset_in(cx.task);
    let (sw, sh) = (sub.surface.width() as i32, sub.surface.height() as i32);

    for y in 0..out.height() {
        for x in 0..out.width() {
            let bx = x as i32 - off.x;
            let by = y as i32 - off.y;
            let end = sub
                .task
                .world_to_pixel(t.end_point(cx.task.pixel_center(x, y)));
            let ex = round_to_int(end.x - 0.5);
            let ey = round_to_int(end.y - 0.5);

            let mut pool = Color::alpha();
            let mut poolsize = 0.0f32;
            trace_line((bx, by), (ex, ey), |i, n, px, py| {
                if px >= 0 && py >= 0 && px < sw && py < sh {
                    let weight = t.weight(i, n);
                    pool += sub.surface.get(px, py).premult_alpha() * weight;
                    poolsize += weight;
                }
            });

            let c = if poolsize != 0.0 {
                (pool / poolsize).demult_alpha()
            } else {
                sub.surface.get(bx, by)
            };
            out.set(x, y, c.sanitized());
        }
    }
    Ok(())
}

/// Bresenham walk from `from` toward `to`, stopping before `to`. Calls
/// `visit(step, steps, x, y)` for every pixel on the way.
fn trace_line(from: (i32, i32), to: (i32, i32), mut visit: impl FnMut(i32, i32, i32, i32)) {
    let (mut x0, mut y0) = from;
    let mut dx = (to.0 - from.0).abs();
    let mut dy = (to.1 - from.1).abs();
    let mut sx = if to.0 > from.0 { 1 } else { -1 };
    let mut sy = if to.1 > from.1 { 1 } else { -1 };
    let swapped = dy > dx;
    if swapped {
        std::mem::swap(&mut x0, &mut y0);
        std::mem::swap(&mut dx, &mut dy);
        std::mem::swap(&mut sx, &mut sy);
    }
    let mut e = (dy << 1) - dx;
    for i in 0..dx {
        let (x, y) = if swapped { (y0, x0) } else { (x0, y0) };
        visit(i, dx, x, y);
        while e >= 0 {
            y0 += sy;
            e -= dx << 1;
        }
        x0 += sx;
        e += dy << 1;
    }
}
