use super::{check_output, fill_by_position, kind_mismatch};
use crate::color::Color;
use crate::foundation::core::{Point, affine_is_invertible, rect_is_finite};
use crate::foundation::error::StrataResult;
use crate::rendering::backend::{ExecContext, SubSurface};
use crate::rendering::task::{TaskKind, Token};
use crate::surface::{Interpolation, Sampler, Surface};

/// Samples a sub-task's output at a world point.
struct WorldSampler<'a> {
    sub: SubSurface<'a>,
    sampler: Sampler<'a>,
}

impl<'a> WorldSampler<'a> {
    fn new(sub: SubSurface<'a>, interpolation: Interpolation) -> Self {
        Self {
            sub,
            sampler: sub.surface.sampler(interpolation),
        }
    }

    fn covers(&self, p: Point) -> bool {
        let r = self.sub.task.source_rect;
        p.x >= r.x0 && p.x <= r.x1 && p.y >= r.y0 && p.y <= r.y1
    }

    fn sample(&self, p: Point) -> Color {
        let q = self.sub.task.world_to_pixel(p);
        self.sampler.sample(q.x, q.y)
    }
}

pub(super) fn run_transformation(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    let TaskKind::TransformationAffine(t) = &cx.task.kind else {
        return Err(kind_mismatch(cx, Token::TransformationAffine));
    };
    check_output(cx, out)?;
    let Some(sub) = cx.sub(0) else {
        return Ok(());
    };
    if !affine_is_invertible(&t.transform) {
        return Ok(());
    }
    let inv = t.transform.inverse();
    let src = WorldSampler::new(sub, t.interpolation);
    fill_by_position(cx, out, |p| src.sample(inv * p));
    Ok(())
}

pub(super) fn run_distort(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    let TaskKind::Distort(t) = &cx.task.kind else {
        return Err(kind_mismatch(cx, Token::Distort));
    };
    check_output(cx, out)?;
    let src = cx.sub(0).map(|s| WorldSampler::new(s, t.interpolation));
    fill_by_position(cx, out, |p| {
        let Some(q) = t.distortion.point(p) else {
            return Color::alpha();
        };
        match (&src, &t.fallback) {
            (Some(s), _) if s.covers(q) => s.sample(q),
            (_, Some(fallback)) => fallback.get_color(q),
            (Some(s), None) => s.sample(q),
            (None, None) => Color::alpha(),
        }
    });
    Ok(())
}

pub(super) fn run_mesh(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    let TaskKind::Mesh(mesh) = &cx.task.kind else {
        return Err(kind_mismatch(cx, Token::Mesh));
    };
    check_output(cx, out)?;
    let Some(sub) = cx.sub(0) else {
        return Ok(());
    };
    let src = WorldSampler::new(sub, mesh.interpolation);
    fill_by_position(cx, out, |p| {
        mesh.point(p).map_or(Color::alpha(), |q| src.sample(q))
    });
    Ok(())
}

pub(super) fn run_surface(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    let TaskKind::Surface(t) = &cx.task.kind else {
        return Err(kind_mismatch(cx, Token::Surface));
    };
    check_output(cx, out)?;
    if t.surface.is_empty() || !rect_is_finite(&t.rect()) {
        return Ok(());
    }
    let sampler = t.surface.sampler(t.interpolation);
    fill_by_position(cx, out, |p| {
        let (u, v) = t.pixel_coords(p);
        sampler.sample(u, v)
    });
    Ok(())
}
