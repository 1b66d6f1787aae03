//! CPU executors for every task kind.

mod blend;
mod blur;
mod contour;
mod layer;
mod pixel;
mod resample;

use super::{BackendKind, BackendRegistry, ExecContext};
use crate::foundation::core::Point;
use crate::foundation::error::{StrataError, StrataResult};
use crate::rendering::task::Token;
use crate::surface::Surface;

pub(crate) fn register(registry: &mut BackendRegistry) {
    let sw = BackendKind::Software;
    registry
        .register(Token::Blend, sw, blend::run_blend)
        .register(Token::TransformationAffine, sw, resample::run_transformation)
        .register(Token::Distort, sw, resample::run_distort)
        .register(Token::Mesh, sw, resample::run_mesh)
        .register(Token::Surface, sw, resample::run_surface)
        .register(Token::Blur, sw, blur::run_blur)
        .register(Token::RadialBlur, sw, blur::run_radial_blur)
        .register(Token::PixelProcessor, sw, pixel::run_pixel_processor)
        .register(Token::Shade, sw, pixel::run_shade)
        .register(Token::Contour, sw, contour::run_contour)
        .register(Token::Layer, sw, layer::run_layer)
        .register(Token::SurfaceEmpty, sw, layer::run_empty);
}

fn kind_mismatch(cx: &ExecContext<'_>, expected: Token) -> StrataError {
    StrataError::render(format!(
        "task {} is '{}', executor expects '{}'",
        cx.id.0,
        cx.task.token().name(),
        expected.name()
    ))
}

fn check_output(cx: &ExecContext<'_>, out: &Surface) -> StrataResult<()> {
    let size = cx.task.target_size;
    if i64::from(out.width()) != i64::from(size.x) || i64::from(out.height()) != i64::from(size.y)
    {
        return Err(StrataError::render(format!(
            "task {} output is {}x{}, expected {}x{}",
            cx.id.0,
            out.width(),
            out.height(),
            size.x,
            size.y
        )));
    }
    Ok(())
}

/// Fills `out` from the world position of every pixel center.
fn fill_by_position(cx: &ExecContext<'_>, out: &mut Surface, f: impl Fn(Point) -> crate::color::Color) {
    for y in 0..out.height() {
        for x in 0..out.width() {
            let c = f(cx.task.pixel_center(x, y));
            out.set(x, y, c.sanitized());
        }
    }
}
