use super::{check_output, kind_mismatch};
use crate::foundation::error::StrataResult;
use crate::rendering::backend::ExecContext;
use crate::rendering::task::{TaskKind, Token};
use crate::surface::Surface;

pub(super) fn run_pixel_processor(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    let TaskKind::PixelProcessor(t) = &cx.task.kind else {
        return Err(kind_mismatch(cx, Token::PixelProcessor));
    };
    check_output(cx, out)?;
    if t.op.is_transparent() {
        return Ok(());
    }
    let pixel = cx.task.pixel_size().x.abs();
    for y in 0..out.height() {
        for x in 0..out.width() {
            let c = cx.sub_pixel(0, x as i32, y as i32);
            let pos = cx.task.pixel_center(x, y);
            out.set(x, y, t.op.apply(c, pos, pixel).sanitized());
        }
    }
    Ok(())
}

pub(super) fn run_shade(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    let TaskKind::Shade(t) = &cx.task.kind else {
        return Err(kind_mismatch(cx, Token::Shade));
    };
    check_output(cx, out)?;
    for y in 0..out.height() {
        for x in 0..out.width() {
            let hi = t.matte(cx.sub_pixel(0, x as i32, y as i32));
            let lo = t.matte(cx.sub_pixel(1, x as i32, y as i32));
            out.set(x, y, t.shade(hi, lo).sanitized());
        }
    }
    Ok(())
}
