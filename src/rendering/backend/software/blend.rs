use super::{check_output, kind_mismatch};
use crate::color::Color;
use crate::foundation::error::StrataResult;
use crate::rendering::backend::ExecContext;
use crate::rendering::task::{TaskKind, Token};
use crate::surface::Surface;

pub(super) fn run_blend(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    let TaskKind::Blend(blend) = &cx.task.kind else {
        return Err(kind_mismatch(cx, Token::Blend));
    };
    check_output(cx, out)?;
    for y in 0..out.height() {
        for x in 0..out.width() {
            let (xi, yi) = (x as i32, y as i32);
            let a = cx.sub_pixel(0, xi, yi);
            let b = cx.sub_pixel(1, xi, yi);
            out.set(x, y, Color::blend(b, a, blend.amount, blend.method).sanitized());
        }
    }
    Ok(())
}
