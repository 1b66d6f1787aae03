use super::{check_output, fill_by_position, kind_mismatch};
use crate::foundation::error::StrataResult;
use crate::rendering::backend::ExecContext;
use crate::rendering::task::{TaskKind, Token};
use crate::surface::Surface;

/// Pull-path fallback: evaluates the layer context at every pixel center.
pub(super) fn run_layer(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    let TaskKind::Layer(t) = &cx.task.kind else {
        return Err(kind_mismatch(cx, Token::Layer));
    };
    check_output(cx, out)?;
    fill_by_position(cx, out, |p| t.context.get_color(p));
    Ok(())
}

/// Output is already transparent.
pub(super) fn run_empty(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    check_output(cx, out)
}
