use kurbo::PathEl;

use super::{check_output, kind_mismatch};
use crate::foundation::core::{Affine, BezPath, Point};
use crate::foundation::error::{StrataError, StrataResult};
use crate::rendering::backend::ExecContext;
use crate::rendering::task::{TaskKind, Token, WindingStyle};
use crate::surface::Surface;

/// Scan-converts the contour into a coverage mask, then tints it with the contour color.
pub(super) fn run_contour(cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
    let TaskKind::Contour(t) = &cx.task.kind else {
        return Err(kind_mismatch(cx, Token::Contour));
    };
    check_output(cx, out)?;

    let width: u16 = out
        .width()
        .try_into()
        .map_err(|_| StrataError::render("contour surface width exceeds u16"))?;
    let height: u16 = out
        .height()
        .try_into()
        .map_err(|_| StrataError::render("contour surface height exceeds u16"))?;

    let mut pixmap = vello_cpu::Pixmap::new(width, height);
    if !t.path.elements().is_empty() {
        let px = cx.task.pixel_size();
        let r = cx.task.source_rect;
        let world_to_pixel = Affine::new([
            1.0 / px.x,
            0.0,
            0.0,
            1.0 / px.y,
            -r.x0 / px.x,
            -r.y0 / px.y,
        ]);

        let mut ctx = vello_cpu::RenderContext::new(width, height);
        ctx.set_fill_rule(match t.winding {
            WindingStyle::NonZero => vello_cpu::peniko::Fill::NonZero,
            WindingStyle::EvenOdd => vello_cpu::peniko::Fill::EvenOdd,
        });
        ctx.set_transform(affine_to_cpu(world_to_pixel * t.transform));
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
        ctx.fill_path(&bezpath_to_cpu(&t.path));
        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);
    }

    let data = pixmap.data_as_u8_slice();
    for y in 0..out.height() {
        for x in 0..out.width() {
            let i = (y as usize * out.width() as usize + x as usize) * 4;
            let coverage = f32::from(data[i + 3]) / 255.0;
            out.set(x, y, t.color_at(coverage).sanitized());
        }
    }
    Ok(())
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::color::Color;
    use crate::foundation::core::{Rect, VectorInt};
    use crate::rendering::backend::BackendRegistry;
    use crate::rendering::renderer::{RenderOpts, Renderer};
    use crate::rendering::task::{TaskContour, TaskGraph, TaskKind};

    fn square() -> TaskContour {
        let mut c = TaskContour::default();
        c.color = Color::red();
        c.move_to((1.0, 1.0).into())
            .line_to((3.0, 1.0).into())
            .line_to((3.0, 3.0).into())
            .line_to((1.0, 3.0).into())
            .close();
        c
    }

    fn render(contour: TaskContour) -> crate::surface::Surface {
        let mut g = TaskGraph::new();
        let id = g.add_leaf(TaskKind::Contour(contour));
        g.set_coords(id, Rect::new(0.0, 0.0, 4.0, 4.0), VectorInt::new(4, 4));
        let renderer = Renderer::new(BackendRegistry::with_software(), RenderOpts::default());
        renderer.run(&g, Some(id), None).unwrap().unwrap()
    }

    #[test]
    fn pixel_aligned_square_fills_exactly() {
        let out = render(square());
        for y in 0..4 {
            for x in 0..4 {
                let inside = (1..3).contains(&x) && (1..3).contains(&y);
                let c = out.get(x, y);
                if inside {
                    assert!(c.a > 0.99, "({x},{y}) = {c:?}");
                    assert!((c.r - 1.0).abs() < 0.01);
                } else {
                    assert!(c.a < 0.01, "({x},{y}) = {c:?}");
                }
            }
        }
    }

    #[test]
    fn inverted_square_fills_outside() {
        let mut c = square();
        c.invert = true;
        let out = render(c);
        assert!(out.get(0, 0).a > 0.99);
        assert!(out.get(1, 1).a < 0.01);
    }
}
