use std::sync::Arc;

use strata::layer::PasteCanvas;
use strata::layer::param::Param;
use strata::layers::{
    Checkerboard, MotionBlur, Outline, PULL_QUALITY, Region, Rotate, SolidColor, Stretch,
    Subsampling, Translate,
};
use strata::rendering::task::{self, PixelOp, TaskBlend, TaskKind, TaskPixelProcessor};
use strata::{
    BlendMethod, Canvas, Color, ColorMatrix, Context, ContextParams, LayerHandle, Point, Rect,
    RendDesc, Renderer, Surface, TaskGraph, TaskId, Vec2, VectorInt,
};

fn close(a: Color, b: Color, eps: f32) -> bool {
    (a.r - b.r).abs() <= eps
        && (a.g - b.g).abs() <= eps
        && (a.b - b.b).abs() <= eps
        && (a.a - b.a).abs() <= eps
}

fn stack(layers: Vec<LayerHandle>) -> Context {
    Context::new(&layers, ContextParams::default(), 0)
}

fn render(ctx: &Context, desc: &RendDesc) -> Surface {
    let mut out = Surface::new(0, 0);
    ctx.accelerated_render(&mut out, 3, desc, None).unwrap();
    out
}

#[test]
fn translated_solid_color_is_red_everywhere() {
    let ctx = stack(vec![
        Arc::new(Translate::new(Point::new(1.0, 0.0))),
        Arc::new(SolidColor::new(Color::red())),
    ]);
    assert_eq!(ctx.get_color(Point::new(0.5, 0.5)), Color::red());

    let desc = RendDesc::new(2, 2, Point::new(-1.0, -1.0), Point::new(1.0, 1.0));
    let out = render(&ctx, &desc);
    assert_eq!((out.width(), out.height()), (2, 2));
    for y in 0..2 {
        for x in 0..2 {
            assert!(close(out.get(x, y), Color::red(), 1e-5), "({x}, {y}) = {:?}", out.get(x, y));
        }
    }
}

#[test]
fn pull_is_bit_identical_across_calls() {
    let ctx = stack(vec![
        Arc::new(Rotate::new(Point::new(0.2, -0.1), 33.0)),
        Arc::new(Region::default()),
        Arc::new(SolidColor::new(Color::blue().with_alpha(0.5))),
    ]);
    for p in [Point::new(0.3, 0.1), Point::new(-0.95, 0.2), Point::new(4.0, 4.0)] {
        let a = ctx.get_color(p);
        let b = ctx.get_color(p);
        assert_eq!(
            [a.r.to_bits(), a.g.to_bits(), a.b.to_bits(), a.a.to_bits()],
            [b.r.to_bits(), b.g.to_bits(), b.b.to_bits(), b.a.to_bits()]
        );
    }
}

#[test]
fn one_pixel_render_matches_pull_through_affine_layers() {
    let square = Region::rectangle(Point::new(-1.0, -1.0), Point::new(1.0, 1.0), Color::red());
    let mut stretch = Stretch::default();
    stretch.amount = Vec2::new(2.0, 0.5);
    let ctx = stack(vec![
        Arc::new(Translate::new(Point::new(0.25, 0.0))),
        Arc::new(Rotate::new(Point::ZERO, 30.0)),
        Arc::new(stretch),
        Arc::new(square),
        Arc::new(SolidColor::new(Color::green())),
    ]);

    for center in [Point::new(0.3, 0.1), Point::new(3.0, 0.0), Point::new(-0.2, -0.2)] {
        let half = Vec2::new(0.005, 0.005);
        let desc = RendDesc::new(1, 1, center - half, center + half);
        let pushed = render(&ctx, &desc).get(0, 0);
        let pulled = ctx.get_color(center);
        assert!(close(pushed, pulled, 1e-3), "{center:?}: {pushed:?} vs {pulled:?}");
    }
}

fn pixel_center(desc: &RendDesc, x: u32, y: u32) -> Point {
    let pw = (desc.br.x - desc.tl.x) / f64::from(desc.w);
    let ph = (desc.br.y - desc.tl.y) / f64::from(desc.h);
    Point::new(
        desc.tl.x + (f64::from(x) + 0.5) * pw,
        desc.tl.y + (f64::from(y) + 0.5) * ph,
    )
}

fn assert_render_matches_pull(ctx: &Context, desc: &RendDesc, quality: i32, eps: f32) {
    let mut out = Surface::new(0, 0);
    ctx.accelerated_render(&mut out, quality, desc, None).unwrap();
    for y in 0..desc.h {
        for x in 0..desc.w {
            let p = pixel_center(desc, x, y);
            let (pushed, pulled) = (out.get(x as i32, y as i32), ctx.get_color(p));
            assert!(close(pushed, pulled, eps), "{p:?}: {pushed:?} vs {pulled:?}");
        }
    }
}

#[test]
fn checkerboard_render_matches_pull() {
    let board = Checkerboard::new(task::Checkerboard {
        color: Color::red(),
        origin: Point::ZERO,
        size: Vec2::new(0.25, 0.25),
    });
    let ctx = stack(vec![Arc::new(board), Arc::new(SolidColor::new(Color::blue()))]);
    let desc = RendDesc::new(8, 8, Point::new(-1.0, 1.0), Point::new(1.0, -1.0));
    assert_render_matches_pull(&ctx, &desc, 3, 1e-5);
    assert_eq!(ctx.get_color(Point::new(0.125, 0.125)), Color::blue());
    assert_eq!(ctx.get_color(Point::new(0.375, 0.125)), Color::red());
}

#[test]
fn motion_blur_render_matches_pull() {
    let mut fading = SolidColor::new(Color::black());
    fading.color = Param::linked(|p| Color::new(p.time as f32, 0.0, 0.0, 1.0));
    let mut blur = MotionBlur::new(1.0);
    blur.subsampling = Subsampling::Constant;
    let layers: Vec<LayerHandle> = vec![Arc::new(blur), Arc::new(fading)];
    let ctx = Context::new(&layers, ContextParams::at_time(1.0), 0);

    let mean = ctx.get_color(Point::ZERO);
    assert!((mean.r - 0.5).abs() < 1e-5, "{mean:?}");
    let desc = RendDesc::new(2, 2, Point::new(-1.0, 1.0), Point::new(1.0, -1.0));
    assert_render_matches_pull(&ctx, &desc, PULL_QUALITY, 1e-4);
}

#[test]
fn group_outline_grow_widens_nested_outlines() {
    let inner = Arc::new(Canvas::new());
    inner.push_back(Arc::new(Outline::polyline(
        [Point::new(-1.0, 0.0), Point::new(1.0, 0.0)],
        0.2,
        Color::red(),
    )));
    let plain = stack(vec![Arc::new(PasteCanvas::new(Arc::clone(&inner)))]);
    let mut grown = PasteCanvas::new(inner);
    grown.outline_grow = 2f64.ln();
    let grown = stack(vec![Arc::new(grown)]);

    let edge = Point::new(0.0, 0.15);
    assert_eq!(plain.get_color(edge).a, 0.0);
    assert!(close(grown.get_color(edge), Color::red(), 1e-5));

    let half = Vec2::new(0.005, 0.005);
    let desc = RendDesc::new(1, 1, edge - half, edge + half);
    let pushed = render(&grown, &desc).get(0, 0);
    assert!(close(pushed, Color::red(), 1e-3), "{pushed:?}");
    assert!(render(&plain, &desc).get(0, 0).a < 1e-3);
}

fn constant(g: &mut TaskGraph, c: Color) -> TaskId {
    g.add(
        TaskKind::PixelProcessor(TaskPixelProcessor::new(PixelOp::ColorMatrix(
            ColorMatrix::constant(c),
        ))),
        &[None],
    )
}

fn run_blend(method: BlendMethod, amount: f32) -> (Surface, Surface, Surface) {
    let below = Color::new(0.8, 0.3, 0.1, 1.0);
    let own = Color::new(0.1, 0.4, 0.9, 0.5);
    let rect = Rect::new(0.0, 0.0, 2.0, 2.0);
    let size = VectorInt::new(2, 2);
    let renderer = Renderer::software();

    let mut g = TaskGraph::new();
    let a = constant(&mut g, below);
    let b = constant(&mut g, own);
    let top = g.add(
        TaskKind::Blend(TaskBlend::new(method, amount)),
        &[Some(a), Some(b)],
    );
    g.set_coords(top, rect, size);
    let blended = renderer.run(&g, Some(top), None).unwrap().unwrap();

    let single = |c: Color| {
        let mut g = TaskGraph::new();
        let id = constant(&mut g, c);
        g.set_coords(id, rect, size);
        renderer.run(&g, Some(id), None).unwrap().unwrap()
    };
    (blended, single(below), single(own))
}

#[test]
fn zero_amount_blend_keeps_what_is_below() {
    for method in BlendMethod::ALL {
        let (blended, below, _) = run_blend(method, 0.0);
        for (got, want) in blended.data().iter().zip(below.data()) {
            assert!(close(*got, *want, 1e-5), "{method:?}: {got:?} vs {want:?}");
        }
    }
}

#[test]
fn full_straight_blend_replaces_with_own() {
    let (blended, _, own) = run_blend(BlendMethod::Straight, 1.0);
    for (got, want) in blended.data().iter().zip(own.data()) {
        assert!(close(*got, *want, 1e-5), "{got:?} vs {want:?}");
    }
}
