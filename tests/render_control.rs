use std::sync::Arc;

use strata::layer::PasteCanvas;
use strata::layers::{Blur, Halftone, RadialBlur, Region, SolidColor, Twirl};
use strata::rendering::PROGRESS_SCALE;
use strata::rendering::task::BlurType;
use strata::{
    Affine, BackendRegistry, CancelFlag, Canvas, Color, Context, ContextParams, LayerHandle,
    Point, RendDesc, RenderOpts, Renderer, StrataError, Surface, Vec2,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn digest(surface: &Surface) -> u64 {
    surface.data().iter().fold(0x9E37_79B9_7F4A_7C15u64, |state, c| {
        let v = [c.r, c.g, c.b, c.a]
            .iter()
            .fold(0u64, |acc, x| acc.rotate_left(16) ^ u64::from(x.to_bits()));
        mix64(state ^ v)
    })
}

fn busy_scene() -> Context {
    let mut twirl = Twirl::default();
    twirl.twirl.rotations = 1.5;
    let layers: Vec<LayerHandle> = vec![
        Arc::new(twirl),
        Arc::new(Halftone::default()),
        Arc::new(Blur::new(Vec2::new(0.2, 0.2), BlurType::FastGaussian)),
        Arc::new(RadialBlur::new(Point::new(0.5, 0.0), 0.3, true)),
        Arc::new(Region::rectangle(
            Point::new(-0.6, -0.4),
            Point::new(0.8, 0.7),
            Color::red(),
        )),
        Arc::new(Region::default()),
        Arc::new(SolidColor::new(Color::blue().with_alpha(0.5))),
    ];
    Context::new(&layers, ContextParams::default(), 0)
}

fn desc() -> RendDesc {
    RendDesc::new(24, 16, Point::new(-1.5, 1.0), Point::new(1.5, -1.0))
}

#[test]
fn parallel_render_matches_sequential() {
    init_tracing();
    let ctx = busy_scene();

    let mut seq = Surface::new(0, 0);
    ctx.accelerated_render(&mut seq, 3, &desc(), None).unwrap();

    let parallel = Renderer::new(
        BackendRegistry::with_software(),
        RenderOpts {
            parallel: true,
            threads: Some(4),
            ..RenderOpts::default()
        },
    );
    let mut par = Surface::new(0, 0);
    ctx.accelerated_render_with(&parallel, &mut par, 3, &desc(), None)
        .unwrap();

    assert_eq!(digest(&seq), digest(&par));
    assert!(seq.data().iter().any(|c| c.a > 0.0));
    assert!(seq.data().iter().all(|c| c.is_valid()));
}

#[test]
fn progress_reaches_the_full_scale() {
    let ctx = busy_scene();
    let mut last = (0, 0);
    let mut calls = 0;
    let mut record = |done: u64, total: u64| {
        assert!(done >= last.0);
        last = (done, total);
        calls += 1;
        true
    };
    let mut out = Surface::new(0, 0);
    ctx.accelerated_render(&mut out, 3, &desc(), Some(&mut record))
        .unwrap();
    assert!(calls > 1);
    assert_eq!(last, (PROGRESS_SCALE, PROGRESS_SCALE));
}

#[test]
fn cancelled_render_reports_cancellation() {
    init_tracing();
    let ctx = busy_scene();
    let mut flag = CancelFlag::new();
    flag.cancel();
    let mut out = Surface::new(0, 0);
    let err = ctx
        .accelerated_render(&mut out, 3, &desc(), Some(&mut flag))
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn degenerate_targets_render_nothing() {
    let ctx = busy_scene();
    let mut out = Surface::filled(2, 2, Color::red());

    ctx.accelerated_render(&mut out, 3, &RendDesc::new(0, 5, Point::ZERO, Point::new(1.0, 1.0)), None)
        .unwrap();
    assert!(out.is_empty());

    let flat = RendDesc::new(4, 4, Point::ZERO, Point::new(1.0, 0.0));
    ctx.accelerated_render(&mut out, 3, &flat, None).unwrap();
    assert!(out.data().iter().all(|c| *c == Color::alpha()));

    let broken = desc().with_transformation(Affine::new([f64::NAN, 0.0, 0.0, 1.0, 0.0, 0.0]));
    let err = ctx.accelerated_render(&mut out, 3, &broken, None).unwrap_err();
    assert!(matches!(err, StrataError::Validation(_)));
}

#[test]
fn twirl_centered_on_a_pixel_stays_finite() {
    let mut twirl = Twirl::default();
    twirl.twirl.rotations = 3.0;
    let layers: Vec<LayerHandle> = vec![Arc::new(twirl), Arc::new(Region::default())];
    let ctx = Context::new(&layers, ContextParams::default(), 0);

    assert!(ctx.get_color(Point::ZERO).is_valid());
    let mut out = Surface::new(0, 0);
    let one = RendDesc::new(1, 1, Point::new(-0.5, 0.5), Point::new(0.5, -0.5));
    ctx.accelerated_render(&mut out, 3, &one, None).unwrap();
    assert!(out.get(0, 0).is_valid());
}

#[test]
fn self_referencing_canvas_renders_and_terminates() {
    let canvas = Arc::new(Canvas::new());
    canvas.push_back(Arc::new(PasteCanvas::new(Arc::clone(&canvas))));
    canvas.push_back(Arc::new(SolidColor::new(Color::red())));

    let ctx = canvas.context(ContextParams::default());
    let mut out = Surface::new(0, 0);
    let d = RendDesc::new(4, 4, Point::new(-1.0, 1.0), Point::new(1.0, -1.0));
    ctx.accelerated_render(&mut out, 8, &d, None).unwrap();
    for c in out.data() {
        assert!((c.r - 1.0).abs() < 1e-4 && (c.a - 1.0).abs() < 1e-4, "{c:?}");
    }
}
