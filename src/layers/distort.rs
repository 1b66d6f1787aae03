//! Layers that resample everything below them through a non-linear map.

use crate::color::Color;
use crate::context::Context;
use crate::foundation::core::{Point, Rect, Vec2};
use crate::foundation::error::{StrataError, StrataResult};
use crate::layer::param::{ParamDesc, ParamTable, Value};
use crate::layer::{Hit, Layer, LayerBase};
use crate::rendering::task::{
    self, BLinePoint, Distortion, TaskDistort, TaskGraph, TaskId, TaskKind,
};
use crate::{layer_common, param};

fn color_through(d: &Distortion, context: &Context, pos: Point) -> Color {
    d.point(pos).map_or(Color::alpha(), |p| context.get_color(p))
}

fn hit_through(d: &Distortion, context: &Context, pos: Point) -> Hit {
    d.point(pos).and_then(|p| context.hit_check(p)).into()
}

fn task_through(
    d: Distortion,
    context: &Context,
    graph: &mut TaskGraph,
    fallback: bool,
) -> Option<TaskId> {
    let sub = context.build_rendering_task(graph)?;
    let mut t = TaskDistort::new(d, graph.interpolation());
    if fallback {
        t = t.with_fallback(context.clone());
    }
    Some(graph.add(TaskKind::Distort(t), &[Some(sub)]))
}

/// Implements the pull and push hooks of a distortion layer through `$self.distortion()`.
macro_rules! distortion_layer {
    ($fallback:expr) => {
        fn get_color(&self, context: &Context, pos: Point) -> Color {
            color_through(&self.distortion(), context, pos)
        }

        fn get_full_bounding_rect(&self, context: &Context) -> Rect {
            self.distortion().bounds(context.get_full_bounding_rect())
        }

        fn hit_check(&self, context: &Context, pos: Point) -> Hit {
            hit_through(&self.distortion(), context, pos)
        }

        fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
            task_through(self.distortion(), context, graph, $fallback)
        }
    };
}

/// Swirls the context around `center`.
#[derive(Clone, Debug, Default)]
pub struct Twirl {
    base: LayerBase,
    pub twirl: task::Twirl,
}

impl ParamTable for Twirl {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Twirl>] = &[
            param!("center", twirl.center),
            param!("radius", twirl.radius),
            ParamDesc {
                name: "rotations",
                get: |l| Value::Angle(l.twirl.rotations.to_degrees()),
                set: |l, v| {
                    l.twirl.rotations = f64::try_from(v)?.to_radians();
                    Ok(())
                },
            },
            param!("distort_inside", twirl.distort_inside),
            param!("distort_outside", twirl.distort_outside),
        ];
        TABLE
    }
}

impl Twirl {
    pub fn new(twirl: task::Twirl) -> Self {
        Self {
            base: LayerBase::default(),
            twirl,
        }
    }

    fn distortion(&self) -> Distortion {
        Distortion::Twirl(self.twirl)
    }
}

impl Layer for Twirl {
    layer_common!("twirl");
    distortion_layer!(false);
}

/// Bulges or pinches the context inside a circle or band.
#[derive(Clone, Debug, Default)]
pub struct SphereDistort {
    base: LayerBase,
    pub spherize: task::Spherize,
}

impl ParamTable for SphereDistort {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<SphereDistort>] = &[
            param!("center", spherize.center),
            param!("radius", spherize.radius),
            param!("amount", spherize.amount),
            param!("type", spherize.kind),
            param!("clip", spherize.clip),
        ];
        TABLE
    }
}

impl SphereDistort {
    pub fn new(spherize: task::Spherize) -> Self {
        Self {
            base: LayerBase::default(),
            spherize,
        }
    }

    fn distortion(&self) -> Distortion {
        Distortion::Spherize(self.spherize)
    }
}

impl Layer for SphereDistort {
    layer_common!("spherize");
    distortion_layer!(false);
}

impl From<BLinePoint> for Value {
    fn from(p: BLinePoint) -> Self {
        Value::List(vec![
            Value::from(p.vertex),
            Value::Real(p.width),
            Value::Vector(p.tangent1),
            Value::Vector(p.tangent2),
            Value::Bool(p.split_tangent),
        ])
    }
}

impl TryFrom<Value> for BLinePoint {
    type Error = StrataError;
    fn try_from(v: Value) -> StrataResult<Self> {
        let Value::List(items) = v else {
            return Err(StrataError::validation("spline point must be a list"));
        };
        let Ok([vertex, width, t1, t2, split]) = <[Value; 5]>::try_from(items) else {
            return Err(StrataError::validation("spline point needs 5 entries"));
        };
        Ok(BLinePoint {
            vertex: Point::try_from(vertex)?,
            width: f64::try_from(width)?,
            tangent1: Vec2::try_from(t1)?,
            tangent2: Vec2::try_from(t2)?,
            split_tangent: bool::try_from(split)?,
        })
    }
}

/// Straightens the neighbourhood of a spline onto the segment `start_point -> end_point`.
#[derive(Clone, Debug, Default)]
pub struct CurveWarp {
    base: LayerBase,
    pub warp: task::CurveWarp,
}

impl ParamTable for CurveWarp {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<CurveWarp>] = &[
            param!("origin", warp.origin),
            param!("perp_width", warp.perp_width),
            param!("fast", warp.fast),
            ParamDesc {
                name: "start_point",
                get: |l| Value::from(l.warp.start_point),
                set: |l, v| {
                    l.warp.start_point = Point::try_from(v)?;
                    l.warp.sync();
                    Ok(())
                },
            },
            ParamDesc {
                name: "end_point",
                get: |l| Value::from(l.warp.end_point),
                set: |l, v| {
                    l.warp.end_point = Point::try_from(v)?;
                    l.warp.sync();
                    Ok(())
                },
            },
            ParamDesc {
                name: "bline",
                get: |l| Value::from(l.warp.bline.clone()),
                set: |l, v| {
                    l.warp.bline = Vec::<BLinePoint>::try_from(v)?;
                    l.warp.sync();
                    Ok(())
                },
            },
        ];
        TABLE
    }
}

impl CurveWarp {
    pub fn new(warp: task::CurveWarp) -> Self {
        Self {
            base: LayerBase::default(),
            warp,
        }
    }

    fn distortion(&self) -> Distortion {
        Distortion::CurveWarp(self.warp.clone())
    }
}

impl Layer for CurveWarp {
    layer_common!("curve_warp");
    // The required source rect of a curve warp is estimated, so misses read the context.
    distortion_layer!(true);
}

/// Perspective warp of a source rectangle onto a quad.
#[derive(Clone, Debug, Default)]
pub struct Warp {
    base: LayerBase,
    pub perspective: task::Perspective,
}

impl ParamTable for Warp {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Warp>] = &[
            param!("src_tl", perspective.src_tl),
            param!("src_br", perspective.src_br),
            param!("dest_tl", perspective.dest_tl),
            param!("dest_tr", perspective.dest_tr),
            param!("dest_bl", perspective.dest_bl),
            param!("dest_br", perspective.dest_br),
            param!("clip", perspective.clip),
        ];
        TABLE
    }
}

impl Warp {
    pub fn new(perspective: task::Perspective) -> Self {
        Self {
            base: LayerBase::default(),
            perspective,
        }
    }

    fn distortion(&self) -> Distortion {
        Distortion::Perspective(self.perspective)
    }
}

impl Layer for Warp {
    layer_common!("warp");
    distortion_layer!(false);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::ContextParams;
    use crate::layer::LayerHandle;
    use crate::layers::SolidColor;

    fn over_red(top: LayerHandle) -> Context {
        Context::new(
            &[top, Arc::new(SolidColor::new(Color::red()))],
            ContextParams::default(),
            0,
        )
    }

    #[test]
    fn twirl_center_is_safe() {
        let ctx = over_red(Arc::new(Twirl::new(task::Twirl {
            rotations: 3.0,
            ..task::Twirl::default()
        })));
        assert_eq!(ctx.get_color(Point::ZERO), Color::red());
        let zero = over_red(Arc::new(Twirl::new(task::Twirl {
            radius: 0.0,
            ..task::Twirl::default()
        })));
        assert_eq!(zero.get_color(Point::new(0.3, 0.1)), Color::red());
    }

    #[test]
    fn clipped_spherize_is_transparent_outside() {
        let ctx = over_red(Arc::new(SphereDistort::new(task::Spherize {
            clip: true,
            ..task::Spherize::default()
        })));
        assert_eq!(ctx.get_color(Point::new(0.2, 0.0)), Color::red());
        assert_eq!(ctx.get_color(Point::new(3.0, 0.0)), Color::alpha());
    }

    #[test]
    fn spline_points_survive_the_param_table() {
        let mut layer = CurveWarp::default();
        let bline = vec![
            BLinePoint::new(Point::new(-1.0, 0.0), Vec2::new(1.0, 0.0)),
            BLinePoint::new(Point::new(1.0, 0.0), Vec2::new(1.0, 0.0)),
        ];
        layer.set_param("bline", Value::from(bline.clone())).unwrap();
        assert_eq!(layer.warp.bline, bline);
        assert!(layer.set_param("bline", Value::Real(1.0)).is_err());
    }
}
