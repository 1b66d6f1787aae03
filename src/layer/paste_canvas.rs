//! Layers that render a nested canvas: [`PasteCanvas`] (the group layer) and [`Switch`].

use std::sync::Arc;

use crate::canvas::Canvas;
use crate::color::Color;
use crate::context::{Context, ContextParams, MAX_DEPTH};
use crate::foundation::core::{Affine, Point, Rect, Vec2, affine_is_invertible, transform_bounds};
use crate::foundation::error::StrataResult;
use crate::layer::composite::{self, Composite};
use crate::layer::param::{ParamDesc, ParamTable, Value};
use crate::layer::{Hit, Layer, LayerBase};
use crate::rendering::task::{TaskGraph, TaskId, TaskKind, TaskTransformationAffine};
use crate::{layer_common, param};

/// Matte alpha above which a locked group reports itself as hit.
const HIT_ALPHA: f32 = 0.25;

/// Offset, rotation, skew and scale, applied in reverse order.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Transformation {
    pub offset: Vec2,
    /// Degrees.
    pub angle: f64,
    /// Degrees.
    pub skew_angle: f64,
    pub scale: Vec2,
}

impl Default for Transformation {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            angle: 0.0,
            skew_angle: 0.0,
            scale: Vec2::new(1.0, 1.0),
        }
    }
}

impl Transformation {
    pub fn matrix(&self) -> Affine {
        Affine::translate(self.offset)
            * Affine::rotate(self.angle.to_radians())
            * Affine::skew(self.skew_angle.to_radians().tan(), 0.0)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
    }
}

/// Renders a nested canvas with its own transformation and time base.
#[derive(Clone, Debug)]
pub struct PasteCanvas {
    base: LayerBase,
    pub composite: Composite,
    pub canvas: Option<Arc<Canvas>>,
    /// Point of the nested canvas placed at the transformation's offset.
    pub origin: Point,
    pub transformation: Transformation,
    pub time_dilation: f64,
    pub time_offset: f64,
    /// Hits inside the group report the group rather than the child layer.
    pub children_lock: bool,
    /// Added to the outline growth of everything inside.
    pub outline_grow: f64,
    pub z_range: bool,
    pub z_range_position: f64,
    pub z_range_depth: f64,
    pub z_range_blur: f64,
}

impl Default for PasteCanvas {
    fn default() -> Self {
        Self {
            base: LayerBase::default(),
            composite: Composite::default(),
            canvas: None,
            origin: Point::ZERO,
            transformation: Transformation::default(),
            time_dilation: 1.0,
            time_offset: 0.0,
            children_lock: false,
            outline_grow: 0.0,
            z_range: false,
            z_range_position: 0.0,
            z_range_depth: 0.0,
            z_range_blur: 0.0,
        }
    }
}

impl ParamTable for PasteCanvas {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<PasteCanvas>] = &[
            param!("amount", composite.amount),
            param!("blend_method", composite.blend_method),
            param!("origin", origin),
            param!("offset", transformation.offset),
            param!("angle", transformation.angle),
            param!("skew_angle", transformation.skew_angle),
            param!("scale", transformation.scale),
            param!("time_dilation", time_dilation),
            param!("time_offset", time_offset),
            param!("children_lock", children_lock),
            param!("outline_grow", outline_grow),
            param!("z_range", z_range),
            param!("z_range_position", z_range_position),
            param!("z_range_depth", z_range_depth),
            param!("z_range_blur", z_range_blur),
        ];
        TABLE
    }
}

impl PasteCanvas {
    pub fn new(canvas: Arc<Canvas>) -> Self {
        Self {
            canvas: Some(canvas),
            ..Self::default()
        }
    }

    /// Nested canvas space to the space of the context.
    pub fn summary_transformation(&self) -> Affine {
        self.transformation.matrix() * Affine::translate(-self.origin.to_vec2())
    }

    /// Restricts the nested canvas to this layer's own depth window.
    pub fn apply_z_range_to_params(&self, params: &mut ContextParams) {
        params.z_range = self.z_range;
        params.z_range_position = self.z_range_position;
        params.z_range_depth = self.z_range_depth;
        params.z_range_blur = self.z_range_blur;
    }

    /// Context of the nested canvas one level below `context`, or `None` when there is no
    /// canvas or the nesting limit is reached.
    pub(crate) fn sub_context(
        &self,
        context: &Context,
        narrow: impl FnOnce(&Context, &mut ContextParams),
    ) -> Option<Context> {
        let canvas = self.canvas.as_ref()?;
        let depth = context.depth() + 1;
        if depth > MAX_DEPTH {
            tracing::debug!(depth, "nested canvas depth limit reached");
            return None;
        }
        let mut params = context.params().clone();
        params.time = params.time * self.time_dilation + self.time_offset;
        params.outline_grow += self.outline_grow;
        params.z_range = false;
        let sub = canvas.context_at_depth(params.clone(), depth);
        narrow(&sub, &mut params);
        Some(sub.with_params(params))
    }

    fn back_transform(&self, pos: Point) -> Option<Point> {
        let m = self.summary_transformation();
        affine_is_invertible(&m).then(|| m.inverse() * pos)
    }

    pub(crate) fn color_in(&self, context: &Context, pos: Point, sub: Option<Context>) -> Color {
        if self.composite.amount == 0.0 {
            return context.get_color(pos);
        }
        let own = match (sub, self.back_transform(pos)) {
            (Some(sub), Some(p)) => sub.get_color(p),
            _ => Color::alpha(),
        };
        self.composite.blend(own, context, pos)
    }

    pub(crate) fn bounds_in(&self, context: &Context, sub: Option<Context>) -> Rect {
        let own = match sub {
            Some(sub) if affine_is_invertible(&self.summary_transformation()) => {
                transform_bounds(self.summary_transformation(), sub.get_full_bounding_rect())
            }
            _ => Rect::ZERO,
        };
        self.composite.full_bounding_rect(own, context)
    }

    pub(crate) fn hit_in(&self, context: &Context, pos: Point, sub: Option<Context>) -> Hit {
        if self.composite.amount != 0.0
            && let (Some(sub), Some(p)) = (sub, self.back_transform(pos))
        {
            if self.children_lock {
                if sub.get_color(p).a >= HIT_ALPHA {
                    return Hit::This;
                }
            } else if let Some(layer) = sub.hit_check(p) {
                return Hit::Other(layer);
            }
        }
        context.hit_check(pos).into()
    }

    pub(crate) fn task_in(
        &self,
        context: &Context,
        graph: &mut TaskGraph,
        sub: Option<Context>,
    ) -> Option<TaskId> {
        composite::build_blend_task_with(&self.composite, false, context, graph, |graph| {
            let inner = sub?.build_rendering_task(graph)?;
            let m = self.summary_transformation();
            if m == Affine::IDENTITY {
                return Some(inner);
            }
            let t = TaskTransformationAffine::new(m, graph.interpolation());
            Some(graph.add(TaskKind::TransformationAffine(t), &[Some(inner)]))
        })
    }

    fn own_sub_context(&self, context: &Context) -> Option<Context> {
        self.sub_context(context, |_, params| self.apply_z_range_to_params(params))
    }
}

impl Layer for PasteCanvas {
    layer_common!("group");

    fn composite(&self) -> Option<&Composite> {
        Some(&self.composite)
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        self.color_in(context, pos, self.own_sub_context(context))
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        self.bounds_in(context, self.own_sub_context(context))
    }

    fn hit_check(&self, context: &Context, pos: Point) -> Hit {
        self.hit_in(context, pos, self.own_sub_context(context))
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        self.task_in(context, graph, self.own_sub_context(context))
    }
}

/// A group showing a single child, picked by description or by position.
#[derive(Clone, Debug, Default)]
pub struct Switch {
    pub group: PasteCanvas,
    /// Description of the child to show; empty selects by `layer_depth`.
    pub layer_name: String,
    pub layer_depth: i32,
}

impl ParamTable for Switch {
    fn param_table() -> &'static [ParamDesc<Self>] {
        const TABLE: &[ParamDesc<Switch>] = &[
            param!("amount", group.composite.amount),
            param!("blend_method", group.composite.blend_method),
            param!("origin", group.origin),
            param!("offset", group.transformation.offset),
            param!("angle", group.transformation.angle),
            param!("skew_angle", group.transformation.skew_angle),
            param!("scale", group.transformation.scale),
            param!("time_dilation", group.time_dilation),
            param!("time_offset", group.time_offset),
            param!("children_lock", group.children_lock),
            param!("layer_name", layer_name),
            param!("layer_depth", layer_depth),
        ];
        TABLE
    }
}

impl Switch {
    pub fn new(canvas: Arc<Canvas>) -> Self {
        Self {
            group: PasteCanvas::new(canvas),
            ..Self::default()
        }
    }

    /// Narrows the z-range of the nested canvas to the selected child.
    ///
    /// No matching child leaves an empty window, so nothing renders.
    pub fn apply_z_range_to_params(&self, sub: &Context, params: &mut ContextParams) {
        let entries = sub.entries();
        let selected = if self.layer_name.is_empty() {
            usize::try_from(self.layer_depth)
                .ok()
                .and_then(|i| entries.get(i))
        } else {
            entries
                .iter()
                .find(|e| e.layer.base().description == self.layer_name)
        };
        params.z_range = true;
        params.z_range_depth = 0.0;
        params.z_range_blur = 0.0;
        params.z_range_position = selected.map_or(f64::NEG_INFINITY, |e| e.z);
    }

    fn sub_context(&self, context: &Context) -> Option<Context> {
        self.group
            .sub_context(context, |sub, params| self.apply_z_range_to_params(sub, params))
    }
}

impl Layer for Switch {
    fn name(&self) -> &'static str {
        "switch"
    }

    fn base(&self) -> &LayerBase {
        &self.group.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.group.base
    }

    fn get_param(&self, name: &str) -> Option<Value> {
        match name {
            "z_depth" => Some(Value::Real(self.group.base.z_depth)),
            _ => crate::layer::param::get_param(self, name),
        }
    }

    fn set_param(&mut self, name: &str, value: Value) -> StrataResult<()> {
        match name {
            "z_depth" => {
                self.group.base.z_depth = f64::try_from(value)?;
                Ok(())
            }
            _ => crate::layer::param::set_param(self, name, value),
        }
    }

    fn param_names(&self) -> Vec<&'static str> {
        let mut names = crate::layer::param::param_names::<Self>();
        names.push("z_depth");
        names
    }

    fn composite(&self) -> Option<&Composite> {
        Some(&self.group.composite)
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color {
        self.group.color_in(context, pos, self.sub_context(context))
    }

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        self.group.bounds_in(context, self.sub_context(context))
    }

    fn hit_check(&self, context: &Context, pos: Point) -> Hit {
        self.group.hit_in(context, pos, self.sub_context(context))
    }

    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        self.group.task_in(context, graph, self.sub_context(context))
    }
}
