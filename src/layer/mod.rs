//! The layer contract shared by every layer kind.
//!
//! A layer answers pull queries (`get_color`, `get_full_bounding_rect`, `hit_check`) given a
//! [`Context`] for everything below it, and contributes to push rendering either through
//! [`Layer::build_rendering_task`] or, for composite layers, the narrower
//! [`Layer::build_composite_task`] which the shared composite policy wraps in a blend.

pub mod composite;
pub mod duplicate;
pub mod param;
pub mod paste_canvas;

use std::fmt;
use std::sync::Arc;

use crate::color::Color;
use crate::context::{Context, ContextParams};
use crate::foundation::core::{Point, Rect};
use crate::foundation::error::StrataResult;
use crate::rendering::task::{TaskGraph, TaskId, TaskKind, TaskLayer};

pub use composite::Composite;
pub use duplicate::{Duplicate, IndexStepper};
pub use paste_canvas::{PasteCanvas, Switch, Transformation};
pub use param::{Param, ParamDesc, ParamTable, Value};

/// Shared handle to a layer inside a canvas.
pub type LayerHandle = Arc<dyn Layer>;

/// Flags every layer carries.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LayerBase {
    pub active: bool,
    pub exclude_from_rendering: bool,
    /// Depth offset; the layer sorts at `z_depth * 1.0001 + position`.
    pub z_depth: f64,
    pub description: String,
}

impl Default for LayerBase {
    fn default() -> Self {
        Self {
            active: true,
            exclude_from_rendering: false,
            z_depth: 0.0,
            description: String::new(),
        }
    }
}

/// Result of a layer's hit test.
#[derive(Clone, Debug)]
pub enum Hit {
    /// The layer being asked.
    This,
    /// A layer below or inside it.
    Other(LayerHandle),
    Miss,
}

impl From<Option<LayerHandle>> for Hit {
    fn from(h: Option<LayerHandle>) -> Self {
        h.map_or(Hit::Miss, Hit::Other)
    }
}

pub trait Layer: Send + Sync + fmt::Debug {
    /// Registry name of the layer kind.
    fn name(&self) -> &'static str;

    fn base(&self) -> &LayerBase;

    fn base_mut(&mut self) -> &mut LayerBase;

    fn get_param(&self, name: &str) -> Option<Value>;

    fn set_param(&mut self, name: &str, value: Value) -> StrataResult<()>;

    fn param_names(&self) -> Vec<&'static str>;

    /// Amount and blend method of composite layers.
    fn composite(&self) -> Option<&Composite> {
        None
    }

    /// Whether the layer's own contribution depends on what is below it.
    fn reads_context(&self) -> bool {
        false
    }

    fn get_color(&self, context: &Context, pos: Point) -> Color;

    fn get_full_bounding_rect(&self, context: &Context) -> Rect {
        context.get_full_bounding_rect()
    }

    fn hit_check(&self, context: &Context, pos: Point) -> Hit {
        context.hit_check(pos).into()
    }

    /// The layer's own contribution, without the context below.
    fn build_composite_task(&self, _params: &ContextParams, _graph: &mut TaskGraph) -> Option<TaskId> {
        None
    }

    /// The task for this layer over `context`, the context below it.
    ///
    /// Composite layers blend their own contribution over the context. Other layers fall back
    /// to evaluating the pull path per pixel.
    fn build_rendering_task(&self, context: &Context, graph: &mut TaskGraph) -> Option<TaskId> {
        match self.composite() {
            Some(c) => composite::build_blend_task(self, c, context, graph),
            None => Some(graph.add_leaf(TaskKind::Layer(TaskLayer::new(context.owner())))),
        }
    }
}

/// Implements the bookkeeping methods of [`Layer`] for a type with a `base` field and a
/// [`ParamTable`].
#[macro_export]
macro_rules! layer_common {
    ($name:literal) => {
        fn name(&self) -> &'static str {
            $name
        }

        fn base(&self) -> &$crate::layer::LayerBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::layer::LayerBase {
            &mut self.base
        }

        fn get_param(&self, name: &str) -> Option<$crate::layer::Value> {
            match name {
                "z_depth" => Some($crate::layer::Value::Real(self.base.z_depth)),
                _ => $crate::layer::param::get_param(self, name),
            }
        }

        fn set_param(
            &mut self,
            name: &str,
            value: $crate::layer::Value,
        ) -> $crate::foundation::error::StrataResult<()> {
            match name {
                "z_depth" => {
                    self.base.z_depth = ::core::convert::TryFrom::try_from(value)?;
                    Ok(())
                }
                _ => $crate::layer::param::set_param(self, name, value),
            }
        }

        fn param_names(&self) -> Vec<&'static str> {
            let mut names = $crate::layer::param::param_names::<Self>();
            names.push("z_depth");
            names
        }
    };
}
