#![forbid(unsafe_code)]

pub mod canvas;
pub mod color;
pub mod context;
pub mod foundation;
pub mod layer;
pub mod layers;
pub mod rendering;
pub mod surface;

pub use canvas::Canvas;
pub use color::{BlendMethod, Color, ColorMatrix, Gamma, Gradient, GradientStop};
pub use context::{Context, ContextParams, MAX_DEPTH};
pub use foundation::core::{Affine, Point, Rect, RectInt, Vec2, VectorInt};
pub use foundation::error::{StrataError, StrataResult};
pub use layer::{Hit, Layer, LayerBase, LayerHandle, Value};
pub use layers::{LAYER_NAMES, create_layer, create_layer_from_json};
pub use rendering::{
    BackendKind, BackendRegistry, CancelFlag, ProgressCallback, RendDesc, RenderOpts, Renderer,
    TaskGraph, TaskId,
};
pub use surface::{Interpolation, Surface};
