//! Pull evaluation cursor over a z-sorted layer list.
//!
//! A [`Context`] is positioned at one layer of a canvas. Asking it for a color, a bounding
//! rectangle, a hit or a rendering task finds the first layer at or below that position which
//! is active and visible in the z-range, and hands that layer a context for everything below
//! it. Layers express composition by recursing into that context.

use std::sync::Arc;

use crate::color::Color;
use crate::foundation::core::{Affine, Point, Rect};
use crate::foundation::error::{StrataError, StrataResult};
use crate::layer::{Hit, LayerHandle};
use crate::rendering::progress::{PROGRESS_SCALE, ProgressCallback, SuperCallback};
use crate::rendering::renddesc::RendDesc;
use crate::rendering::renderer::Renderer;
use crate::rendering::task::{TaskGraph, TaskId, TaskKind, TaskTransformationAffine};
use crate::surface::Surface;

/// Deepest nesting of sub-canvases that still renders.
pub const MAX_DEPTH: u32 = 10;

/// Per-render parameters shared by every layer of a context.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ContextParams {
    /// Document time in seconds.
    pub time: f64,
    /// Render layers flagged `exclude_from_rendering`.
    pub render_excluded_contexts: bool,
    /// Restrict rendering to the depth window below.
    pub z_range: bool,
    pub z_range_position: f64,
    pub z_range_depth: f64,
    /// Width of the linear fade on both sides of the window.
    pub z_range_blur: f64,
    /// Current step of an enclosing duplicate layer.
    pub index: f64,
    /// Sum of the enclosing groups' outline growth; outline widths scale by `exp` of it.
    pub outline_grow: f64,
}

impl Default for ContextParams {
    fn default() -> Self {
        Self {
            time: 0.0,
            render_excluded_contexts: false,
            z_range: false,
            z_range_position: 0.0,
            z_range_depth: 0.0,
            z_range_blur: 0.0,
            index: 0.0,
            outline_grow: 0.0,
        }
    }
}

impl ContextParams {
    pub fn at_time(time: f64) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }

    /// Visibility in `[0, 1]` of a layer with true depth `z`.
    pub fn z_depth_visibility(&self, z: f64) -> f32 {
        if !self.z_range {
            return 1.0;
        }
        let lo = self.z_range_position;
        let hi = self.z_range_position + self.z_range_depth;
        let blur = self.z_range_blur.max(0.0);
        let v = if z < lo {
            if blur > 0.0 { 1.0 - (lo - z) / blur } else { 0.0 }
        } else if z > hi {
            if blur > 0.0 { 1.0 - (z - hi) / blur } else { 0.0 }
        } else {
            1.0
        };
        v.clamp(0.0, 1.0) as f32
    }
}

/// One layer of a context with its true depth.
#[derive(Clone, Debug)]
pub struct ContextEntry {
    pub layer: LayerHandle,
    /// `z_depth * 1.0001 + position`, the key the list is sorted by.
    pub z: f64,
}

#[derive(Clone, Debug)]
pub struct Context {
    entries: Arc<[ContextEntry]>,
    index: usize,
    params: ContextParams,
    depth: u32,
}

impl Context {
    /// Context over `layers` (top first), sorted by true depth.
    pub fn new(layers: &[LayerHandle], params: ContextParams, depth: u32) -> Self {
        let mut entries: Vec<ContextEntry> = layers
            .iter()
            .enumerate()
            .map(|(i, layer)| ContextEntry {
                layer: Arc::clone(layer),
                z: layer.base().z_depth * 1.0001 + i as f64,
            })
            .collect();
        entries.sort_by(|a, b| a.z.total_cmp(&b.z));
        Self {
            entries: entries.into(),
            index: 0,
            params,
            depth,
        }
    }

    /// A context with nothing in it.
    pub fn empty(params: ContextParams, depth: u32) -> Self {
        Self::new(&[], params, depth)
    }

    pub fn params(&self) -> &ContextParams {
        &self.params
    }

    /// Nesting depth of the canvas this context belongs to.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_end(&self) -> bool {
        self.index >= self.entries.len()
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries[self.index.min(self.entries.len())..]
    }

    /// The same position with other parameters.
    pub fn with_params(&self, params: ContextParams) -> Self {
        Self {
            params,
            ..self.clone()
        }
    }

    /// The context one layer further down.
    pub fn get_next(&self) -> Self {
        Self {
            index: (self.index + 1).min(self.entries.len()),
            ..self.clone()
        }
    }

    /// The context positioned at the layer that received `self` as its context below.
    pub fn owner(&self) -> Self {
        Self {
            index: self.index.saturating_sub(1),
            ..self.clone()
        }
    }

    /// A context holding only the layer at this position.
    pub fn isolated(&self) -> Self {
        let entries: Vec<ContextEntry> = self.entries().iter().take(1).cloned().collect();
        Self {
            entries: entries.into(),
            index: 0,
            params: self.params.clone(),
            depth: self.depth,
        }
    }

    /// Z-range visibility of the layer that received `self` as its context below.
    pub fn owner_visibility(&self) -> f32 {
        match self.index.checked_sub(1).and_then(|i| self.entries.get(i)) {
            Some(entry) => self.params.z_depth_visibility(entry.z),
            None => 1.0,
        }
    }

    fn active(&self, entry: &ContextEntry) -> bool {
        let base = entry.layer.base();
        base.active && (self.params.render_excluded_contexts || !base.exclude_from_rendering)
    }

    /// First renderable layer at or below this position and the context below it.
    fn seek(&self) -> Option<(&ContextEntry, Context)> {
        let start = self.index.min(self.entries.len());
        self.entries[start..]
            .iter()
            .enumerate()
            .find(|(_, e)| self.active(e) && self.params.z_depth_visibility(e.z) > 0.0)
            .map(|(i, e)| {
                let next = Self {
                    index: start + i + 1,
                    ..self.clone()
                };
                (e, next)
            })
    }

    pub fn get_color(&self, pos: Point) -> Color {
        match self.seek() {
            Some((entry, next)) => entry.layer.get_color(&next, pos),
            None => Color::alpha(),
        }
    }

    pub fn get_full_bounding_rect(&self) -> Rect {
        match self.seek() {
            Some((entry, next)) => entry.layer.get_full_bounding_rect(&next),
            None => Rect::ZERO,
        }
    }

    /// Topmost layer whose visible contribution covers `pos`.
    pub fn hit_check(&self, pos: Point) -> Option<LayerHandle> {
        let (entry, next) = self.seek()?;
        match entry.layer.hit_check(&next, pos) {
            Hit::This => Some(Arc::clone(&entry.layer)),
            Hit::Other(layer) => Some(layer),
            Hit::Miss => None,
        }
    }

    /// Adds the task for this context to `graph`; `None` renders transparent.
    pub fn build_rendering_task(&self, graph: &mut TaskGraph) -> Option<TaskId> {
        let mut ctx = self.clone();
        loop {
            let (entry, next) = ctx.seek()?;
            if entry.layer.composite().is_some_and(|c| c.amount == 0.0) {
                ctx = next;
                continue;
            }
            let layer = Arc::clone(&entry.layer);
            return layer.build_rendering_task(&next, graph);
        }
    }

    /// Renders this context into `surface`, replacing its contents with a `desc`-sized image.
    pub fn accelerated_render(
        &self,
        surface: &mut Surface,
        quality: i32,
        desc: &RendDesc,
        cb: Option<&mut dyn ProgressCallback>,
    ) -> StrataResult<()> {
        self.accelerated_render_with(&Renderer::software(), surface, quality, desc, cb)
    }

    /// [`Context::accelerated_render`] through a caller-provided renderer.
    #[tracing::instrument(skip(self, renderer, surface, cb), fields(w = desc.w, h = desc.h))]
    pub fn accelerated_render_with(
        &self,
        renderer: &Renderer,
        surface: &mut Surface,
        quality: i32,
        desc: &RendDesc,
        cb: Option<&mut dyn ProgressCallback>,
    ) -> StrataResult<()> {
        *surface = Surface::new(desc.w, desc.h);
        if !desc.is_valid() {
            return Ok(());
        }
        if !desc.transformation.is_finite() {
            return Err(StrataError::validation("render transformation is not finite"));
        }

        let mut graph = TaskGraph::with_quality(quality);
        let mut root = self.build_rendering_task(&mut graph);
        if desc.transformation != Affine::IDENTITY {
            root = root.map(|sub| {
                let t = TaskTransformationAffine::new(desc.transformation, graph.interpolation());
                graph.add(TaskKind::TransformationAffine(t), &[Some(sub)])
            });
        }
        if let Some(root) = root {
            graph.set_coords(root, desc.rect(), desc.size());
        }

        let out = match cb {
            Some(parent) => {
                let mut mapped = SuperCallback::new(parent, 0, PROGRESS_SCALE, PROGRESS_SCALE);
                renderer.run(&graph, root, Some(&mut mapped))?
            }
            None => renderer.run(&graph, root, None)?,
        };

        let Some(out) = out else {
            return Ok(());
        };
        let (w, h) = (desc.w, desc.h);
        for y in 0..h {
            let sy = if desc.flip_y() { h - 1 - y } else { y };
            for x in 0..w {
                let sx = if desc.flip_x() { w - 1 - x } else { x };
                surface.set(x, y, out.get(sx as i32, sy as i32));
            }
        }
        Ok(())
    }
}
