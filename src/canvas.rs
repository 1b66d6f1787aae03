//! A shared, editable list of layers.

use std::sync::{Arc, PoisonError, RwLock};

use crate::context::{Context, ContextParams};
use crate::foundation::core::Rect;
use crate::layer::LayerHandle;

/// Ordered layers, topmost first.
///
/// Canvases are shared through `Arc` so a paste-canvas layer can reference one, including the
/// canvas it lives in. Each render works on a snapshot of the list.
#[derive(Debug, Default)]
pub struct Canvas {
    layers: RwLock<Arc<[LayerHandle]>>,
    version: Option<String>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layers(layers: Vec<LayerHandle>) -> Self {
        Self {
            layers: RwLock::new(layers.into()),
            version: None,
        }
    }

    /// File version the canvas was loaded from, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
    }

    /// Snapshot of the current layer list.
    pub fn layers(&self) -> Arc<[LayerHandle]> {
        Arc::clone(&self.layers.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set_layers(&self, layers: Vec<LayerHandle>) {
        *self.layers.write().unwrap_or_else(PoisonError::into_inner) = layers.into();
    }

    /// Inserts `layer` on top.
    pub fn push_front(&self, layer: LayerHandle) {
        let mut guard = self.layers.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.push(layer);
        next.extend(guard.iter().cloned());
        *guard = next.into();
    }

    /// Inserts `layer` at the bottom.
    pub fn push_back(&self, layer: LayerHandle) {
        let mut guard = self.layers.write().unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<LayerHandle> = guard.iter().cloned().collect();
        next.push(layer);
        *guard = next.into();
    }

    pub fn len(&self) -> usize {
        self.layers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-level context of this canvas.
    pub fn context(&self, params: ContextParams) -> Context {
        self.context_at_depth(params, 0)
    }

    /// Context of this canvas nested `depth` levels deep.
    pub fn context_at_depth(&self, params: ContextParams, depth: u32) -> Context {
        Context::new(&self.layers(), params, depth)
    }

    pub fn get_full_bounding_rect(&self, params: ContextParams) -> Rect {
        self.context(params).get_full_bounding_rect()
    }
}
