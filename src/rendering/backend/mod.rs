//! Executor registry keyed by `(Token, BackendKind)`.
//!
//! Task kinds carry data only; how a kind is turned into pixels lives in a backend. New
//! backends register executors for the tokens they support without touching the task kinds.

pub mod software;

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::color::Color;
use crate::foundation::core::VectorInt;
use crate::foundation::error::{StrataError, StrataResult};
use crate::rendering::task::{Task, TaskGraph, TaskId, Token};
use crate::surface::Surface;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Software,
}

/// Output of a finished sub-task as seen by its parent.
#[derive(Clone, Copy, Debug)]
pub struct SubSurface<'a> {
    pub task: &'a Task,
    pub surface: &'a Surface,
}

/// Everything an executor may read while producing one task's output.
pub struct ExecContext<'a> {
    pub graph: &'a TaskGraph,
    pub id: TaskId,
    pub task: &'a Task,
    /// One entry per sub-task slot; `None` for empty or invalid slots.
    pub subs: SmallVec<[Option<SubSurface<'a>>; 2]>,
}

impl<'a> ExecContext<'a> {
    pub fn sub(&self, slot: usize) -> Option<SubSurface<'a>> {
        self.subs.get(slot).copied().flatten()
    }

    /// Pixel offset of sub-task `slot` inside this task's grid.
    pub fn sub_offset(&self, slot: usize) -> Option<VectorInt> {
        self.sub(slot).map(|s| s.task.offset_in(self.task))
    }

    /// Color of sub-task `slot` at this task's pixel `(x, y)`, for sub-tasks on the same grid.
    pub fn sub_pixel(&self, slot: usize, x: i32, y: i32) -> Color {
        match self.sub(slot) {
            Some(s) => {
                let off = s.task.offset_in(self.task);
                s.surface.get(x - off.x, y - off.y)
            }
            None => Color::alpha(),
        }
    }
}

/// Produces the output of one task. `out` is cleared and sized to the task's target.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()>;
}

impl<F> TaskExecutor for F
where
    F: Fn(&ExecContext<'_>, &mut Surface) -> StrataResult<()> + Send + Sync,
{
    fn execute(&self, cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
        self(cx, out)
    }
}

#[derive(Clone, Default)]
pub struct BackendRegistry {
    executors: HashMap<(Token, BackendKind), Arc<dyn TaskExecutor>>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self
            .executors
            .keys()
            .map(|(t, b)| (t.name(), *b))
            .collect();
        keys.sort_by_key(|(name, _)| *name);
        f.debug_struct("BackendRegistry")
            .field("executors", &keys)
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every software executor installed.
    pub fn with_software() -> Self {
        let mut registry = Self::new();
        software::register(&mut registry);
        registry
    }

    /// Installs `executor`, replacing any previous one for the same key.
    pub fn register(
        &mut self,
        token: Token,
        backend: BackendKind,
        executor: impl TaskExecutor + 'static,
    ) -> &mut Self {
        self.executors.insert((token, backend), Arc::new(executor));
        self
    }

    pub fn lookup(&self, token: Token, backend: BackendKind) -> StrataResult<Arc<dyn TaskExecutor>> {
        self.executors.get(&(token, backend)).cloned().ok_or_else(|| {
            StrataError::render(format!(
                "no executor registered for task '{}' on backend {backend:?}",
                token.name()
            ))
        })
    }

    pub fn supports(&self, token: Token, backend: BackendKind) -> bool {
        self.executors.contains_key(&(token, backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_backend_covers_every_token() {
        let registry = BackendRegistry::with_software();
        for token in Token::ALL {
            assert!(
                registry.supports(token, BackendKind::Software),
                "missing {}",
                token.name()
            );
        }
    }

    #[test]
    fn missing_executor_is_a_render_error() {
        let registry = BackendRegistry::new();
        let err = match registry.lookup(Token::Blend, BackendKind::Software) {
            Ok(_) => panic!("empty registry returned an executor"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("render error:"));
        assert!(err.to_string().contains("blend"));
    }

    fn paint_red(_cx: &ExecContext<'_>, out: &mut Surface) -> StrataResult<()> {
        out.fill(Color::red());
        Ok(())
    }

    #[test]
    fn functions_register_as_executors() {
        let mut registry = BackendRegistry::new();
        registry.register(Token::SurfaceEmpty, BackendKind::Software, paint_red);
        assert!(registry.supports(Token::SurfaceEmpty, BackendKind::Software));
        assert!(!registry.supports(Token::Blend, BackendKind::Software));
    }
}
