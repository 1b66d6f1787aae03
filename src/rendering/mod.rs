//! Push evaluation: the task graph, its scheduler and the backends that execute it.

pub mod backend;
pub mod progress;
pub mod renddesc;
pub mod renderer;
pub(crate) mod scheduler;
pub mod task;

pub use backend::{BackendKind, BackendRegistry, ExecContext, SubSurface, TaskExecutor};
pub use progress::{CancelFlag, PROGRESS_SCALE, ProgressCallback, SuperCallback};
pub use renddesc::RendDesc;
pub use renderer::{RenderOpts, RenderStats, Renderer};
pub use task::{Task, TaskGraph, TaskId, TaskKind, Token};
