use std::sync::{Mutex, RwLock};

use rayon::prelude::*;
use smallvec::SmallVec;

use crate::foundation::error::{StrataError, StrataResult};
use crate::rendering::backend::{BackendKind, BackendRegistry, ExecContext, SubSurface};
use crate::rendering::progress::ProgressCallback;
use crate::rendering::scheduler::DagScheduler;
use crate::rendering::task::{TaskGraph, TaskId};
use crate::surface::{Surface, SurfacePool, SurfacePoolOpts, SurfacePoolStats};

/// Execution options for [`Renderer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOpts {
    pub backend: BackendKind,
    /// Run independent ready tasks on a rayon pool.
    pub parallel: bool,
    /// Worker count for the parallel path; `None` uses rayon's default.
    pub threads: Option<usize>,
    pub pool: SurfacePoolOpts,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            backend: BackendKind::Software,
            parallel: false,
            threads: None,
            pool: SurfacePoolOpts::default(),
        }
    }
}

/// Counters of the most recent [`Renderer::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub tasks_total: u64,
    pub tasks_executed: u64,
    pub batches: u64,
}

/// Executes a [`TaskGraph`] bottom-up through the executors of a [`BackendRegistry`].
///
/// Each task output lives in its own `RwLock` slot. Executors read-lock the slots of their
/// sub-tasks and the finished output is written into the task's own slot. Intermediate
/// surfaces go back to a [`SurfacePool`] once their last reader has run.
#[derive(Debug)]
pub struct Renderer {
    registry: BackendRegistry,
    opts: RenderOpts,
    pool: Mutex<SurfacePool>,
    stats: Mutex<RenderStats>,
}

type Slots = Vec<RwLock<Option<Surface>>>;

impl Renderer {
    pub fn new(registry: BackendRegistry, opts: RenderOpts) -> Self {
        Self {
            registry,
            pool: Mutex::new(SurfacePool::new(opts.pool)),
            opts,
            stats: Mutex::new(RenderStats::default()),
        }
    }

    /// Software backend with default options.
    pub fn software() -> Self {
        Self::new(BackendRegistry::with_software(), RenderOpts::default())
    }

    pub fn opts(&self) -> &RenderOpts {
        &self.opts
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
            .lock()
            .map(|s| *s)
            .unwrap_or_else(|e| *e.into_inner())
    }

    pub fn pool_stats(&self) -> SurfacePoolStats {
        self.pool
            .lock()
            .map(|p| p.stats())
            .unwrap_or_else(|e| e.into_inner().stats())
    }

    /// Renders `root` and returns its output.
    ///
    /// `Ok(None)` when there is no root or the root is degenerate. The callback receives
    /// `(done, total)` task counts and cancels the render by returning `false`.
    #[tracing::instrument(skip_all, fields(tasks = graph.len(), parallel = self.opts.parallel))]
    pub fn run(
        &self,
        graph: &TaskGraph,
        root: Option<TaskId>,
        mut cb: Option<&mut dyn ProgressCallback>,
    ) -> StrataResult<Option<Surface>> {
        let Some(root) = root else {
            return Ok(None);
        };
        if !graph.get(root)?.is_valid() {
            return Ok(None);
        }

        let order = graph.reachable(root);
        let total = order.len() as u64;
        let mut sched = DagScheduler::new(graph, &order);
        let mut readers = vec![0usize; graph.len()];
        for &id in &order {
            readers[id.index()] = sched.dependent_count(id);
        }
        let slots: Slots = (0..graph.len()).map(|_| RwLock::new(None)).collect();
        let mut stats = RenderStats {
            tasks_total: total,
            ..RenderStats::default()
        };
        tracing::debug!(tasks = total, "scheduling render");

        if self.opts.parallel {
            let pool = build_thread_pool(self.opts.threads)?;
            loop {
                let batch = sched.pop_ready_batch(usize::MAX);
                if batch.is_empty() {
                    break;
                }
                let results: Vec<StrataResult<()>> = pool.install(|| {
                    batch
                        .par_iter()
                        .map(|&id| self.execute(graph, id, &slots))
                        .collect()
                });
                for r in results {
                    r?;
                }
                for &id in &batch {
                    sched.mark_done(id);
                    self.release_inputs(graph, id, root, &slots, &mut readers)?;
                }
                stats.tasks_executed += batch.len() as u64;
                stats.batches += 1;
                report(&mut cb, stats.tasks_executed, total)?;
            }
        } else {
            while let Some(id) = sched.pop_ready() {
                self.execute(graph, id, &slots)?;
                sched.mark_done(id);
                self.release_inputs(graph, id, root, &slots, &mut readers)?;
                stats.tasks_executed += 1;
                stats.batches += 1;
                report(&mut cb, stats.tasks_executed, total)?;
            }
        }

        if sched.remaining() != 0 {
            return Err(StrataError::render(format!(
                "{} tasks never became ready",
                sched.remaining()
            )));
        }
        if let Ok(mut s) = self.stats.lock() {
            *s = stats;
        }

        let out = slots[root.index()]
            .write()
            .map_err(|_| StrataError::render("root surface lock poisoned"))?
            .take();
        Ok(out)
    }

    fn execute(&self, graph: &TaskGraph, id: TaskId, slots: &Slots) -> StrataResult<()> {
        let result = self.execute_inner(graph, id, slots);
        if let Err(e) = &result {
            let token = graph.get(id).map(|t| t.token().name()).unwrap_or("?");
            tracing::error!(task = id.0, token, error = %e, "task failed");
        }
        result
    }

    fn execute_inner(&self, graph: &TaskGraph, id: TaskId, slots: &Slots) -> StrataResult<()> {
        let task = graph.get(id)?;
        let executor = self.registry.lookup(task.token(), self.opts.backend)?;

        let mut unique: SmallVec<[TaskId; 2]> = SmallVec::new();
        for sub in task.sub_tasks.iter().flatten() {
            if graph.is_valid(*sub) && !unique.contains(sub) {
                unique.push(*sub);
            }
        }
        let mut guards = SmallVec::<[_; 2]>::with_capacity(unique.len());
        for sub in &unique {
            let guard = slots[sub.index()].read().map_err(|_| {
                StrataError::render(format!("surface lock of task {} poisoned", sub.0))
            })?;
            guards.push((*sub, guard));
        }

        let w = u32::try_from(task.target_size.x).unwrap_or(0);
        let h = u32::try_from(task.target_size.y).unwrap_or(0);
        let mut out = self
            .pool
            .lock()
            .map_err(|_| StrataError::render("surface pool lock poisoned"))?
            .borrow(w, h);

        {
            let mut subs = SmallVec::with_capacity(task.sub_tasks.len());
            for slot in &task.sub_tasks {
                let entry = match slot {
                    Some(sid) => match guards.iter().find(|(g, _)| g == sid) {
                        Some((_, guard)) => match guard.as_ref() {
                            Some(surface) => Some(SubSurface {
                                task: graph.get(*sid)?,
                                surface,
                            }),
                            None => None,
                        },
                        None => None,
                    },
                    None => None,
                };
                subs.push(entry);
            }
            let cx = ExecContext {
                graph,
                id,
                task,
                subs,
            };
            executor.execute(&cx, &mut out)?;
        }
        drop(guards);

        *slots[id.index()]
            .write()
            .map_err(|_| StrataError::render(format!("surface lock of task {} poisoned", id.0)))? =
            Some(out);
        Ok(())
    }

    /// Hands sub-task outputs back to the pool once `done` was their last reader.
    fn release_inputs(
        &self,
        graph: &TaskGraph,
        done: TaskId,
        root: TaskId,
        slots: &Slots,
        readers: &mut [usize],
    ) -> StrataResult<()> {
        let task = graph.get(done)?;
        for sub in task.sub_tasks.iter().flatten() {
            if !graph.is_valid(*sub) {
                continue;
            }
            let n = &mut readers[sub.index()];
            *n = n.saturating_sub(1);
            if *n > 0 || *sub == root {
                continue;
            }
            let taken = slots[sub.index()]
                .write()
                .map_err(|_| {
                    StrataError::render(format!("surface lock of task {} poisoned", sub.0))
                })?
                .take();
            if let Some(surface) = taken {
                self.pool
                    .lock()
                    .map_err(|_| StrataError::render("surface pool lock poisoned"))?
                    .release(surface);
            }
        }
        Ok(())
    }
}

fn report(
    cb: &mut Option<&mut dyn ProgressCallback>,
    done: u64,
    total: u64,
) -> StrataResult<()> {
    if let Some(cb) = cb.as_deref_mut()
        && !cb.amount_complete(done, total)
    {
        tracing::debug!(done, total, "render cancelled by progress callback");
        return Err(StrataError::Cancelled);
    }
    Ok(())
}

fn build_thread_pool(threads: Option<usize>) -> StrataResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(StrataError::validation(
            "render threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| StrataError::render(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{BlendMethod, Color, ColorMatrix};
    use crate::foundation::core::{Rect, VectorInt};
    use crate::rendering::task::{PixelOp, TaskBlend, TaskKind, TaskPixelProcessor};

    fn solid(g: &mut TaskGraph, c: Color) -> TaskId {
        g.add(
            TaskKind::PixelProcessor(TaskPixelProcessor::new(PixelOp::ColorMatrix(
                ColorMatrix::constant(c),
            ))),
            &[None],
        )
    }

    fn two_layer_graph() -> (TaskGraph, TaskId) {
        let mut g = TaskGraph::new();
        let below = solid(&mut g, Color::red());
        let own = solid(&mut g, Color::blue().with_alpha(0.5));
        let top = g.add(
            TaskKind::Blend(TaskBlend::new(BlendMethod::Composite, 1.0)),
            &[Some(below), Some(own)],
        );
        g.set_coords(top, Rect::new(0.0, 0.0, 3.0, 2.0), VectorInt::new(3, 2));
        (g, top)
    }

    #[test]
    fn missing_root_renders_nothing() {
        let (g, _) = two_layer_graph();
        assert!(Renderer::software().run(&g, None, None).unwrap().is_none());
    }

    #[test]
    fn degenerate_root_renders_nothing() {
        let mut g = TaskGraph::new();
        let id = solid(&mut g, Color::red());
        g.set_coords(id, Rect::new(0.0, 0.0, 1.0, 1.0), VectorInt::new(0, 4));
        assert!(Renderer::software().run(&g, Some(id), None).unwrap().is_none());
    }

    #[test]
    fn parallel_matches_sequential() {
        let (g, top) = two_layer_graph();
        let seq = Renderer::software().run(&g, Some(top), None).unwrap();
        let par = Renderer::new(
            BackendRegistry::with_software(),
            RenderOpts {
                parallel: true,
                threads: Some(2),
                ..RenderOpts::default()
            },
        )
        .run(&g, Some(top), None)
        .unwrap();
        assert_eq!(seq, par);
        assert!(seq.is_some());
    }

    #[test]
    fn zero_threads_is_a_validation_error() {
        let (g, top) = two_layer_graph();
        let renderer = Renderer::new(
            BackendRegistry::with_software(),
            RenderOpts {
                parallel: true,
                threads: Some(0),
                ..RenderOpts::default()
            },
        );
        let err = renderer.run(&g, Some(top), None).unwrap_err();
        assert!(matches!(err, StrataError::Validation(_)));
    }

    #[test]
    fn progress_counts_every_task_and_can_cancel() {
        let (g, top) = two_layer_graph();
        let renderer = Renderer::software();

        let mut seen = Vec::new();
        let mut record = |done: u64, total: u64| {
            seen.push((done, total));
            true
        };
        renderer.run(&g, Some(top), Some(&mut record)).unwrap();
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(renderer.stats().tasks_executed, 3);

        let mut stop = |_done: u64, _total: u64| false;
        let err = renderer.run(&g, Some(top), Some(&mut stop)).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn intermediates_return_to_the_pool() {
        let (g, top) = two_layer_graph();
        let renderer = Renderer::software();
        renderer.run(&g, Some(top), None).unwrap();
        renderer.run(&g, Some(top), None).unwrap();
        let stats = renderer.pool_stats();
        assert!(stats.reused_surfaces >= 2, "{stats:?}");
    }

    #[test]
    fn missing_executor_fails_the_render() {
        let (g, top) = two_layer_graph();
        let renderer = Renderer::new(BackendRegistry::new(), RenderOpts::default());
        let err = renderer.run(&g, Some(top), None).unwrap_err();
        assert!(err.to_string().contains("no executor registered"));
    }
}
