use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::rendering::task::{TaskGraph, TaskId};

/// Deterministic dependency-count scheduler over the tasks reachable from a root.
///
/// Determinism rule: when multiple tasks are ready, the smallest `TaskId` is returned first.
/// A sub-task listed twice by the same parent counts as two dependencies.
pub(crate) struct DagScheduler {
    indeg: HashMap<TaskId, u32>,
    dependents: HashMap<TaskId, Vec<TaskId>>,
    ready: BinaryHeap<Reverse<u32>>,
    remaining: usize,
}

impl DagScheduler {
    pub(crate) fn new(graph: &TaskGraph, order: &[TaskId]) -> Self {
        let mut indeg = HashMap::with_capacity(order.len());
        let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::with_capacity(order.len());

        for &id in order {
            let mut count = 0u32;
            if let Ok(task) = graph.get(id) {
                for sub in task.sub_tasks.iter().flatten() {
                    if !graph.is_valid(*sub) {
                        continue;
                    }
                    dependents.entry(*sub).or_default().push(id);
                    count = count.saturating_add(1);
                }
            }
            indeg.insert(id, count);
        }

        let mut ready = BinaryHeap::<Reverse<u32>>::new();
        for (&id, &deg) in &indeg {
            if deg == 0 {
                ready.push(Reverse(id.0));
            }
        }

        Self {
            indeg,
            dependents,
            ready,
            remaining: order.len(),
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }

    pub(crate) fn pop_ready(&mut self) -> Option<TaskId> {
        let Reverse(id) = self.ready.pop()?;
        Some(TaskId(id))
    }

    pub(crate) fn pop_ready_batch(&mut self, max: usize) -> Vec<TaskId> {
        let mut out = Vec::with_capacity(max.min(self.ready.len()));
        for _ in 0..max {
            let Some(task) = self.pop_ready() else {
                break;
            };
            out.push(task);
        }
        out
    }

    pub(crate) fn mark_done(&mut self, done: TaskId) {
        self.remaining = self.remaining.saturating_sub(1);
        let Some(deps) = self.dependents.get(&done) else {
            return;
        };
        for &dep in deps {
            if let Some(d) = self.indeg.get_mut(&dep) {
                *d = d.saturating_sub(1);
                if *d == 0 {
                    self.ready.push(Reverse(dep.0));
                }
            }
        }
    }

    /// Number of parents that still have to read `id`'s output.
    pub(crate) fn dependent_count(&self, id: TaskId) -> usize {
        self.dependents.get(&id).map_or(0, Vec::len)
    }
}
