use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Scale used by render entry points when reporting progress.
pub const PROGRESS_SCALE: u64 = 10_000;

/// Receives progress reports during a render. Returning `false` cancels it.
pub trait ProgressCallback {
    fn amount_complete(&mut self, current: u64, total: u64) -> bool;
}

impl<F> ProgressCallback for F
where
    F: FnMut(u64, u64) -> bool,
{
    fn amount_complete(&mut self, current: u64, total: u64) -> bool {
        self(current, total)
    }
}

/// Maps a sub-stage onto `[start, end]` of the parent's `total` scale.
pub struct SuperCallback<'a> {
    parent: &'a mut dyn ProgressCallback,
    start: u64,
    end: u64,
    total: u64,
}

impl<'a> SuperCallback<'a> {
    pub fn new(parent: &'a mut dyn ProgressCallback, start: u64, end: u64, total: u64) -> Self {
        Self {
            parent,
            start,
            end: end.max(start),
            total,
        }
    }
}

impl ProgressCallback for SuperCallback<'_> {
    fn amount_complete(&mut self, current: u64, total: u64) -> bool {
        let span = self.end - self.start;
        let mapped = if total == 0 {
            self.start
        } else {
            let cur = current.min(total);
            self.start + ((u128::from(span) * u128::from(cur)) / u128::from(total)) as u64
        };
        self.parent.amount_complete(mapped, self.total)
    }
}

/// Shareable cancellation switch usable as a progress callback.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl ProgressCallback for CancelFlag {
    fn amount_complete(&mut self, _current: u64, _total: u64) -> bool {
        !self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_callback_maps_into_window() {
        let mut seen = Vec::new();
        let mut record = |cur: u64, total: u64| {
            seen.push((cur, total));
            true
        };
        {
            let mut sub = SuperCallback::new(&mut record, 2_000, 6_000, PROGRESS_SCALE);
            assert!(sub.amount_complete(0, 4));
            assert!(sub.amount_complete(2, 4));
            assert!(sub.amount_complete(4, 4));
            assert!(sub.amount_complete(9, 4));
        }
        assert_eq!(
            seen,
            vec![
                (2_000, 10_000),
                (4_000, 10_000),
                (6_000, 10_000),
                (6_000, 10_000)
            ]
        );
    }

    #[test]
    fn cancel_flag_stops_progress() {
        let mut flag = CancelFlag::new();
        assert!(flag.amount_complete(1, 2));
        flag.clone().cancel();
        assert!(!flag.amount_complete(1, 2));
    }
}
