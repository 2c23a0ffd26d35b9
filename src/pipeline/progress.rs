//! Progress reporting and cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Receives coarse progress as a percentage in `0..=100`.
///
/// Calls are synchronous and serialized; the reported value never decreases
/// within a run.
pub trait ProgressSink: Sync {
    fn report(&self, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Sync,
{
    fn report(&self, percent: u8) {
        self(percent)
    }
}

/// Checkpoint percentages of a detection run.
pub(crate) mod checkpoint {
    pub(crate) const START: u8 = 0;
    pub(crate) const TILED: u8 = 10;
    pub(crate) const SCORED: u8 = 80;
    pub(crate) const PRUNED: u8 = 90;
    pub(crate) const DONE: u8 = 100;
}

/// Per-run monotonic wrapper around an optional sink.
pub(crate) struct Progress<'a> {
    sink: Option<&'a dyn ProgressSink>,
    last: Mutex<Option<u8>>,
    tiles_done: AtomicUsize,
    tiles_total: usize,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self {
            sink,
            last: Mutex::new(None),
            tiles_done: AtomicUsize::new(0),
            tiles_total: 0,
        }
    }

    pub(crate) fn set_tiles(&mut self, total: usize) {
        self.tiles_total = total;
    }

    pub(crate) fn report(&self, percent: u8) {
        let Some(sink) = self.sink else {
            return;
        };
        let percent = percent.min(checkpoint::DONE);
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.is_some_and(|prev| percent <= prev) {
            return;
        }
        *last = Some(percent);
        sink.report(percent);
    }

    /// Advances the per-tile counter between the `TILED` and `SCORED` checkpoints.
    pub(crate) fn tile_done(&self) {
        let done = self.tiles_done.fetch_add(1, Ordering::Relaxed) + 1;
        if self.tiles_total == 0 {
            return;
        }
        let span = usize::from(checkpoint::SCORED - checkpoint::TILED);
        let step = span * done.min(self.tiles_total) / self.tiles_total;
        self.report(checkpoint::TILED + step as u8);
    }
}

/// Cooperative cancellation flag, checked between tiles and between passes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; in-flight tiles finish, no new tile starts.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, Progress, ProgressSink};
    use std::sync::Mutex;

    #[test]
    fn progress_never_decreases() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);
        let progress = Progress::new(Some(&sink as &dyn ProgressSink));
        progress.report(0);
        progress.report(10);
        progress.report(5);
        progress.report(10);
        progress.report(200);
        assert_eq!(*seen.lock().unwrap(), vec![0, 10, 100]);
    }

    #[test]
    fn tile_progress_spans_scoring_range() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);
        let mut progress = Progress::new(Some(&sink as &dyn ProgressSink));
        progress.set_tiles(2);
        progress.tile_done();
        progress.tile_done();
        assert_eq!(*seen.lock().unwrap(), vec![45, 80]);
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
