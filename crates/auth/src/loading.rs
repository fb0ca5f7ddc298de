//! Loading indicator tracking
//!
//! Every network-bearing operation holds a [`LoadingGuard`]. Nested
//! operations share one depth counter, so the loading cell only drops back to
//! `false` when the outermost guard is released, on any exit path including
//! cancellation of the owning future.

use std::sync::Arc;

use parking_lot::Mutex;
use sessionkit_common::signal::Signal;

/// Depth counter driving a boolean loading cell
#[derive(Debug, Clone)]
pub struct LoadingTracker {
    depth: Arc<Mutex<usize>>,
    cell: Signal<bool>,
}

impl LoadingTracker {
    #[must_use]
    pub fn new(cell: Signal<bool>) -> Self {
        Self { depth: Arc::new(Mutex::new(0)), cell }
    }

    /// Mark an operation as started
    ///
    /// The cell is assigned `true` on every call so listeners that react to
    /// the transition (such as clearing a previous error) run for each
    /// operation.
    #[must_use = "loading is cleared when the guard is dropped"]
    pub fn begin(&self) -> LoadingGuard {
        *self.depth.lock() += 1;
        self.cell.set(true);
        LoadingGuard { tracker: self.clone() }
    }

    /// Number of operations currently holding a guard
    #[must_use]
    pub fn depth(&self) -> usize {
        *self.depth.lock()
    }

    fn end(&self) {
        let remaining = {
            let mut depth = self.depth.lock();
            *depth = depth.saturating_sub(1);
            *depth
        };
        if remaining == 0 {
            self.cell.set(false);
        }
    }
}

/// Releases its share of the loading state when dropped
#[derive(Debug)]
pub struct LoadingGuard {
    tracker: LoadingTracker,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.tracker.end();
    }
}
