//! Monotonic progress reporting for embedding and matching.
//!
//! Both long-running phases report `(completed, total)` through a shared
//! callback type. The matching engine additionally uses a
//! [`ProgressTracker`] to decide whether an accelerated run covered the
//! whole input or must be redone via the fallback path.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Progress callback invoked as `(completed, total)`.
///
/// Invocations are monotonic in `completed`. The callback may run on a
/// background worker or rayon thread, so it must be `Send + Sync`.
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Returns a callback that discards all progress updates.
pub fn silent() -> ProgressFn {
    Box::new(|_, _| {})
}

/// Shared completion counter for a fixed amount of work.
///
/// Workers call [`advance`](Self::advance) as units complete; the
/// tracker forwards the running total to an optional callback and can
/// be queried for completeness after a backend finishes.
pub struct ProgressTracker {
    completed: AtomicUsize,
    total: usize,
    callback: Option<ProgressFn>,
}

impl ProgressTracker {
    /// Creates a tracker for `total` units with no callback.
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
            callback: None,
        }
    }

    /// Creates a tracker that forwards updates to `callback`.
    pub fn with_callback(total: usize, callback: ProgressFn) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
            callback: Some(callback),
        }
    }

    /// Records `units` completed units and notifies the callback.
    pub fn advance(&self, units: usize) {
        let done = self.completed.fetch_add(units, Ordering::Relaxed) + units;
        if let Some(cb) = &self.callback {
            cb(done.min(self.total), self.total);
        }
    }

    /// Fraction of the work completed, in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        let done = self.completed.load(Ordering::Relaxed).min(self.total);
        done as f64 / self.total as f64
    }

    /// True once every unit has been recorded.
    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Relaxed) >= self.total
    }

    /// Clears the counter so the same work can be re-attempted.
    pub fn reset(&self) {
        self.completed.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_completes() {
        let tracker = ProgressTracker::new(10);
        assert!(!tracker.is_complete());
        tracker.advance(4);
        assert!((tracker.fraction() - 0.4).abs() < 1e-12);
        tracker.advance(6);
        assert!(tracker.is_complete());
    }

    #[test]
    fn test_tracker_reset() {
        let tracker = ProgressTracker::new(3);
        tracker.advance(3);
        assert!(tracker.is_complete());
        tracker.reset();
        assert!(!tracker.is_complete());
        assert_eq!(tracker.fraction(), 0.0);
    }

    #[test]
    fn test_zero_total_is_complete() {
        let tracker = ProgressTracker::new(0);
        assert!(tracker.is_complete());
        assert_eq!(tracker.fraction(), 1.0);
    }

    #[test]
    fn test_callback_sees_monotonic_counts() {
        use std::sync::Mutex;
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let tracker = ProgressTracker::with_callback(
            4,
            Box::new(move |done, total| {
                seen_cb.lock().unwrap().push((done, total));
            }),
        );
        tracker.advance(1);
        tracker.advance(2);
        tracker.advance(1);
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![(1, 4), (3, 4), (4, 4)]);
    }
}
