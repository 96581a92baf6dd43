//! Cooperative cancellation for traversal and watch operations.
//!
//! A [`Cancellation`] is a cheap clonable handle around a shared flag,
//! optionally combined with a deadline. The engine polls it at its
//! suspension points: before enqueuing a task, before a worker picks one
//! up, and inside the enumeration step. Timeouts are expressed as a
//! cancellation handle carrying a deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation handle.
///
/// Clones observe the same flag; cancelling any clone cancels them all.
/// The deadline, when present, is fixed at construction.
#[derive(Debug, Clone)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A handle that only cancels when [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// A handle that also reports cancelled once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Derive a handle sharing this flag but bounded by `timeout`.
    pub fn deadline(&self, timeout: Duration) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Time remaining until the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_propagates_to_clones() {
        let cancel = Cancellation::new();
        let clone = cancel.clone();
        assert!(!clone.is_cancelled());

        cancel.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_deadline_expiry() {
        let cancel = Cancellation::with_timeout(Duration::from_millis(0));
        assert!(cancel.is_cancelled());

        let cancel = Cancellation::with_timeout(Duration::from_secs(3600));
        assert!(!cancel.is_cancelled());
        assert!(cancel.remaining().unwrap() > Duration::from_secs(3000));
    }

    #[test]
    fn test_derived_deadline_shares_flag() {
        let cancel = Cancellation::new();
        let bounded = cancel.deadline(Duration::from_secs(3600));
        assert!(!bounded.is_cancelled());

        cancel.cancel();
        assert!(bounded.is_cancelled());
    }
}
