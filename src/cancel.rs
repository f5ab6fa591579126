//! Cooperative cancellation for traversals

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation signal threaded through every visit.
///
/// Clones share the same flag, so a caller can keep one clone and cancel a
/// traversal running on another task. An optional deadline turns the token
/// into a timeout.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that never fires
    pub fn none() -> Self {
        Self::default()
    }

    /// Token that also reports cancellation once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().timeout_after(timeout)
    }

    /// Attach a deadline to this token. Each clone made afterwards carries
    /// its own copy of the deadline; clones made earlier never see it, except
    /// through the shared flag once a clone with the deadline observes it.
    pub fn timeout_after(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel();
                true
            }
            _ => false,
        }
    }
}
