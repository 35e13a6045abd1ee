// context.rs — Request-scoped cancellation, threaded through every operation.
//
// Not a thread-local: the context is an explicit first-class parameter so
// callers always see where cancellation can interrupt a sequence of steps.
// The executor checks it between steps; a git operation that has already
// started runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::VcsError;

/// Cancellation scope for one logical operation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// A context that never expires and is only cancelled explicitly.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// A context that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Handle for cancelling this context from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Returns `VcsError::Cancelled` if the context is done.
    pub fn check(&self) -> Result<(), VcsError> {
        if self.is_cancelled() {
            Err(VcsError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancels the associated [`OperationContext`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
