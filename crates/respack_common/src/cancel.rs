//! Cooperative cancellation for long-running directory walks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared "running" flag.
///
/// Clones share the same flag. Walkers poll [`is_running`](Self::is_running)
/// between units of work; clearing the flag lets in-flight work finish but
/// prevents new work from starting. Cancellation is not an error.
#[derive(Debug, Clone)]
pub struct CancelToken {
    running: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the running state.
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns `true` until [`cancel`](Self::cancel) has been called.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Clears the running flag for every clone of this token.
    pub fn cancel(&self) {
        if self.running.swap(false, Ordering::Relaxed) {
            tracing::debug!("cancellation requested");
        }
    }

    /// Puts the token back into the running state.
    pub fn reset(&self) {
        self.running.store(true, Ordering::Relaxed);
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
