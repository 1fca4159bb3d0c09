/*!
 * Cancellation Tokens
 *
 * Cooperative cancellation for blocked lock waits. A waiter holding a token
 * re-checks it at least every `SyncConfig::cancel_poll_interval`; when it
 * fires, the waiter leaves the wait queue and returns `SyncError::Cancelled`.
 */

use crate::core::errors::{SyncError, SyncResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag
///
/// Clones observe the same flag. Cancellation is one-way.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every wait observing this token
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            tracing::debug!("Cancellation requested");
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the token has fired
    #[inline]
    pub fn checkpoint(&self, resource: &str) -> SyncResult<()> {
        if self.is_cancelled() {
            Err(SyncError::cancelled(resource))
        } else {
            Ok(())
        }
    }
}
