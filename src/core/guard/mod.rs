/*!
 * Scoped Acquisition Guards
 *
 * Every lock in the crate hands out a guard that releases on every exit path:
 * normal return, early `?` return, and unwinding.
 *
 * ## Design Principles
 *
 * 1. **Release on drop**: no code path can forget to unlock
 * 2. **Explicit release is checked**: a second `release()` is reported, never ignored
 * 3. **Bounded waits are typed**: `TimeoutPolicy` instead of bare durations
 */

mod timeout;
mod traits;

pub use timeout::{TimeoutContext, TimeoutPolicy};
pub use traits::Guard;
pub(crate) use traits::double_release;

use std::time::Instant;

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: Instant,
    /// Time spent waiting before the guard was granted
    pub wait_micros: u64,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: Instant::now(),
            wait_micros: 0,
        }
    }

    #[inline]
    pub fn with_wait(mut self, waited_since: Instant) -> Self {
        self.wait_micros = waited_since.elapsed().as_micros() as u64;
        self
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
