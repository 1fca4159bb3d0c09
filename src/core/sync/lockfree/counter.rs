/*!
 * Atomic Counter
 * Lock-free increment/read counter with no lost updates
 */

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically incrementing shared counter
///
/// Every increment is a single hardware read-modify-write, so N concurrent
/// increments from any number of threads always sum to exactly N.
///
/// # Performance
///
/// - **Lock-free**: never blocks, safe for unbounded concurrent callers
/// - **Cache-line aligned**: adjacent counters don't false-share
///
/// # Example
///
/// ```
/// use ai_os_sync::AtomicCounter;
///
/// let counter = AtomicCounter::new();
/// counter.increment();
/// assert_eq!(counter.increment_and_get(), 2);
/// assert_eq!(counter.get(), 2);
/// ```
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    #[inline]
    pub const fn new() -> Self {
        Self::with_initial(0)
    }

    #[inline]
    pub const fn with_initial(initial: u64) -> Self {
        Self {
            value: AtomicU64::new(initial),
        }
    }

    /// Atomically add 1
    #[inline(always)]
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::AcqRel);
    }

    /// Atomically add 1 and return the new value
    #[inline(always)]
    pub fn increment_and_get(&self) -> u64 {
        self.value.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Atomically add `delta` and return the new value
    #[inline]
    pub fn add(&self, delta: u64) -> u64 {
        self.value.fetch_add(delta, Ordering::AcqRel).wrapping_add(delta)
    }

    /// Current value
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Swap to zero, returning the value it held
    #[inline]
    pub fn reset(&self) -> u64 {
        self.value.swap(0, Ordering::AcqRel)
    }
}
