/*!
 * ID Generation System
 * Type-safe identities for ordered locks and logical tasks
 *
 * Identities are never recycled: lock ordering and task isolation both rely on
 * an id meaning one object for the whole life of the process.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Type-Safe ID Wrappers
// ============================================================================

/// Identity of a `RankedMutex`, defines the global lock order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(pub u64);

/// Identity of a logical task (not of the worker thread running it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock#{}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

// ============================================================================
// ID Generator Trait
// ============================================================================

/// Generic ID generator interface
pub trait IdGenerator<T> {
    /// Generate next ID
    fn next(&self) -> T;

    /// Get current counter value (for debugging)
    fn current(&self) -> T;
}

// ============================================================================
// Atomic Counter Generator
// ============================================================================

/// Monotonic atomic generator
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - Lock-free, usable from `static`
#[repr(C, align(64))]
pub struct AtomicGenerator<T> {
    counter: AtomicU64,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> AtomicGenerator<T> {
    /// Create new generator starting at given value
    #[inline]
    pub const fn new(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
            _marker: std::marker::PhantomData,
        }
    }
}

impl IdGenerator<LockId> for AtomicGenerator<LockId> {
    #[inline]
    fn next(&self) -> LockId {
        LockId(self.counter.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    fn current(&self) -> LockId {
        LockId(self.counter.load(Ordering::Relaxed))
    }
}

impl IdGenerator<TaskId> for AtomicGenerator<TaskId> {
    #[inline]
    fn next(&self) -> TaskId {
        TaskId(self.counter.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    fn current(&self) -> TaskId {
        TaskId(self.counter.load(Ordering::Relaxed))
    }
}

static LOCK_IDS: AtomicGenerator<LockId> = AtomicGenerator::new(1);
static TASK_IDS: AtomicGenerator<TaskId> = AtomicGenerator::new(1);

/// Allocate a process-unique lock id
#[inline]
pub fn next_lock_id() -> LockId {
    LOCK_IDS.next()
}

/// Allocate a process-unique task id
#[inline]
pub fn next_task_id() -> TaskId {
    TASK_IDS.next()
}
