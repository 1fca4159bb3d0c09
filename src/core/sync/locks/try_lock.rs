/*!
 * Try-Lock
 *
 * Non-blocking acquisition: either the lock is granted immediately or the
 * caller is told it is contended and chooses what to do (skip, back off and
 * retry with `Backoff`, take an alternate path). The lock never retries on
 * the caller's behalf.
 */

use crate::core::errors::SyncResult;
use crate::core::guard::{double_release, Guard, GuardMetadata};
use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const RESOURCE: &str = "try_lock";

/// Outcome of a non-blocking acquisition
#[derive(Debug)]
#[must_use = "a contended acquisition must be handled"]
pub enum Acquisition<G> {
    Acquired(G),
    Contended,
}

impl<G> Acquisition<G> {
    #[inline]
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }

    #[inline]
    pub fn is_contended(&self) -> bool {
        matches!(self, Self::Contended)
    }

    /// `Some(guard)` when acquired
    pub fn acquired(self) -> Option<G> {
        match self {
            Self::Acquired(guard) => Some(guard),
            Self::Contended => None,
        }
    }

    pub fn map<H, F: FnOnce(G) -> H>(self, f: F) -> Acquisition<H> {
        match self {
            Self::Acquired(guard) => Acquisition::Acquired(f(guard)),
            Self::Contended => Acquisition::Contended,
        }
    }
}

impl<G> From<Option<G>> for Acquisition<G> {
    fn from(guard: Option<G>) -> Self {
        guard.map_or(Self::Contended, Self::Acquired)
    }
}

/// Mutex exposing only non-blocking and bounded acquisition
///
/// # Example
///
/// ```
/// use ai_os_sync::{Acquisition, TryLock};
///
/// let lock = TryLock::new(0);
/// match lock.try_acquire() {
///     Acquisition::Acquired(mut guard) => *guard += 1,
///     Acquisition::Contended => unreachable!(),
/// }
///
/// let held = lock.try_acquire();
/// assert!(lock.try_acquire().is_contended());
/// drop(held);
/// ```
#[derive(Debug, Default)]
pub struct TryLock<T> {
    inner: Mutex<T>,
}

impl<T> TryLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Acquire if free; never blocks
    #[inline]
    pub fn try_acquire(&self) -> Acquisition<TryLockGuard<'_, T>> {
        match self.inner.try_lock() {
            Some(guard) => {
                trace!("Try-lock acquired");
                Acquisition::Acquired(TryLockGuard::new(guard, Instant::now()))
            }
            None => {
                debug!("Try-lock contended");
                Acquisition::Contended
            }
        }
    }

    /// Acquire if it becomes free within `timeout`
    pub fn try_acquire_for(&self, timeout: Duration) -> Acquisition<TryLockGuard<'_, T>> {
        let start = Instant::now();
        match self.inner.try_lock_for(timeout) {
            Some(guard) => Acquisition::Acquired(TryLockGuard::new(guard, start)),
            None => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Try-lock still contended at deadline");
                Acquisition::Contended
            }
        }
    }

    /// Run `f` under the lock, or `fallback` if it is contended
    ///
    /// The lock is released before returning on every path, including
    /// unwinding out of `f`.
    pub fn run_or_else<R>(&self, f: impl FnOnce(&mut T) -> R, fallback: impl FnOnce() -> R) -> R {
        match self.try_acquire() {
            Acquisition::Acquired(mut guard) => f(&mut guard),
            Acquisition::Contended => fallback(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// All-or-nothing attempt on two try-locks
///
/// Both are attempted without blocking; if the second is contended the first
/// is released before returning, so no caller ever holds half a pair. Since
/// neither attempt waits, argument order cannot deadlock.
pub fn try_acquire_pair<'a, A, B>(
    a: &'a TryLock<A>,
    b: &'a TryLock<B>,
) -> Acquisition<(TryLockGuard<'a, A>, TryLockGuard<'a, B>)> {
    let Acquisition::Acquired(first) = a.try_acquire() else {
        return Acquisition::Contended;
    };
    match b.try_acquire() {
        Acquisition::Acquired(second) => Acquisition::Acquired((first, second)),
        Acquisition::Contended => {
            drop(first);
            Acquisition::Contended
        }
    }
}

/// Ownership of a `TryLock`
#[must_use = "guard will be immediately released if not held"]
pub struct TryLockGuard<'a, T> {
    guard: Option<MutexGuard<'a, T>>,
    metadata: GuardMetadata,
}

impl<'a, T> TryLockGuard<'a, T> {
    fn new(guard: MutexGuard<'a, T>, waited_since: Instant) -> Self {
        Self {
            guard: Some(guard),
            metadata: GuardMetadata::new(RESOURCE).with_wait(waited_since),
        }
    }
}

impl<T> Deref for TryLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.guard {
            Some(guard) => &**guard,
            None => panic!("try-lock guard used after release"),
        }
    }
}

impl<T> DerefMut for TryLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.guard {
            Some(guard) => &mut **guard,
            None => panic!("try-lock guard used after release"),
        }
    }
}

impl<T> Guard for TryLockGuard<'_, T> {
    fn resource_type(&self) -> &'static str {
        RESOURCE
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.guard.is_some()
    }

    fn release(&mut self) -> SyncResult<()> {
        match self.guard.take() {
            Some(guard) => {
                drop(guard);
                Ok(())
            }
            None => Err(double_release(&*self)),
        }
    }
}
