/*!
 * Fair (FIFO) Lock
 *
 * Mutual exclusion with a strict no-starvation guarantee.
 *
 * # Design: Ticket Queue With Direct Hand-Off
 *
 * Every contended requester takes a ticket and joins a FIFO queue. On release
 * the lock is not merely "freed": ownership is assigned to the queue head
 * while the state mutex is held, then waiters are woken. A thread that
 * arrives later (or re-locks in a tight loop) therefore finds the lock
 * already owned and has to queue behind everyone before it.
 *
 * State machine per lock:
 *
 * ```text
 * Free --request--> Granted(R)              (queue empty)
 * Granted(H) --request(R)--> Waiting(R, position)
 * Granted(H) --release--> Granted(queue.pop_front()) | Free
 * Waiting(R) --timeout/cancel--> removed from queue (others keep order)
 * ```
 *
 * Invariant: `holder.is_none()` implies the queue is empty.
 *
 * Priority hints play no part here. Grant order is arrival order, full stop.
 */

use crate::core::errors::SyncResult;
use crate::core::guard::{double_release, Guard, GuardMetadata, TimeoutContext, TimeoutPolicy};
use crate::core::sync::{CancelToken, SyncConfig};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const RESOURCE: &str = "fair_lock";

struct FairState {
    /// Ticket currently owning the lock
    holder: Option<u64>,
    /// Waiting tickets in arrival order
    queue: VecDeque<u64>,
    next_ticket: u64,
}

impl FairState {
    #[inline]
    fn issue(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        ticket
    }

    fn abandon(&mut self, ticket: u64) {
        if let Some(pos) = self.queue.iter().position(|&t| t == ticket) {
            self.queue.remove(pos);
        }
    }
}

#[derive(Default)]
struct Counters {
    acquisitions: AtomicU64,
    contended: AtomicU64,
    timeouts: AtomicU64,
    cancellations: AtomicU64,
}

/// Point-in-time lock statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairLockStats {
    /// Successful acquisitions (fast path and queued)
    pub acquisitions: u64,
    /// Acquisitions that had to queue
    pub contended: u64,
    pub timeouts: u64,
    pub cancellations: u64,
}

/// FIFO-fair mutual exclusion lock
///
/// # Example
///
/// ```
/// use ai_os_sync::FairLock;
/// use std::time::Duration;
///
/// let lock = FairLock::new(0);
/// *lock.lock() += 1;
///
/// let guard = lock.lock_timeout(Duration::from_millis(10)).unwrap();
/// assert_eq!(*guard, 1);
/// ```
pub struct FairLock<T> {
    state: Mutex<FairState>,
    granted: Condvar,
    poll_interval: Duration,
    counters: Counters,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by the ticket protocol; only the
// guard whose ticket equals `holder` dereferences it.
unsafe impl<T: Send> Send for FairLock<T> {}
unsafe impl<T: Send> Sync for FairLock<T> {}

impl<T> FairLock<T> {
    /// Create with the process-wide configuration
    pub fn new(value: T) -> Self {
        Self::with_config(value, &crate::core::sync::global_config())
    }

    pub fn with_config(value: T, config: &SyncConfig) -> Self {
        Self {
            state: Mutex::new(FairState {
                holder: None,
                queue: VecDeque::new(),
                next_ticket: 0,
            }),
            granted: Condvar::new(),
            poll_interval: config.cancel_poll_interval,
            counters: Counters::default(),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire, waiting in arrival order
    pub fn lock(&self) -> FairLockGuard<'_, T> {
        match self.acquire(TimeoutPolicy::None, None) {
            Ok(guard) => guard,
            // Unbounded and uncancellable waits only end in a grant
            Err(e) => unreachable!("unbounded fair lock wait failed: {}", e),
        }
    }

    /// Acquire with a bounded wait
    ///
    /// On expiry the requester leaves the queue and `SyncError::Timeout` is
    /// returned. Nothing is retried.
    pub fn lock_timeout(&self, timeout: impl Into<TimeoutPolicy>) -> SyncResult<FairLockGuard<'_, T>> {
        self.acquire(timeout.into(), None)
    }

    /// Acquire with a bounded wait that also observes `token`
    pub fn lock_cancellable(
        &self,
        token: &CancelToken,
        timeout: impl Into<TimeoutPolicy>,
    ) -> SyncResult<FairLockGuard<'_, T>> {
        self.acquire(timeout.into(), Some(token))
    }

    /// Acquire only if free *and* nobody is queued
    ///
    /// Never barges past waiters and never blocks on the lock itself.
    pub fn try_lock(&self) -> Option<FairLockGuard<'_, T>> {
        let mut state = self.state.lock();
        if state.holder.is_some() || !state.queue.is_empty() {
            return None;
        }
        let ticket = state.issue();
        state.holder = Some(ticket);
        drop(state);

        self.counters.acquisitions.fetch_add(1, Ordering::Relaxed);
        Some(FairLockGuard::new(self, ticket, Instant::now()))
    }

    fn acquire(
        &self,
        timeout: TimeoutPolicy,
        token: Option<&CancelToken>,
    ) -> SyncResult<FairLockGuard<'_, T>> {
        let ctx = TimeoutContext::new(timeout, RESOURCE);
        let mut state = self.state.lock();

        // Fast path: free and nobody ahead of us
        if state.holder.is_none() {
            debug_assert!(state.queue.is_empty());
            let ticket = state.issue();
            state.holder = Some(ticket);
            drop(state);

            self.counters.acquisitions.fetch_add(1, Ordering::Relaxed);
            return Ok(FairLockGuard::new(self, ticket, Instant::now()));
        }

        if let Some(token) = token {
            if token.is_cancelled() {
                drop(state);
                self.counters.cancellations.fetch_add(1, Ordering::Relaxed);
                return Err(ctx.cancelled_error());
            }
        }

        let ticket = state.issue();
        state.queue.push_back(ticket);
        self.counters.contended.fetch_add(1, Ordering::Relaxed);
        debug!(ticket, position = state.queue.len(), "Queued for fair lock");

        let waited_since = Instant::now();
        loop {
            // Grant is checked first: a hand-off that raced a timeout still wins
            if state.holder == Some(ticket) {
                break;
            }

            if token.is_some_and(CancelToken::is_cancelled) {
                state.abandon(ticket);
                drop(state);
                self.counters.cancellations.fetch_add(1, Ordering::Relaxed);
                warn!(ticket, "Fair lock wait cancelled");
                return Err(ctx.cancelled_error());
            }

            if ctx.is_expired() {
                state.abandon(ticket);
                drop(state);
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    ticket,
                    policy = ctx.policy().category(),
                    elapsed_ms = ctx.elapsed().as_millis() as u64,
                    "Fair lock wait timed out"
                );
                return Err(ctx.timeout_error());
            }

            // With a token we must wake periodically to re-check it
            let poll_at = token.and_then(|_| Instant::now().checked_add(self.poll_interval));
            let wake_at = match (ctx.deadline(), poll_at) {
                (Some(d), Some(p)) => Some(d.min(p)),
                (d, p) => d.or(p),
            };

            match wake_at {
                Some(at) => {
                    self.granted.wait_until(&mut state, at);
                }
                None => self.granted.wait(&mut state),
            }
        }
        drop(state);

        self.counters.acquisitions.fetch_add(1, Ordering::Relaxed);
        debug!(ticket, waited_us = waited_since.elapsed().as_micros() as u64, "Fair lock granted");
        Ok(FairLockGuard::new(self, ticket, waited_since))
    }

    /// Hand the lock to the next ticket in line
    fn release(&self, ticket: u64) {
        let mut state = self.state.lock();
        assert_eq!(
            state.holder,
            Some(ticket),
            "fair lock released by non-holder"
        );
        state.holder = state.queue.pop_front();
        let handed_off = state.holder.is_some();
        drop(state);

        if handed_off {
            // Waiters share one condvar; each checks whether it is the new holder
            self.granted.notify_all();
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().holder.is_some()
    }

    /// Number of queued requesters
    pub fn waiters(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn stats(&self) -> FairLockStats {
        FairLockStats {
            acquisitions: self.counters.acquisitions.load(Ordering::Relaxed),
            contended: self.counters.contended.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            cancellations: self.counters.cancellations.load(Ordering::Relaxed),
        }
    }

    /// Exclusive access without locking (requires `&mut self`)
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for FairLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Scoped ownership of a `FairLock`
///
/// Dropping the guard hands the lock to the next waiter, on every exit path
/// including unwinding.
#[must_use = "guard will be immediately released if not held"]
pub struct FairLockGuard<'a, T> {
    lock: &'a FairLock<T>,
    ticket: u64,
    active: bool,
    metadata: GuardMetadata,
    // Send/Sync follow &mut T, like std's MutexGuard data access
    _data: PhantomData<&'a mut T>,
}

impl<'a, T> FairLockGuard<'a, T> {
    fn new(lock: &'a FairLock<T>, ticket: u64, waited_since: Instant) -> Self {
        Self {
            lock,
            ticket,
            active: true,
            metadata: GuardMetadata::new(RESOURCE).with_wait(waited_since),
            _data: PhantomData,
        }
    }

    /// Queue ticket this guard was granted under
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    #[inline]
    fn check_active(&self) {
        assert!(self.active, "fair lock guard used after release");
    }
}

impl<T> Deref for FairLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.check_active();
        // SAFETY: this guard's ticket is the holder
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for FairLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.check_active();
        // SAFETY: this guard's ticket is the holder
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Guard for FairLockGuard<'_, T> {
    fn resource_type(&self) -> &'static str {
        RESOURCE
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> SyncResult<()> {
        if !self.active {
            return Err(double_release(&*self));
        }
        self.active = false;
        self.lock.release(self.ticket);
        Ok(())
    }
}

impl<T> Drop for FairLockGuard<'_, T> {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            self.lock.release(self.ticket);
        }
    }
}
