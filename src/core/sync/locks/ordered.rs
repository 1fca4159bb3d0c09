/*!
 * Ordered Lock Acquisition
 *
 * Deadlock avoidance by a fixed, process-wide lock order.
 *
 * Two forms:
 * - `OrderedLockPair<A, B>`: the order is structural. Every path that needs
 *   both halves goes through the pair, which always takes `first` then
 *   `second`. Nested hand-written locking is not possible.
 * - `RankedMutex<T>`: for locks whose pairing is only known at runtime. Each
 *   mutex carries a `LockId`; `acquire_pair` / `acquire_all` lock in
 *   ascending id regardless of argument order.
 *
 * Both forms have `_timeout` and `_cancellable` variants. These wait in
 * slices of `cancel_poll_interval` when a `CancelToken` is supplied. On
 * timeout or cancellation every lock already held is released before the
 * error is returned.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::guard::{double_release, Guard, GuardMetadata, TimeoutContext, TimeoutPolicy};
use crate::core::id::{next_lock_id, LockId};
use crate::core::sync::{CancelToken, SyncConfig};
use parking_lot::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

const PAIR_RESOURCE: &str = "lock_pair";
const RANKED_RESOURCE: &str = "ranked_mutex";

/// Lock `mutex` within the context's deadline, observing `token`
pub(crate) fn lock_within<'a, T>(
    mutex: &'a Mutex<T>,
    ctx: &TimeoutContext,
    token: Option<&CancelToken>,
    poll_interval: Duration,
) -> SyncResult<MutexGuard<'a, T>> {
    if let Some(guard) = mutex.try_lock() {
        return Ok(guard);
    }

    loop {
        if token.is_some_and(CancelToken::is_cancelled) {
            return Err(ctx.cancelled_error());
        }

        let poll_at = token.and_then(|_| Instant::now().checked_add(poll_interval));
        let wake_at = match (ctx.deadline(), poll_at) {
            (Some(d), Some(p)) => Some(d.min(p)),
            (d, p) => d.or(p),
        };

        let attempt = match wake_at {
            Some(at) => mutex.try_lock_until(at),
            None => Some(mutex.lock()),
        };
        if let Some(guard) = attempt {
            return Ok(guard);
        }

        if ctx.is_expired() {
            return Err(ctx.timeout_error());
        }
    }
}

// ============================================================================
// OrderedLockPair
// ============================================================================

/// Two mutexes that can only be acquired together, in a fixed order
///
/// # Example
///
/// ```
/// use ai_os_sync::OrderedLockPair;
///
/// let pair = OrderedLockPair::new(vec![1, 2], 0usize);
/// pair.with_both(|items, total| *total = items.iter().sum());
/// assert_eq!(*pair.acquire_both().second(), 3);
/// ```
pub struct OrderedLockPair<A, B> {
    lock1: Mutex<A>,
    lock2: Mutex<B>,
    poll_interval: Duration,
}

impl<A, B> OrderedLockPair<A, B> {
    pub fn new(a: A, b: B) -> Self {
        Self::with_config(a, b, &crate::core::sync::global_config())
    }

    pub fn with_config(a: A, b: B, config: &SyncConfig) -> Self {
        Self {
            lock1: Mutex::new(a),
            lock2: Mutex::new(b),
            poll_interval: config.cancel_poll_interval,
        }
    }

    /// Block until both halves are held (first, then second)
    pub fn acquire_both(&self) -> PairGuard<'_, A, B> {
        let start = Instant::now();
        let first = self.lock1.lock();
        let second = self.lock2.lock();
        trace!("Lock pair acquired");
        PairGuard::new(first, second, start)
    }

    /// Acquire both within one deadline covering the two acquisitions
    pub fn acquire_both_timeout(
        &self,
        timeout: impl Into<TimeoutPolicy>,
    ) -> SyncResult<PairGuard<'_, A, B>> {
        self.acquire_bounded(timeout.into(), None)
    }

    /// Like `acquire_both_timeout`, also exiting when `token` fires
    pub fn acquire_both_cancellable(
        &self,
        token: &CancelToken,
        timeout: impl Into<TimeoutPolicy>,
    ) -> SyncResult<PairGuard<'_, A, B>> {
        self.acquire_bounded(timeout.into(), Some(token))
    }

    fn acquire_bounded(
        &self,
        timeout: TimeoutPolicy,
        token: Option<&CancelToken>,
    ) -> SyncResult<PairGuard<'_, A, B>> {
        let start = Instant::now();
        let ctx = TimeoutContext::new(timeout, PAIR_RESOURCE);

        let first = lock_within(&self.lock1, &ctx, token, self.poll_interval)
            .inspect_err(|e| {
                warn!(half = "first", policy = timeout.category(), error = %e, "Lock pair acquisition failed")
            })?;

        // On failure `first` drops here, so the half already held is released
        let second = lock_within(&self.lock2, &ctx, token, self.poll_interval)
            .inspect_err(|e| {
                warn!(half = "second", policy = timeout.category(), error = %e, "Lock pair acquisition failed")
            })?;

        Ok(PairGuard::new(first, second, start))
    }

    /// Run `f` with both halves held; released on every exit path
    pub fn with_both<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut A, &mut B) -> R,
    {
        let mut guard = self.acquire_both();
        let (a, b) = guard.both_mut();
        f(a, b)
    }

    pub fn into_inner(self) -> (A, B) {
        (self.lock1.into_inner(), self.lock2.into_inner())
    }
}

/// Both halves of an `OrderedLockPair`
///
/// Released second-then-first, the reverse of acquisition.
#[must_use = "guard will be immediately released if not held"]
pub struct PairGuard<'a, A, B> {
    first: Option<MutexGuard<'a, A>>,
    second: Option<MutexGuard<'a, B>>,
    metadata: GuardMetadata,
}

impl<'a, A, B> PairGuard<'a, A, B> {
    fn new(first: MutexGuard<'a, A>, second: MutexGuard<'a, B>, waited_since: Instant) -> Self {
        Self {
            first: Some(first),
            second: Some(second),
            metadata: GuardMetadata::new(PAIR_RESOURCE).with_wait(waited_since),
        }
    }

    pub fn first(&self) -> &A {
        match &self.first {
            Some(guard) => &**guard,
            None => released(),
        }
    }

    pub fn first_mut(&mut self) -> &mut A {
        match &mut self.first {
            Some(guard) => &mut **guard,
            None => released(),
        }
    }

    pub fn second(&self) -> &B {
        match &self.second {
            Some(guard) => &**guard,
            None => released(),
        }
    }

    pub fn second_mut(&mut self) -> &mut B {
        match &mut self.second {
            Some(guard) => &mut **guard,
            None => released(),
        }
    }

    /// Both halves mutably at once
    pub fn both_mut(&mut self) -> (&mut A, &mut B) {
        match (&mut self.first, &mut self.second) {
            (Some(a), Some(b)) => (&mut **a, &mut **b),
            _ => released(),
        }
    }

    fn unlock(&mut self) {
        self.second.take();
        self.first.take();
    }
}

#[cold]
fn released() -> ! {
    panic!("lock pair guard used after release")
}

impl<A, B> Guard for PairGuard<'_, A, B> {
    fn resource_type(&self) -> &'static str {
        PAIR_RESOURCE
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.first.is_some()
    }

    fn release(&mut self) -> SyncResult<()> {
        if !self.is_active() {
            return Err(double_release(&*self));
        }
        self.unlock();
        Ok(())
    }
}

impl<A, B> Drop for PairGuard<'_, A, B> {
    fn drop(&mut self) {
        // Field order would drop `first` before `second`
        self.unlock();
    }
}

// ============================================================================
// RankedMutex
// ============================================================================

/// Mutex with a process-unique rank used to order multi-lock acquisitions
///
/// # Example
///
/// ```
/// use ai_os_sync::{acquire_pair, RankedMutex};
///
/// let from = RankedMutex::new(100);
/// let to = RankedMutex::new(0);
///
/// // Argument order does not matter; lower id is locked first
/// let (mut a, mut b) = acquire_pair(&to, &from).unwrap();
/// *b -= 40;
/// *a += 40;
/// ```
#[derive(Debug)]
pub struct RankedMutex<T> {
    id: LockId,
    inner: Mutex<T>,
}

impl<T> RankedMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            id: next_lock_id(),
            inner: Mutex::new(value),
        }
    }

    /// Rank in the global lock order
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Lock this mutex alone
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Default> Default for RankedMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Lock two ranked mutexes in ascending id order
///
/// Guards come back in argument order. Passing the same mutex twice returns
/// `SyncError::SameResource`.
pub fn acquire_pair<'a, T, U>(
    x: &'a RankedMutex<T>,
    y: &'a RankedMutex<U>,
) -> SyncResult<(MutexGuard<'a, T>, MutexGuard<'a, U>)> {
    acquire_pair_bounded(x, y, TimeoutPolicy::None, None)
}

/// `acquire_pair` with one deadline covering both locks
pub fn acquire_pair_timeout<'a, T, U>(
    x: &'a RankedMutex<T>,
    y: &'a RankedMutex<U>,
    timeout: impl Into<TimeoutPolicy>,
) -> SyncResult<(MutexGuard<'a, T>, MutexGuard<'a, U>)> {
    acquire_pair_bounded(x, y, timeout.into(), None)
}

/// `acquire_pair_timeout` that also exits when `token` fires
pub fn acquire_pair_cancellable<'a, T, U>(
    x: &'a RankedMutex<T>,
    y: &'a RankedMutex<U>,
    token: &CancelToken,
    timeout: impl Into<TimeoutPolicy>,
) -> SyncResult<(MutexGuard<'a, T>, MutexGuard<'a, U>)> {
    acquire_pair_bounded(x, y, timeout.into(), Some(token))
}

fn acquire_pair_bounded<'a, T, U>(
    x: &'a RankedMutex<T>,
    y: &'a RankedMutex<U>,
    timeout: TimeoutPolicy,
    token: Option<&CancelToken>,
) -> SyncResult<(MutexGuard<'a, T>, MutexGuard<'a, U>)> {
    if x.id == y.id {
        return Err(SyncError::SameResource { id: x.id.0 });
    }

    let ctx = TimeoutContext::new(timeout, RANKED_RESOURCE);
    let poll = crate::core::sync::global_config().cancel_poll_interval;

    // A failed second lock drops the first guard before returning
    let acquired = if x.id < y.id {
        lock_within(&x.inner, &ctx, token, poll)
            .and_then(|gx| lock_within(&y.inner, &ctx, token, poll).map(|gy| (gx, gy)))
    } else {
        lock_within(&y.inner, &ctx, token, poll)
            .and_then(|gy| lock_within(&x.inner, &ctx, token, poll).map(|gx| (gx, gy)))
    };
    let pair = acquired.inspect_err(|e| {
        warn!(x = %x.id, y = %y.id, policy = timeout.category(), error = %e, "Ranked pair acquisition failed")
    })?;
    trace!(x = %x.id, y = %y.id, "Ranked pair acquired");
    Ok(pair)
}

/// Lock every mutex in ascending id order
///
/// Guards come back in argument order. Duplicates return
/// `SyncError::SameResource`.
pub fn acquire_all<'a, T>(locks: &[&'a RankedMutex<T>]) -> SyncResult<Vec<MutexGuard<'a, T>>> {
    acquire_all_bounded(locks, TimeoutPolicy::None, None)
}

/// `acquire_all` with one deadline covering the whole set
pub fn acquire_all_timeout<'a, T>(
    locks: &[&'a RankedMutex<T>],
    timeout: impl Into<TimeoutPolicy>,
) -> SyncResult<Vec<MutexGuard<'a, T>>> {
    acquire_all_bounded(locks, timeout.into(), None)
}

/// `acquire_all_timeout` that also exits when `token` fires
pub fn acquire_all_cancellable<'a, T>(
    locks: &[&'a RankedMutex<T>],
    token: &CancelToken,
    timeout: impl Into<TimeoutPolicy>,
) -> SyncResult<Vec<MutexGuard<'a, T>>> {
    acquire_all_bounded(locks, timeout.into(), Some(token))
}

fn acquire_all_bounded<'a, T>(
    locks: &[&'a RankedMutex<T>],
    timeout: TimeoutPolicy,
    token: Option<&CancelToken>,
) -> SyncResult<Vec<MutexGuard<'a, T>>> {
    let mut order: Vec<usize> = (0..locks.len()).collect();
    order.sort_unstable_by_key(|&i| locks[i].id);

    if let Some(dup) = order.windows(2).find(|w| locks[w[0]].id == locks[w[1]].id) {
        return Err(SyncError::SameResource {
            id: locks[dup[0]].id.0,
        });
    }

    let ctx = TimeoutContext::new(timeout, RANKED_RESOURCE);
    let poll = crate::core::sync::global_config().cancel_poll_interval;

    // Returning early drops `slots`, releasing every guard taken so far
    let mut slots: Vec<Option<MutexGuard<'a, T>>> = (0..locks.len()).map(|_| None).collect();
    for (held, i) in order.into_iter().enumerate() {
        let lock: &'a RankedMutex<T> = locks[i];
        let guard = lock_within(&lock.inner, &ctx, token, poll).inspect_err(|e| {
            warn!(held, id = %lock.id, policy = timeout.category(), error = %e, "Ranked set acquisition failed")
        })?;
        slots[i] = Some(guard);
    }
    trace!(count = locks.len(), "Ranked set acquired");

    Ok(slots.into_iter().flatten().collect())
}
