/*!
 * Fair lock tests
 */

use ai_os_sync::{CancelToken, FairLock, SyncError, TimeoutPolicy};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

fn wait_for_waiters<T>(lock: &FairLock<T>, n: usize) {
    let start = Instant::now();
    while lock.waiters() != n {
        assert!(start.elapsed() < Duration::from_secs(5), "expected {} waiters", n);
        thread::sleep(Duration::from_millis(1));
    }
}

fn queue_recorder(lock: &Arc<FairLock<Vec<usize>>>, id: usize) -> JoinHandle<()> {
    let lock = Arc::clone(lock);
    thread::spawn(move || lock.lock().push(id))
}

#[test]
fn test_waiters_granted_in_arrival_order() {
    let lock = Arc::new(FairLock::new(Vec::new()));
    let holder = lock.lock();

    let handles: Vec<_> = (0..8)
        .map(|id| {
            let handle = queue_recorder(&lock, id);
            wait_for_waiters(&lock, id + 1);
            handle
        })
        .collect();

    drop(holder);
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*lock.lock(), (0..8).collect::<Vec<_>>());
    let stats = lock.stats();
    assert_eq!(stats.contended, 8);
    assert_eq!(stats.timeouts, 0);
}

#[test]
fn test_fast_reacquirer_cannot_overtake_waiter() {
    const WAITER: usize = 0;
    const HAMMER: usize = 1;

    let lock = Arc::new(FairLock::new(Vec::new()));
    let stop = Arc::new(AtomicBool::new(false));
    let holder = lock.lock();

    let waiter = queue_recorder(&lock, WAITER);
    wait_for_waiters(&lock, 1);

    // Hammer arrives after the waiter and re-locks in a tight loop
    let hammer = {
        let lock = Arc::clone(&lock);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                lock.lock().push(HAMMER);
            }
        })
    };
    wait_for_waiters(&lock, 2);

    drop(holder);
    waiter.join().unwrap();
    stop.store(true, Ordering::Relaxed);
    hammer.join().unwrap();

    assert_eq!(lock.lock().first(), Some(&WAITER));
}

#[test]
fn test_try_lock_does_not_barge() {
    let lock = Arc::new(FairLock::new(Vec::new()));
    let holder = lock.lock();
    let waiter = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || {
            let mut guard = lock.lock();
            guard.push(7);
            thread::sleep(Duration::from_millis(50));
        })
    };
    wait_for_waiters(&lock, 1);
    assert!(lock.try_lock().is_none());

    drop(holder);
    // Ownership already passed to the queued waiter during release
    assert!(lock.try_lock().is_none());

    waiter.join().unwrap();
    assert_eq!(*lock.try_lock().unwrap(), vec![7]);
}

#[test]
fn test_cancelled_middle_waiter_preserves_order() {
    let lock = Arc::new(FairLock::new(Vec::new()));
    let holder = lock.lock();

    let first = queue_recorder(&lock, 1);
    wait_for_waiters(&lock, 1);

    let token = CancelToken::new();
    let middle = {
        let lock = Arc::clone(&lock);
        let token = token.clone();
        thread::spawn(move || lock.lock_cancellable(&token, TimeoutPolicy::None).map(|mut g| g.push(2)))
    };
    wait_for_waiters(&lock, 2);

    let last = queue_recorder(&lock, 3);
    wait_for_waiters(&lock, 3);

    token.cancel();
    let cancelled = middle.join().unwrap();
    assert!(matches!(cancelled, Err(SyncError::Cancelled { .. })));
    wait_for_waiters(&lock, 2);

    drop(holder);
    first.join().unwrap();
    last.join().unwrap();

    assert_eq!(*lock.lock(), vec![1, 3]);
    assert_eq!(lock.stats().cancellations, 1);
}

#[test]
fn test_timed_out_waiter_leaves_others_queued() {
    let lock = Arc::new(FairLock::new(Vec::new()));
    let holder = lock.lock();

    let impatient = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || lock.lock_timeout(Duration::from_millis(30)).map(|_| ()))
    };
    wait_for_waiters(&lock, 1);
    let patient = queue_recorder(&lock, 9);
    wait_for_waiters(&lock, 2);

    let result = impatient.join().unwrap();
    assert!(matches!(result, Err(SyncError::Timeout { .. })));

    drop(holder);
    patient.join().unwrap();
    assert_eq!(*lock.lock(), vec![9]);
}

#[test]
fn test_panic_while_held_does_not_poison() {
    let lock = Arc::new(FairLock::new(0));
    let crashing = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || {
            let _guard = lock.lock();
            panic!("holder crashed");
        })
    };
    assert!(crashing.join().is_err());

    assert!(!lock.is_locked());
    *lock.lock() += 1;
    assert_eq!(*lock.lock(), 1);
}

#[test]
fn test_huge_timeout_behaves_as_unbounded() {
    let lock = Arc::new(FairLock::new(0u32));
    let held = lock.lock();

    let waiter = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || {
            let mut guard = lock.lock_timeout(Duration::MAX)?;
            *guard += 1;
            Ok::<_, SyncError>(())
        })
    };
    wait_for_waiters(&lock, 1);
    drop(held);
    assert_eq!(waiter.join().unwrap(), Ok(()));

    let token = CancelToken::new();
    let held = lock.lock();
    let waiter = {
        let (lock, token) = (Arc::clone(&lock), token.clone());
        thread::spawn(move || lock.lock_cancellable(&token, Duration::MAX).map(|g| *g))
    };
    wait_for_waiters(&lock, 1);
    drop(held);
    assert_eq!(waiter.join().unwrap(), Ok(1));
}
