/*!
 * Ordered lock acquisition tests
 */

use ai_os_sync::{
    acquire_all, acquire_all_cancellable, acquire_all_timeout, acquire_pair,
    acquire_pair_cancellable, acquire_pair_timeout, CancelToken, Guard, OrderedLockPair,
    RankedMutex, SyncError, TimeoutPolicy,
};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const ITERATIONS: usize = 10_000;

/// Run `f` on a thread, failing the test if it has not finished in `limit`
fn within<F>(limit: Duration, f: F)
where
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        f();
        let _ = tx.send(());
    });
    rx.recv_timeout(limit)
        .expect("operation did not finish in time (deadlock?)");
}

#[test]
fn test_opposite_argument_orders_never_deadlock() {
    within(Duration::from_secs(60), || {
        let x = Arc::new(RankedMutex::new(0u64));
        let y = Arc::new(RankedMutex::new(0u64));

        let forward = {
            let (x, y) = (Arc::clone(&x), Arc::clone(&y));
            thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    let (mut gx, mut gy) = acquire_pair(&*x, &*y).unwrap();
                    *gx += 1;
                    *gy += 1;
                }
            })
        };
        let backward = {
            let (x, y) = (Arc::clone(&x), Arc::clone(&y));
            thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    let (mut gy, mut gx) = acquire_pair(&*y, &*x).unwrap();
                    *gx += 1;
                    *gy += 1;
                }
            })
        };

        forward.join().unwrap();
        backward.join().unwrap();
        assert_eq!(*x.lock(), 2 * ITERATIONS as u64);
        assert_eq!(*y.lock(), 2 * ITERATIONS as u64);
    });
}

#[test]
fn test_pair_keeps_halves_consistent() {
    within(Duration::from_secs(60), || {
        let pair = Arc::new(OrderedLockPair::new(0i64, 0i64));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pair = Arc::clone(&pair);
                thread::spawn(move || {
                    for _ in 0..ITERATIONS / 4 {
                        pair.with_both(|a, b| {
                            *a += 1;
                            *b -= 1;
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let guard = pair.acquire_both();
        assert_eq!(*guard.first() + *guard.second(), 0);
        assert_eq!(*guard.first(), ITERATIONS as i64);
    });
}

#[test]
fn test_timeout_then_success_after_release() {
    let pair = Arc::new(OrderedLockPair::new(1, 2));
    let mut held = pair.acquire_both();

    let err = pair
        .acquire_both_timeout(Duration::from_millis(20))
        .err()
        .unwrap();
    assert!(err.is_timeout());
    assert!(err.is_recoverable());

    held.release().unwrap();
    assert!(pair.acquire_both_timeout(Duration::from_millis(20)).is_ok());
}

#[test]
fn test_same_mutex_twice_is_misuse() {
    let x = RankedMutex::new(());
    let err = acquire_pair(&x, &x).err().unwrap();
    assert_eq!(err, SyncError::SameResource { id: x.id().0 });
    assert!(!err.is_recoverable());
}

#[test]
fn test_blocked_ranked_pair_can_be_cancelled() {
    within(Duration::from_secs(10), || {
        let x = Arc::new(RankedMutex::new(0u32));
        let y = Arc::new(RankedMutex::new(0u32));
        let token = CancelToken::new();
        let held = y.lock();

        let waiter = {
            let (x, y, token) = (Arc::clone(&x), Arc::clone(&y), token.clone());
            thread::spawn(move || acquire_pair_cancellable(&*y, &*x, &token, TimeoutPolicy::None).err())
        };

        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(matches!(waiter.join().unwrap(), Some(SyncError::Cancelled { .. })));

        // The lower-ranked half was handed back
        assert!(x.try_lock().is_some());
        drop(held);
        assert!(acquire_pair(&*x, &*y).is_ok());
    });
}

#[test]
fn test_ranked_set_times_out_partway() {
    let locks: Vec<_> = (0..4).map(|_| RankedMutex::new(0u32)).collect();
    let blocker = locks[2].lock();

    let result = acquire_all_timeout(
        &[&locks[3], &locks[0], &locks[2], &locks[1]],
        Duration::from_millis(20),
    );
    assert!(matches!(result, Err(SyncError::Timeout { .. })));

    // Guards taken before the blocked lock are all released
    assert!(locks[0].try_lock().is_some());
    assert!(locks[1].try_lock().is_some());
    assert!(locks[3].try_lock().is_some());
    drop(blocker);

    let all: Vec<&RankedMutex<u32>> = locks.iter().collect();
    assert_eq!(acquire_all(&all).unwrap().len(), 4);
}

#[test]
fn test_ranked_set_cancelled_while_blocked() {
    within(Duration::from_secs(10), || {
        let locks: Arc<Vec<_>> = Arc::new((0..3).map(|_| RankedMutex::new(0u32)).collect());
        let token = CancelToken::new();
        let blocker = locks[1].lock();

        let waiter = {
            let (locks, token) = (Arc::clone(&locks), token.clone());
            thread::spawn(move || {
                let set: Vec<_> = locks.iter().collect();
                acquire_all_cancellable(&set, &token, TimeoutPolicy::None).err()
            })
        };

        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(matches!(waiter.join().unwrap(), Some(SyncError::Cancelled { .. })));
        assert!(locks[0].try_lock().is_some());
        drop(blocker);
    });
}

#[test]
fn test_ranked_pair_with_max_timeout_waits() {
    within(Duration::from_secs(10), || {
        let x = Arc::new(RankedMutex::new(1u32));
        let y = Arc::new(RankedMutex::new(2u32));
        let held = x.lock();

        let waiter = {
            let (x, y) = (Arc::clone(&x), Arc::clone(&y));
            thread::spawn(move || acquire_pair_timeout(&*x, &*y, Duration::MAX).map(|(a, b)| *a + *b))
        };

        thread::sleep(Duration::from_millis(20));
        drop(held);
        assert_eq!(waiter.join().unwrap(), Ok(3));
    });
}
