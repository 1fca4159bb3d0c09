/*!
 * Try-lock tests
 */

use ai_os_sync::{try_acquire_pair, Acquisition, Backoff, SyncConfig, TryLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_contended_reported_quickly_while_held() {
    let lock = Arc::new(TryLock::new(0));
    let held = lock.try_acquire();
    assert!(held.is_acquired());

    let other = Arc::clone(&lock);
    let elapsed = thread::spawn(move || {
        let start = Instant::now();
        assert!(other.try_acquire().is_contended());
        start.elapsed()
    })
    .join()
    .unwrap();

    assert!(elapsed < Duration::from_millis(100));
}

#[test]
fn test_run_or_else_takes_fallback_under_contention() {
    let lock = Arc::new(TryLock::new(Vec::<u32>::new()));
    let barrier = Arc::new(Barrier::new(2));

    let holder = {
        let lock = Arc::clone(&lock);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut guard = lock.try_acquire().acquired().unwrap();
            guard.push(1);
            barrier.wait();
            barrier.wait();
        })
    };

    barrier.wait();
    let outcome = lock.run_or_else(|v| v.len(), || usize::MAX);
    assert_eq!(outcome, usize::MAX);
    barrier.wait();
    holder.join().unwrap();

    assert_eq!(lock.run_or_else(|v| v.len(), || usize::MAX), 1);
}

#[test]
fn test_backoff_retry_eventually_acquires() {
    let lock = Arc::new(TryLock::new(0u32));
    let held = lock.try_acquire();

    let other = Arc::clone(&lock);
    let retrier = thread::spawn(move || {
        let mut backoff = Backoff::from_config(&SyncConfig::low_latency());
        backoff.retry(10_000, || {
            other.try_acquire().acquired().map(|mut guard| {
                *guard += 1;
                *guard
            })
        })
    });

    thread::sleep(Duration::from_millis(5));
    drop(held);
    assert_eq!(retrier.join().unwrap(), Some(1));
}

#[test]
fn test_pair_attempts_in_either_order_never_block() {
    let a = Arc::new(TryLock::new(()));
    let b = Arc::new(TryLock::new(()));
    let successes = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let (a, b, successes) = (Arc::clone(&a), Arc::clone(&b), Arc::clone(&successes));
            thread::spawn(move || {
                for _ in 0..5_000 {
                    let attempt = if i == 0 {
                        try_acquire_pair(&*a, &*b).is_acquired()
                    } else {
                        try_acquire_pair(&*b, &*a).is_acquired()
                    };
                    if attempt {
                        successes.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(successes.load(Ordering::Relaxed) > 0);
    assert!(!a.is_locked() && !b.is_locked());
}

#[test]
fn test_acquisition_conversions() {
    let acquired: Acquisition<u8> = Some(3).into();
    assert_eq!(acquired.map(|v| v * 2).acquired(), Some(6));

    let contended: Acquisition<u8> = None.into();
    assert!(contended.is_contended());
}
