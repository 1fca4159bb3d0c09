/*!
 * Worker pool tests
 */

use ai_os_sync::{
    Executor, FairLock, PriorityHint, SyncConfig, SyncError, TaskContext, WorkerPool,
};
use std::sync::{Arc, Barrier};
use std::time::Duration;

#[test]
fn test_pool_from_config() {
    let config = SyncConfig {
        pool_workers: 3,
        ..SyncConfig::default()
    };
    let pool = WorkerPool::with_config(&config).unwrap();
    assert_eq!(pool.workers(), 3);
}

#[test]
fn test_high_priority_jobs_picked_first() {
    let pool = WorkerPool::new(1).unwrap();
    let order = Arc::new(FairLock::new(Vec::new()));

    // Park the only worker so later jobs queue up
    let gate = Arc::new(Barrier::new(2));
    let blocker = {
        let gate = Arc::clone(&gate);
        pool.submit(move || {
            gate.wait();
        })
    };

    let mut handles = Vec::new();
    for (hint, tag) in [
        (PriorityHint::Low, "low"),
        (PriorityHint::Normal, "normal"),
        (PriorityHint::High, "high"),
    ] {
        let order = Arc::clone(&order);
        handles.push(pool.submit_with(hint, move || order.lock().push(tag)));
    }

    gate.wait();
    blocker.join().unwrap();
    ai_os_sync::join_all(handles).unwrap();

    assert_eq!(order.lock().first(), Some(&"high"));
}

#[test]
fn test_executor_trait_object() {
    let pool: Arc<dyn Executor> = Arc::new(WorkerPool::new(2).unwrap());
    let (tx, rx) = flume::bounded(1);

    pool.execute(
        Box::new(move || {
            let _ = tx.send(TaskContext::current_id().is_some());
        }),
        PriorityHint::Normal,
    );

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(true));
}

#[test]
fn test_join_async() {
    let pool = WorkerPool::new(1).unwrap();
    let value = tokio_test::block_on(pool.submit(|| 21 * 2).join_async()).unwrap();
    assert_eq!(value, 42);
}

#[test]
fn test_submit_racing_shutdown_never_strands_jobs() {
    for _ in 0..200 {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let start = Arc::new(Barrier::new(3));

        let submitters: Vec<_> = (0..2)
            .map(|_| {
                let (pool, start) = (Arc::clone(&pool), Arc::clone(&start));
                std::thread::spawn(move || {
                    start.wait();
                    (0..50).map(|i| pool.submit(move || i)).collect::<Vec<_>>()
                })
            })
            .collect();

        start.wait();
        pool.shutdown();

        let handles: Vec<_> = submitters
            .into_iter()
            .flat_map(|s| s.join().unwrap())
            .collect();

        // Pool is still alive: every accepted job ran, every other one was dropped
        assert_eq!(pool.queued(), 0);
        for handle in handles {
            match handle.join() {
                Ok(_) | Err(SyncError::PoolShutdown) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
