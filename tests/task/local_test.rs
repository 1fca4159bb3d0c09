/*!
 * Task-scoped local tests
 */

use ai_os_sync::{spawn_scoped, ScopedThreadLocal, SyncError, TaskContext, WorkerPool};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Barrier};
use std::time::Duration;

fn name_local() -> Arc<ScopedThreadLocal<String>> {
    Arc::new(ScopedThreadLocal::new(|| "unset".to_string()))
}

#[test]
fn test_two_tasks_on_single_worker_see_own_values() {
    let local = name_local();
    let pool = WorkerPool::new(1).unwrap();

    let handles: Vec<_> = ["A", "B"]
        .into_iter()
        .map(|name| {
            let local = Arc::clone(&local);
            pool.submit(move || {
                local.set(name.to_string()).unwrap();
                std::thread::sleep(Duration::from_millis(5));
                local.get().unwrap()
            })
        })
        .collect();

    assert_eq!(ai_os_sync::join_all(handles).unwrap(), vec!["A", "B"]);
}

#[test]
fn test_fresh_task_sees_factory_value() {
    let local = name_local();
    let pool = WorkerPool::new(1).unwrap();

    let first = {
        let local = Arc::clone(&local);
        pool.submit(move || local.set("A".into()))
    };
    first.join().unwrap().unwrap();

    let second = {
        let local = Arc::clone(&local);
        pool.submit(move || local.get())
    };
    assert_eq!(second.join().unwrap().unwrap(), "unset");
}

#[test]
fn test_access_without_task_is_reported() {
    let local = name_local();
    assert_eq!(local.get(), Err(SyncError::NoTaskScope));
    assert_eq!(local.take(), Err(SyncError::NoTaskScope));
}

#[test]
fn test_reset_reinitializes() {
    let local = name_local();
    let ctx = TaskContext::new();
    ctx.enter(|| local.set("A".into()).unwrap());
    ctx.reset();
    assert_eq!(ctx.enter(|| local.get().unwrap()), "unset");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_tasks_keep_values_across_awaits() {
    let local = name_local();
    let barrier = Arc::new(tokio::sync::Barrier::new(2));

    let spawn = |name: &'static str| {
        let local = Arc::clone(&local);
        let barrier = Arc::clone(&barrier);
        spawn_scoped(async move {
            local.set(name.to_string()).unwrap();
            // Both tasks are mid-flight here, possibly swapping workers after
            barrier.wait().await;
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(5)).await;
            local.get().unwrap()
        })
    };

    let (a, b) = tokio::join!(spawn("A"), spawn("B"));
    assert_eq!(a.unwrap(), "A");
    assert_eq!(b.unwrap(), "B");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_many_async_tasks_isolated() {
    let local = Arc::new(ScopedThreadLocal::new(|| 0u64));

    let handles: Vec<_> = (1..=32u64)
        .map(|n| {
            let local = Arc::clone(&local);
            spawn_scoped(async move {
                for _ in 0..n {
                    local.with(|v| *v += 1).unwrap();
                    tokio::task::yield_now().await;
                }
                local.get().unwrap()
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    for (n, result) in (1..=32u64).zip(results) {
        assert_eq!(result.unwrap(), n);
    }
}

#[test]
fn test_threads_in_shared_context_share_values() {
    let local = Arc::new(ScopedThreadLocal::new(|| 0u32));
    let ctx = TaskContext::new();
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let (local, ctx, barrier) = (Arc::clone(&local), ctx.clone(), Arc::clone(&barrier));
            std::thread::spawn(move || {
                ctx.enter(|| local.with(|v| *v += 1).unwrap());
                barrier.wait();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(ctx.enter(|| local.get().unwrap()), 2);
}
