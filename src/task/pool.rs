/*!
 * Worker Pool
 *
 * Minimal executor substrate: a fixed set of std threads draining two
 * lock-free job lanes. It exists so the primitives can be exercised from real
 * parallel workers; it makes no scheduling promises beyond "High is looked at
 * first".
 *
 * Every job runs inside a fresh `TaskContext`, so task-scoped locals never
 * leak from one job to the next on a reused worker.
 */

use super::context::TaskContext;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{MAX_POOL_WORKERS, POOL_IDLE_PARK};
use crate::core::sync::SyncConfig;
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Unit of work handed to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Best-effort scheduling hint
///
/// Only influences which queued job a free worker picks next. Lock grant
/// order never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityHint {
    Low,
    #[default]
    Normal,
    High,
}

/// Anything that can run jobs
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job, hint: PriorityHint);
}

struct Shared {
    high: SegQueue<Job>,
    normal: SegQueue<Job>,
    park: Mutex<()>,
    wake: Condvar,
    shutdown: AtomicBool,
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl Shared {
    #[inline]
    fn pop(&self) -> Option<Job> {
        self.high.pop().or_else(|| self.normal.pop())
    }

    #[inline]
    fn has_work(&self) -> bool {
        !self.high.is_empty() || !self.normal.is_empty()
    }

    fn worker_loop(&self, index: usize) {
        debug!(worker = index, "Worker started");
        loop {
            if let Some(job) = self.pop() {
                self.run(job);
                continue;
            }

            let mut park = self.park.lock();
            if self.has_work() {
                continue;
            }
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            self.wake.wait_for(&mut park, POOL_IDLE_PARK);
        }
        debug!(worker = index, "Worker exiting");
    }

    fn run(&self, job: Job) {
        match catch_unwind(AssertUnwindSafe(|| TaskContext::scope(job))) {
            Ok(()) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.panicked.fetch_add(1, Ordering::Relaxed);
                error!("Job panicked; worker continues");
            }
        }
    }
}

/// Fixed-size pool of worker threads
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Pool with `workers` threads
    pub fn new(workers: usize) -> SyncResult<Self> {
        if workers == 0 || workers > MAX_POOL_WORKERS {
            return Err(SyncError::InvalidConfig(format!(
                "Pool workers must be between 1 and {}, got {}",
                MAX_POOL_WORKERS, workers
            )));
        }

        let shared = Arc::new(Shared {
            high: SegQueue::new(),
            normal: SegQueue::new(),
            park: Mutex::new(()),
            wake: Condvar::new(),
            shutdown: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        });

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("sync-worker-{}", index))
                .spawn(move || worker_shared.worker_loop(index));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    let pool = Self {
                        shared,
                        workers: Mutex::new(handles),
                    };
                    pool.shutdown();
                    return Err(SyncError::InvalidConfig(format!(
                        "Failed to spawn worker {}: {}",
                        index, e
                    )));
                }
            }
        }

        info!(workers, "Worker pool started");
        Ok(Self {
            shared,
            workers: Mutex::new(handles),
        })
    }

    /// Pool sized from configuration
    pub fn with_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(config.pool_workers)
    }

    /// Run `f` on a worker and get a handle to its result
    pub fn submit<F, R>(&self, f: F) -> JobHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit_with(PriorityHint::Normal, f)
    }

    /// `submit` with a scheduling hint
    pub fn submit_with<F, R>(&self, hint: PriorityHint, f: F) -> JobHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = flume::bounded(1);
        self.execute(
            Box::new(move || {
                // Receiver may be gone if the caller dropped the handle
                let _ = tx.send(f());
            }),
            hint,
        );
        JobHandle { rx }
    }

    pub fn workers(&self) -> usize {
        self.workers.lock().len()
    }

    /// Jobs waiting for a worker
    pub fn queued(&self) -> usize {
        self.shared.high.len() + self.shared.normal.len()
    }

    /// Jobs that ran to completion
    pub fn completed(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }

    /// Jobs that panicked
    pub fn panicked(&self) -> u64 {
        self.shared.panicked.load(Ordering::Relaxed)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting work, drain queued jobs and join every worker
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        {
            let _park = self.shared.park.lock();
            self.shared.wake.notify_all();
        }

        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if handle.join().is_err() {
                warn!("Worker thread exited abnormally");
            }
        }

        // Nothing runs these now; dropping them resolves their handles
        let mut stranded = 0usize;
        while self.shared.pop().is_some() {
            stranded += 1;
        }
        if stranded > 0 {
            warn!(stranded, "Dropped jobs left after workers exited");
        }
        info!(completed = self.completed(), "Worker pool shut down");
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job, hint: PriorityHint) {
        // Workers only exit holding `park` with no work queued, so checking
        // and pushing under it means an accepted job always has a worker
        let _park = self.shared.park.lock();
        if self.is_shutdown() {
            // Dropping the job drops its reply sender; the handle reports PoolShutdown
            warn!(?hint, "Job rejected by shut-down pool");
            return;
        }

        match hint {
            PriorityHint::High => self.shared.high.push(job),
            PriorityHint::Normal | PriorityHint::Low => self.shared.normal.push(job),
        }
        self.shared.wake.notify_one();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pending result of a submitted job
#[must_use = "dropping the handle discards the job's result"]
pub struct JobHandle<R> {
    rx: flume::Receiver<R>,
}

impl<R> JobHandle<R> {
    /// Block until the job finishes
    ///
    /// `SyncError::PoolShutdown` if the job was rejected or panicked.
    pub fn join(self) -> SyncResult<R> {
        self.rx.recv().map_err(|_| SyncError::PoolShutdown)
    }

    /// Await the job from async code
    pub async fn join_async(self) -> SyncResult<R> {
        self.rx.recv_async().await.map_err(|_| SyncError::PoolShutdown)
    }

    /// Result if already finished
    pub fn try_join(&self) -> Option<R> {
        self.rx.try_recv().ok()
    }
}

/// Join every handle, in order
pub fn join_all<R>(handles: impl IntoIterator<Item = JobHandle<R>>) -> SyncResult<Vec<R>> {
    handles.into_iter().map(JobHandle::join).collect()
}
