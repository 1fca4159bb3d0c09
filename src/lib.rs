/*!
 * AI-OS Sync Library
 * Concurrency-safe shared-state primitives exposed as a library
 */

pub mod core;
pub mod monitoring;
pub mod task;

// Re-exports
pub use crate::core::errors::{SyncError, SyncResult};
pub use crate::core::guard::{Guard, GuardMetadata, TimeoutPolicy};
pub use crate::core::id::{LockId, TaskId};
pub use crate::core::sync::{
    acquire_all, acquire_all_cancellable, acquire_all_timeout, acquire_pair,
    acquire_pair_cancellable, acquire_pair_timeout, global_config, install_config,
    try_acquire_pair, Acquisition, AtomicCounter, Backoff, CancelToken, ConcurrentMap, FairLock,
    FairLockGuard, FairLockStats, MapStrategy, OrderedLockPair, PairGuard, RankedMutex,
    StripedMap, SyncConfig, TryLock, TryLockGuard,
};
pub use monitoring::init_tracing;
pub use task::{
    join_all, spawn_scoped, Executor, JobHandle, PriorityHint, ScopedThreadLocal, TaskContext,
    TaskScoped, WorkerPool,
};
