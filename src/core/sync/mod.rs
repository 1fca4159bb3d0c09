/*!
 * Synchronization Primitives
 *
 * Shared-state building blocks for code running on many threads:
 * - `lockfree`: hardware-atomic primitives that never block
 * - `locks`: lock-based primitives (map, ordered pairs, try-lock, fair lock)
 * - `wait`: caller-side backoff for retry loops
 *
 * # Failure model
 *
 * - Contention: bounded waits return `SyncError::Timeout`; nothing retries
 *   automatically
 * - Cancellation: a `CancelToken` removes a blocked requester cleanly
 * - Misuse: double release is an error, releasing a lock you do not hold
 *   panics
 */

mod cancel;
mod config;
pub mod lockfree;
pub mod locks;
pub mod wait;

pub use cancel::CancelToken;
pub use config::{global as global_config, install as install_config, MapStrategy, SyncConfig};
pub use lockfree::AtomicCounter;
pub use locks::{
    acquire_all, acquire_all_cancellable, acquire_all_timeout, acquire_pair,
    acquire_pair_cancellable, acquire_pair_timeout, try_acquire_pair, Acquisition, ConcurrentMap,
    FairLock, FairLockGuard, FairLockStats, OrderedLockPair, PairGuard, RankedMutex, StripedMap,
    TryLock, TryLockGuard,
};
pub use wait::Backoff;
