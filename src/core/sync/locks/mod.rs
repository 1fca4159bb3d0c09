/*!
 * Lock-Based Synchronization Primitives
 *
 * - Concurrent map (striped or sharded, snapshot values)
 * - Ordered acquisition of lock pairs and ranked sets
 * - Non-blocking try-locks
 * - FIFO fair lock
 */

mod fair;
mod map;
mod ordered;
mod striped;
mod try_lock;

// Re-export public API
pub use fair::{FairLock, FairLockGuard, FairLockStats};
pub use map::ConcurrentMap;
pub use ordered::{
    acquire_all, acquire_all_cancellable, acquire_all_timeout, acquire_pair,
    acquire_pair_cancellable, acquire_pair_timeout, OrderedLockPair, PairGuard, RankedMutex,
};
pub use striped::StripedMap;
pub use try_lock::{try_acquire_pair, Acquisition, TryLock, TryLockGuard};
