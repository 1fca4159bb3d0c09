/*!
 * System Limits and Constants
 *
 * Centralized location for all tunables, thresholds, and magic numbers.
 * Organized by primitive for maintainability and discoverability.
 *
 * - Performance-critical constants are marked with [PERF]
 */

use std::time::Duration;

// =============================================================================
// CONCURRENT MAP
// =============================================================================

/// Default stripe/shard count for `ConcurrentMap` (must be a power of 2)
/// [PERF] 16-64 balances memory against contention
pub const DEFAULT_MAP_STRIPES: usize = 16;

/// Upper bound on stripe count accepted by configuration
pub const MAX_MAP_STRIPES: usize = 4096;

// =============================================================================
// LOCK WAITS
// =============================================================================

/// Default lock acquisition timeout (50ms)
/// Lock critical sections are expected to be short-lived
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(50);

/// How often a blocked waiter re-checks its cancellation token (1ms)
/// [PERF] Lower is more responsive, higher wastes fewer wakeups
pub const DEFAULT_CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(1);

// =============================================================================
// BACKOFF
// =============================================================================

/// Iterations of pure `spin_loop()` before yielding
pub const BACKOFF_SPIN_LIMIT: u32 = 10;

/// Iterations of `yield_now()` before sleeping
pub const BACKOFF_YIELD_LIMIT: u32 = 50;

/// Cap on a single backoff sleep (1ms)
pub const BACKOFF_MAX_SLEEP: Duration = Duration::from_millis(1);

// =============================================================================
// WORKER POOL
// =============================================================================

/// Default worker count when not configured
pub const DEFAULT_POOL_WORKERS: usize = 4;

/// Upper bound on worker threads accepted by configuration
pub const MAX_POOL_WORKERS: usize = 256;

/// Worker idle park interval before re-checking lanes (10ms)
pub const POOL_IDLE_PARK: Duration = Duration::from_millis(10);

// =============================================================================
// CACHE
// =============================================================================

/// Cache line size used for alignment of hot atomics
/// [PERF] Prevents false sharing between adjacent counters
pub const CACHE_LINE_SIZE: usize = 64;
