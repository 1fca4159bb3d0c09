/*!
 * Unified Timeout Infrastructure
 *
 * Bounded waits for every blocking acquisition (`FairLock`, `OrderedLockPair`,
 * `TryLock::try_acquire_for`).
 *
 * ## Timeout Classes
 *
 * - **None**: wait until granted (liveness relies on holders releasing)
 * - **Lock**: short critical sections (default 50ms)
 * - **Custom**: caller-supplied duration
 *
 * ## Example
 *
 * ```ignore
 * let guard = fair_lock.lock_timeout(TimeoutPolicy::default_lock())?;
 * let guard = fair_lock.lock_timeout(Duration::from_millis(5))?;
 * ```
 */

use crate::core::errors::SyncError;
use crate::core::limits::DEFAULT_LOCK_TIMEOUT;
use crate::core::sync::SyncConfig;
use std::time::{Duration, Instant};

/// Timeout policy for blocking operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// No timeout (infinite wait) - use sparingly!
    #[default]
    None,

    /// Lock acquisition timeout
    Lock(Duration),

    /// Custom timeout
    Custom(Duration),
}

impl TimeoutPolicy {
    /// Default lock timeout: 50ms
    pub const fn default_lock() -> Self {
        Self::Lock(DEFAULT_LOCK_TIMEOUT)
    }

    /// Lock timeout taken from configuration
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::Lock(config.lock_timeout)
    }

    /// Get the duration for this policy
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Lock(d) | Self::Custom(d) => Some(*d),
        }
    }

    /// Absolute deadline when started at `start`
    ///
    /// `None` when unbounded, or when the duration runs past what `Instant`
    /// can represent (such a wait is unbounded in practice).
    pub fn deadline(&self, start: Instant) -> Option<Instant> {
        self.duration().and_then(|d| start.checked_add(d))
    }

    /// Check if this timeout has expired
    pub fn is_expired(&self, start: Instant) -> bool {
        match self.duration() {
            None => false,
            Some(d) => start.elapsed() >= d,
        }
    }

    /// Get remaining time before timeout
    pub fn remaining(&self, start: Instant) -> Option<Duration> {
        self.duration().map(|d| d.saturating_sub(start.elapsed()))
    }

    /// Get timeout category as string
    pub fn category(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lock(_) => "lock",
            Self::Custom(_) => "custom",
        }
    }
}

impl From<Duration> for TimeoutPolicy {
    fn from(duration: Duration) -> Self {
        Self::Custom(duration)
    }
}

impl From<Option<Duration>> for TimeoutPolicy {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Self::None, Self::Custom)
    }
}

/// Timeout state for one in-flight acquisition
#[derive(Debug, Clone)]
pub struct TimeoutContext {
    policy: TimeoutPolicy,
    start: Instant,
    resource_type: &'static str,
}

impl TimeoutContext {
    /// Start the clock for an acquisition
    pub fn new(policy: TimeoutPolicy, resource_type: &'static str) -> Self {
        Self {
            policy,
            start: Instant::now(),
            resource_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.policy.is_expired(self.start)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.policy.remaining(self.start)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.policy.deadline(self.start)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn policy(&self) -> TimeoutPolicy {
        self.policy
    }

    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    /// Timeout error describing this acquisition
    pub fn timeout_error(&self) -> SyncError {
        SyncError::timeout(self.resource_type, self.start, self.policy.duration())
    }

    /// Cancellation error describing this acquisition
    pub fn cancelled_error(&self) -> SyncError {
        SyncError::cancelled(self.resource_type)
    }
}
