/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common result type for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Synchronization errors with serialization support
///
/// Three classes of failure:
/// - **Contention** (`Timeout`): a bounded wait expired, caller decides what next
/// - **Cancellation** (`Cancelled`): an external token fired while waiting
/// - **Misuse** (`AlreadyReleased`, `SameResource`, `NoTaskScope`): caller bug
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Timed out acquiring {resource} after {elapsed_ms}ms (limit: {})", limit_label(.timeout_ms))]
    #[diagnostic(
        code(sync::timeout),
        help("The resource is contended. Retry with backoff, skip, or take an alternate path.")
    )]
    Timeout {
        resource: String,
        elapsed_ms: u64,
        timeout_ms: Option<u64>,
    },

    #[error("Wait for {resource} was cancelled")]
    #[diagnostic(
        code(sync::cancelled),
        help("The requester was removed from the wait queue. Propagate the cancellation.")
    )]
    Cancelled { resource: String },

    #[error("{resource} already released")]
    #[diagnostic(
        code(sync::already_released),
        help("A guard was released twice. Check the release path of the calling code.")
    )]
    AlreadyReleased { resource: String },

    #[error("Lock {id} requested twice in one ordered acquisition")]
    #[diagnostic(
        code(sync::same_resource),
        help("Acquiring the same lock twice would self-deadlock. Pass distinct locks.")
    )]
    SameResource { id: u64 },

    #[error("Task-local storage accessed outside of a task scope")]
    #[diagnostic(
        code(sync::no_task_scope),
        help("Run the work inside TaskContext::scope, TaskContext::scoped or a WorkerPool job.")
    )]
    NoTaskScope,

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(sync::invalid_config),
        help("Stripe counts must be non-zero powers of two and durations non-zero.")
    )]
    InvalidConfig(String),

    #[error("Failed to load configuration: {0}")]
    #[diagnostic(code(sync::config), help("Check the JSON document or SYNC_* environment variables."))]
    Config(String),

    #[error("Worker pool is shut down")]
    #[diagnostic(
        code(sync::pool_shutdown),
        help("The job was submitted after shutdown or its worker exited before replying.")
    )]
    PoolShutdown,
}

fn limit_label(limit: &Option<u64>) -> String {
    match limit {
        Some(ms) => format!("{}ms", ms),
        None => "none".to_string(),
    }
}

fn saturating_millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl SyncError {
    /// Build a timeout error from a start instant and an optional limit
    pub fn timeout(
        resource: impl Into<String>,
        start: std::time::Instant,
        limit: Option<std::time::Duration>,
    ) -> Self {
        Self::Timeout {
            resource: resource.into(),
            elapsed_ms: saturating_millis(start.elapsed()),
            timeout_ms: limit.map(saturating_millis),
        }
    }

    pub fn cancelled(resource: impl Into<String>) -> Self {
        Self::Cancelled {
            resource: resource.into(),
        }
    }

    pub fn already_released(resource: impl Into<String>) -> Self {
        Self::AlreadyReleased {
            resource: resource.into(),
        }
    }

    /// Contention and cancellation are recoverable; misuse is not
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled { .. })
    }

    /// Check if this is a contention timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}
