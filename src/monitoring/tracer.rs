/*!
 * Structured Tracing
 * Subscriber setup and task spans using the tracing crate
 *
 * Event levels used across the crate:
 * - `trace`: uncontended fast paths
 * - `debug`: contention, queueing, hand-off
 * - `warn`: timeouts and cancellations
 * - `error`: misuse (double release)
 */

use crate::core::id::TaskId;
use tracing::{info, span, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable selecting JSON output
pub const TRACE_JSON_ENV: &str = "SYNC_TRACE_JSON";

fn json_requested() -> bool {
    std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false)
}

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - SYNC_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns `false` if a global subscriber was already installed, which makes
/// repeated calls from tests harmless.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json_requested() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = json_requested(), "Structured tracing initialized");
    }
    installed
}

/// Span covering one logical task
///
/// Events emitted by primitives while the task runs carry its id, so
/// contention logs can be attributed to tasks rather than worker threads.
pub fn span_task(task_id: TaskId) -> Span {
    span!(Level::DEBUG, "task", task = %task_id)
}
