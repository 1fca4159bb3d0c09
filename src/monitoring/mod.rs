/*!
 * Monitoring
 * Structured logging setup for applications embedding the primitives
 */

mod tracer;

pub use tracer::{init_tracing, span_task, TRACE_JSON_ENV};
