/*!
 * Waiting Helpers
 *
 * Blocking waits live inside each lock; this module holds the caller-side
 * retry policy used after a non-blocking attempt reports contention.
 */

mod backoff;

pub use backoff::Backoff;
