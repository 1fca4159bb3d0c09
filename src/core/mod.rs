/*!
 * Core Module
 * Fundamental types, error handling and synchronization primitives
 */

pub mod errors;
pub mod guard;
pub mod id;
pub mod limits;
pub mod sync;

// Re-export for convenience
pub use errors::*;
pub use guard::{Guard, GuardMetadata, TimeoutContext, TimeoutPolicy};
pub use id::{IdGenerator, LockId, TaskId};
