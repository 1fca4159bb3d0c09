/*!
 * Guard Traits
 *
 * Core abstraction for scoped acquisitions
 */

use super::GuardMetadata;
use crate::core::errors::{SyncError, SyncResult};

/// Core guard trait
///
/// Every lock guard in the crate implements this to provide:
/// - Resource type identification
/// - Metadata access
/// - Explicit release with double-release detection
///
/// Dropping a guard always releases; `release` exists for callers that want
/// to give the resource back before the end of scope and be told if they
/// already did.
pub trait Guard {
    /// Resource type name for logging/debugging
    fn resource_type(&self) -> &'static str;

    /// Get guard metadata
    fn metadata(&self) -> &GuardMetadata;

    /// Check if guard still holds its resource
    fn is_active(&self) -> bool;

    /// Release the resource now
    ///
    /// Returns `SyncError::AlreadyReleased` if already released. Accessing the
    /// guarded data after release panics.
    fn release(&mut self) -> SyncResult<()>;

    /// Release, treating a double release as a caller bug
    fn release_or_panic(&mut self) {
        if let Err(e) = self.release() {
            panic!("{}: {}", self.resource_type(), e);
        }
    }
}

/// Shared helper: error for a second release of the same guard
pub(crate) fn double_release<G: Guard + ?Sized>(guard: &G) -> SyncError {
    tracing::error!(
        resource = guard.resource_type(),
        held_us = guard.metadata().lifetime_micros(),
        "Guard released twice"
    );
    SyncError::already_released(guard.resource_type())
}
