/*!
 * Task-Scoped Locals
 *
 * A `ScopedThreadLocal` is a *key*; the values live in each task's
 * `TaskContext`. Two tasks sharing one worker thread (one after another, or
 * interleaved at `.await` points) never see each other's value.
 */

use super::context::{SlotValue, TaskContext};
use crate::core::errors::{SyncError, SyncResult};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Per-task storage with a lazy initializer
///
/// # Example
///
/// ```
/// use ai_os_sync::{ScopedThreadLocal, TaskContext};
///
/// let name = ScopedThreadLocal::new(|| String::from("unset"));
///
/// TaskContext::scope(|| {
///     name.set("A".to_string()).unwrap();
///     assert_eq!(name.get().unwrap(), "A");
/// });
///
/// TaskContext::scope(|| assert_eq!(name.get().unwrap(), "unset"));
///
/// // Outside any task
/// assert!(name.get().is_err());
/// ```
pub struct ScopedThreadLocal<T> {
    key: u64,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T: Send + 'static> ScopedThreadLocal<T> {
    /// `factory` produces the initial value the first time a task touches it
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            key: NEXT_KEY.fetch_add(1, Ordering::Relaxed),
            factory: Box::new(factory),
        }
    }

    /// Run `f` against the current task's value
    ///
    /// Other locals may be used inside `f`; this one may not (its slot is
    /// locked for the call).
    pub fn with<F, R>(&self, f: F) -> SyncResult<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let context = current()?;
        let slot = context.slot_or_init(self.key, || self.fresh());
        let mut guard = slot.lock();

        // Emptied by a concurrent `take` on a shared context
        let value = guard.get_or_insert_with(|| self.fresh());
        match (**value).downcast_mut::<T>() {
            Some(value) => Ok(f(value)),
            None => unreachable!("task-local slot {} holds a foreign type", self.key),
        }
    }

    fn fresh(&self) -> SlotValue {
        Box::new((self.factory)())
    }

    /// Clone of the current task's value
    pub fn get(&self) -> SyncResult<T>
    where
        T: Clone,
    {
        self.with(|value| value.clone())
    }

    /// Replace the current task's value
    pub fn set(&self, value: T) -> SyncResult<()> {
        current()?.replace_slot(self.key, Box::new(value));
        Ok(())
    }

    /// Remove the current task's value; the next access re-runs the factory
    pub fn take(&self) -> SyncResult<Option<T>> {
        let removed = current()?.remove_slot(self.key);
        Ok(removed.and_then(|value| value.downcast::<T>().ok()).map(|value| *value))
    }

    /// True when the current task has touched this local
    pub fn is_initialized(&self) -> SyncResult<bool> {
        let context = current()?;
        Ok(context.has_slot(self.key))
    }
}

impl<T: Default + Send + 'static> Default for ScopedThreadLocal<T> {
    fn default() -> Self {
        Self::new(T::default)
    }
}

impl<T> fmt::Debug for ScopedThreadLocal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedThreadLocal")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

fn current() -> SyncResult<TaskContext> {
    TaskContext::current().ok_or_else(|| {
        tracing::debug!("Task-local accessed outside a task scope");
        SyncError::NoTaskScope
    })
}
