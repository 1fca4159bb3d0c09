/*!
 * Task Context
 *
 * Identity and private storage of one logical task.
 *
 * # Design: Storage Owned by the Task, Not the Thread
 *
 * Worker threads are reused, and async tasks migrate between runtime workers
 * at every `.await`. Slots therefore live in the `TaskContext`, and the
 * context is *installed* on whatever thread is currently running the task:
 *
 * - sync: `TaskContext::scope(|| ..)` installs for the duration of a closure
 * - async: `TaskScoped` installs around every `poll`
 *
 * The current context is the top of a thread-local stack, so scopes nest and
 * the previous context is restored on every exit path, including unwinding.
 */

use crate::core::id::{next_task_id, TaskId};
use crate::monitoring::span_task;
use parking_lot::Mutex;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::trace;

pub(crate) type SlotValue = Box<dyn Any + Send>;
pub(crate) type Slot = Arc<Mutex<Option<SlotValue>>>;

thread_local! {
    static CURRENT: RefCell<Vec<TaskContext>> = const { RefCell::new(Vec::new()) };
}

struct ContextInner {
    id: TaskId,
    slots: Mutex<HashMap<u64, Slot>>,
}

/// Identity and slot table of a logical task
///
/// Cheap to clone; clones share the same slots.
#[derive(Clone)]
pub struct TaskContext {
    inner: Arc<ContextInner>,
}

impl TaskContext {
    /// Fresh context with a new `TaskId` and no slots
    pub fn new() -> Self {
        let id = next_task_id();
        trace!(task = %id, "Task context created");
        Self {
            inner: Arc::new(ContextInner {
                id,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Context installed on the calling thread, if any
    pub fn current() -> Option<TaskContext> {
        CURRENT.with(|stack| stack.borrow().last().cloned())
    }

    pub fn current_id() -> Option<TaskId> {
        CURRENT.with(|stack| stack.borrow().last().map(TaskContext::id))
    }

    /// Run `f` as a new logical task
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Self::new().enter(f)
    }

    /// Run `f` with this context installed
    pub fn enter<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _installed = Installed::push(self.clone());
        let _span = span_task(self.id()).entered();
        f()
    }

    /// Wrap `future` as a new logical task
    pub fn scoped<F: Future>(future: F) -> TaskScoped<F> {
        Self::new().wrap(future)
    }

    /// Wrap `future` so this context is installed on every poll
    pub fn wrap<F: Future>(&self, future: F) -> TaskScoped<F> {
        TaskScoped {
            context: self.clone(),
            future: Box::pin(future),
        }
    }

    /// Drop every slot value; the next access re-runs the factories
    pub fn reset(&self) {
        let dropped = std::mem::take(&mut *self.inner.slots.lock());
        trace!(task = %self.id(), slots = dropped.len(), "Task context reset");
    }

    /// Number of initialized slots
    pub fn slot_count(&self) -> usize {
        self.inner.slots.lock().len()
    }

    /// Existing slot for `key`, or one initialized from `init`
    ///
    /// `init` runs without the slot table locked, so factories may touch other
    /// task-locals.
    pub(crate) fn slot_or_init(&self, key: u64, init: impl FnOnce() -> SlotValue) -> Slot {
        if let Some(slot) = self.inner.slots.lock().get(&key) {
            return Arc::clone(slot);
        }
        let value = init();
        let mut slots = self.inner.slots.lock();
        Arc::clone(
            slots
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(Some(value)))),
        )
    }

    pub(crate) fn has_slot(&self, key: u64) -> bool {
        self.inner.slots.lock().contains_key(&key)
    }

    pub(crate) fn replace_slot(&self, key: u64, value: SlotValue) {
        self.inner
            .slots
            .lock()
            .insert(key, Arc::new(Mutex::new(Some(value))));
    }

    pub(crate) fn remove_slot(&self, key: u64) -> Option<SlotValue> {
        let slot = self.inner.slots.lock().remove(&key)?;
        let value = slot.lock().take();
        value
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("id", &self.id())
            .field("slots", &self.slot_count())
            .finish()
    }
}

/// Pops the installed context when dropped
struct Installed;

impl Installed {
    fn push(context: TaskContext) -> Self {
        CURRENT.with(|stack| stack.borrow_mut().push(context));
        Installed
    }
}

impl Drop for Installed {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Future running inside a `TaskContext`
///
/// The context is installed for the duration of each `poll` and removed
/// before returning, so the thread never keeps a task's storage between polls.
#[must_use = "futures do nothing unless polled"]
pub struct TaskScoped<F> {
    context: TaskContext,
    future: Pin<Box<F>>,
}

impl<F> TaskScoped<F> {
    pub fn context(&self) -> &TaskContext {
        &self.context
    }
}

impl<F: Future> Future for TaskScoped<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let _installed = Installed::push(this.context.clone());
        let _span = span_task(this.context.id()).entered();
        this.future.as_mut().poll(cx)
    }
}

/// Spawn `future` on the tokio runtime as a new logical task
pub fn spawn_scoped<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(TaskContext::scoped(future))
}
