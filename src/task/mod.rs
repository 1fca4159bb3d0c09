/*!
 * Logical Tasks
 *
 * Task identity, task-scoped storage and the worker substrate that runs
 * tasks. A logical task is whatever the caller treats as one unit of work:
 * a closure under `TaskContext::scope`, a future wrapped by `TaskScoped`, or
 * a job on a `WorkerPool`.
 */

mod context;
mod local;
mod pool;

pub use context::{spawn_scoped, TaskContext, TaskScoped};
pub use local::ScopedThreadLocal;
pub use pool::{join_all, Executor, Job, JobHandle, PriorityHint, WorkerPool};
