//! User-triggered background tasks.
//!
//! Requests launch tasks through the [`TaskManager`], which records them and
//! puts them on the [`JobQueue`]. A [`TaskRunner`] drains the queue on the
//! blocking pool. Progress is mirrored into the owner's notifications so
//! clients can poll it.

mod context;
pub mod jobs;
mod manager;
mod queue;
mod runner;
mod task;

pub use context::{TaskContext, TaskServices};
pub use manager::{TaskManager, TaskView};
pub use queue::{InMemoryJobQueue, JobId, JobMeta, JobQueue, JobStatus};
pub use runner::TaskRunner;
pub use task::{BackgroundTask, TaskArgs, TaskError, TaskRegistry};

/// Registry holding every built-in task.
pub fn default_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register(std::sync::Arc::new(jobs::ExportPostsTask));
    registry
}
