use super::context::TaskContext;
use crate::mail::MailError;
use crate::store::StoreError;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Arguments stored with a queued job.
pub type TaskArgs = serde_json::Value;

/// Errors that can occur while launching or executing a task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("task failed: {0}")]
    Failed(String),
}

impl TaskError {
    pub fn failed(error: anyhow::Error) -> Self {
        TaskError::Failed(format!("{:#}", error))
    }
}

/// Trait for user-triggered background tasks.
///
/// Tasks are executed synchronously on the blocking pool and report
/// progress through their [`TaskContext`].
pub trait BackgroundTask: Send + Sync {
    /// Job type name. Also names the progress notification.
    fn name(&self) -> &'static str;

    /// Human-readable description stored with the task record.
    fn description(&self) -> &'static str;

    fn execute(&self, ctx: &TaskContext, args: &TaskArgs) -> Result<(), TaskError>;
}

/// Known task types, by name.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    tasks: HashMap<&'static str, Arc<dyn BackgroundTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: Arc<dyn BackgroundTask>) {
        self.tasks.insert(task.name(), task);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BackgroundTask>> {
        self.tasks.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tasks.keys().copied().collect();
        names.sort();
        names
    }
}
