use super::manager::TaskManager;
use super::task::TaskError;
use crate::mail::Mailer;
use crate::store::Database;
use std::sync::Arc;
use std::time::Duration;

/// Shared resources every task execution gets.
#[derive(Clone)]
pub struct TaskServices {
    pub db: Database,
    pub mailer: Arc<dyn Mailer>,
    /// Sender address for mail sent by tasks.
    pub mail_sender: String,
    /// Pause between export steps. Zero outside of demos.
    pub export_step_delay: Duration,
}

/// Context provided to a task during execution.
#[derive(Clone)]
pub struct TaskContext {
    /// Queue job id, also the task record id.
    pub task_id: String,

    /// Owner of the task.
    pub user_id: i64,

    pub manager: TaskManager,

    pub services: TaskServices,
}

impl TaskContext {
    pub fn db(&self) -> &Database {
        &self.services.db
    }

    pub fn mailer(&self) -> Arc<dyn Mailer> {
        self.services.mailer.clone()
    }

    /// Reports progress for this task, see [`TaskManager::set_progress`].
    pub fn set_progress(&self, percent: u8) -> Result<(), TaskError> {
        self.manager.set_progress(&self.task_id, percent)
    }
}
