//! Task records and progress reporting.
//!
//! The queue holds live progress for running jobs. The store holds the
//! durable task record and the owner's progress notification. Every
//! progress update touches both.

use super::queue::JobQueue;
use super::task::{TaskArgs, TaskError, TaskRegistry};
use crate::notifications::{progress_notification_name, TaskProgressPayload};
use crate::store::{Database, StoreError, TaskOutcome, TaskRecord};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A task record together with its current progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: TaskRecord,
    pub progress: u8,
}

#[derive(Clone)]
pub struct TaskManager {
    db: Database,
    queue: Arc<dyn JobQueue>,
    registry: Arc<TaskRegistry>,
}

impl TaskManager {
    pub fn new(db: Database, queue: Arc<dyn JobQueue>, registry: Arc<TaskRegistry>) -> Self {
        Self {
            db,
            queue,
            registry,
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Queues a task for `user_id` and records it as in progress.
    ///
    /// The record is inserted in the same transaction that enqueues, so a
    /// worker that picks the job up right away waits for the record. A user
    /// runs at most one task of each type: a second launch while one is in
    /// progress fails with [`StoreError::Conflict`].
    pub fn launch(
        &self,
        user_id: i64,
        job_name: &str,
        description: &str,
        args: TaskArgs,
    ) -> Result<TaskRecord, TaskError> {
        if self.registry.get(job_name).is_none() {
            return Err(TaskError::NotFound(format!("task type '{}'", job_name)));
        }

        let record = self.db.write(|tx| {
            tx.get_user(user_id)?
                .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
            if tx.task_in_progress(user_id, job_name)?.is_some() {
                return Err(StoreError::Conflict(format!(
                    "a '{}' task is already in progress",
                    job_name
                )));
            }
            let id = self.queue.enqueue(job_name, args)?;
            tx.insert_task(&id, job_name, description, user_id)
        })?;

        info!(
            "Launched task {} ({}) for user {}",
            record.id, record.name, user_id
        );
        Ok(record)
    }

    /// Records progress for a task, clamped to 0..=100.
    ///
    /// Replaces the owner's `{job}_progress` notification and, at 100,
    /// marks the task record complete.
    pub fn set_progress(&self, task_id: &str, percent: u8) -> Result<(), TaskError> {
        let percent = percent.min(100);
        if let Err(e) = self.queue.set_progress(task_id, percent) {
            warn!("Queue progress update for {} failed: {:#}", task_id, e);
        }

        let payload = serde_json::to_value(TaskProgressPayload {
            task_id: task_id.to_string(),
            progress: percent,
        })?;

        self.db.write(|tx| {
            let task = tx
                .get_task(task_id)?
                .ok_or_else(|| StoreError::NotFound(format!("task {}", task_id)))?;
            tx.add_notification(
                task.user_id,
                &progress_notification_name(&task.name),
                &payload,
            )?;
            if percent >= 100 {
                tx.complete_task(task_id)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    pub fn list_in_progress(&self, user_id: i64) -> Result<Vec<TaskRecord>, TaskError> {
        Ok(self.db.tasks_in_progress(user_id)?)
    }

    pub fn get_in_progress(
        &self,
        user_id: i64,
        job_name: &str,
    ) -> Result<Option<TaskRecord>, TaskError> {
        Ok(self.db.task_in_progress(user_id, job_name)?)
    }

    /// Live progress from the queue. Jobs the queue no longer knows, or
    /// cannot report on, count as done.
    pub fn get_progress(&self, task_id: &str) -> u8 {
        match self.queue.get_meta(task_id) {
            Ok(Some(meta)) => meta.progress,
            Ok(None) => {
                warn!("Task {} is unknown to the queue, reporting 100", task_id);
                100
            }
            Err(e) => {
                warn!("Failed to read progress of {}: {:#}", task_id, e);
                100
            }
        }
    }

    pub fn view(&self, task: TaskRecord) -> TaskView {
        let progress = if task.complete {
            100
        } else {
            self.get_progress(&task.id)
        };
        TaskView { task, progress }
    }

    pub fn mark_outcome(&self, task_id: &str, outcome: TaskOutcome) -> Result<TaskRecord, TaskError> {
        Ok(self.db.write(|tx| tx.set_task_outcome(task_id, outcome))?)
    }

    /// Marks incomplete records the queue has never heard of as interrupted.
    ///
    /// Queue metadata does not survive a restart, so without this such
    /// records would stay in progress forever.
    pub fn recover_interrupted(&self) -> Result<usize, TaskError> {
        let mut recovered = 0;
        for task in self.db.incomplete_tasks()? {
            if self.queue.get_meta(&task.id).ok().flatten().is_some() {
                continue;
            }
            self.mark_outcome(&task.id, TaskOutcome::Interrupted)?;
            warn!(
                "Task {} ({}) of user {} was interrupted by a restart",
                task.id, task.name, task.user_id
            );
            recovered += 1;
        }
        Ok(recovered)
    }
}
