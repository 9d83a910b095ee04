//! Transient job metadata store.
//!
//! Nothing here survives a restart. Durable state lives in the task records.

use super::task::TaskArgs;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Started,
    Finished,
}

#[derive(Debug, Clone)]
pub struct JobMeta {
    pub id: JobId,
    pub name: String,
    pub args: TaskArgs,
    pub status: JobStatus,
    pub progress: u8,
    pub enqueued_at: DateTime<Utc>,
    pub ended_at: Option<Instant>,
}

pub trait JobQueue: Send + Sync {
    /// Queues a job and returns its opaque id.
    fn enqueue(&self, name: &str, args: TaskArgs) -> Result<JobId>;

    /// `None` for unknown ids and for finished jobs past their result TTL.
    fn get_meta(&self, id: &str) -> Result<Option<JobMeta>>;

    fn set_progress(&self, id: &str, percent: u8) -> Result<()>;

    /// Marks the job finished and starts its result TTL.
    fn finish(&self, id: &str) -> Result<()>;

    /// Pops the oldest queued job and marks it started.
    fn take_next(&self) -> Option<JobMeta>;

    /// Signalled whenever a job is enqueued.
    fn job_available(&self) -> Arc<Notify>;
}

struct QueueState {
    pending: VecDeque<JobId>,
    jobs: HashMap<JobId, JobMeta>,
}

pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    notify: Arc<Notify>,
    result_ttl: Duration,
}

impl InMemoryJobQueue {
    pub fn new(result_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                jobs: HashMap::new(),
            }),
            notify: Arc::new(Notify::new()),
            result_ttl,
        }
    }

    fn is_expired(&self, meta: &JobMeta) -> bool {
        meta.ended_at
            .map(|ended| ended.elapsed() >= self.result_ttl)
            .unwrap_or(false)
    }

    fn purge_expired(&self, state: &mut QueueState) {
        state.jobs.retain(|_, meta| !self.is_expired(meta));
    }
}

impl JobQueue for InMemoryJobQueue {
    fn enqueue(&self, name: &str, args: TaskArgs) -> Result<JobId> {
        let id = uuid::Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock().unwrap();
            self.purge_expired(&mut state);
            state.jobs.insert(
                id.clone(),
                JobMeta {
                    id: id.clone(),
                    name: name.to_string(),
                    args,
                    status: JobStatus::Queued,
                    progress: 0,
                    enqueued_at: Utc::now(),
                    ended_at: None,
                },
            );
            state.pending.push_back(id.clone());
        }
        self.notify.notify_one();
        Ok(id)
    }

    fn get_meta(&self, id: &str) -> Result<Option<JobMeta>> {
        let mut state = self.state.lock().unwrap();
        let expired = match state.jobs.get(id) {
            Some(meta) => self.is_expired(meta),
            None => return Ok(None),
        };
        if expired {
            state.jobs.remove(id);
            return Ok(None);
        }
        Ok(state.jobs.get(id).cloned())
    }

    fn set_progress(&self, id: &str, percent: u8) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let meta = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| anyhow!("Unknown job {}", id))?;
        meta.progress = percent.min(100);
        Ok(())
    }

    fn finish(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let meta = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| anyhow!("Unknown job {}", id))?;
        meta.status = JobStatus::Finished;
        meta.ended_at = Some(Instant::now());
        Ok(())
    }

    fn take_next(&self) -> Option<JobMeta> {
        let mut state = self.state.lock().unwrap();
        while let Some(id) = state.pending.pop_front() {
            if let Some(meta) = state.jobs.get_mut(&id) {
                meta.status = JobStatus::Started;
                return Some(meta.clone());
            }
        }
        None
    }

    fn job_available(&self) -> Arc<Notify> {
        self.notify.clone()
    }
}
