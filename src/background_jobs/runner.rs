use super::context::{TaskContext, TaskServices};
use super::manager::TaskManager;
use super::queue::{JobMeta, JobQueue};
use super::task::TaskError;
use crate::server::metrics;
use crate::store::TaskOutcome;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound on how long an idle worker sleeps between queue checks.
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pool of workers draining the job queue.
pub struct TaskRunner {
    queue: Arc<dyn JobQueue>,
    manager: TaskManager,
    services: TaskServices,
    workers: usize,
    shutdown_token: CancellationToken,
}

impl TaskRunner {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        manager: TaskManager,
        services: TaskServices,
        workers: usize,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            queue,
            manager,
            services,
            workers: workers.max(1),
            shutdown_token,
        }
    }

    /// Marks tasks orphaned by a previous run as interrupted, then spawns
    /// the workers.
    pub async fn start(self) -> Vec<JoinHandle<()>> {
        let manager = self.manager.clone();
        match run_blocking(move || manager.recover_interrupted()).await {
            Ok(count) if count > 0 => {
                info!("Marked {} tasks from a previous run as interrupted", count);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to recover interrupted tasks: {}", e);
            }
        }

        info!("Starting {} task workers", self.workers);
        let runner = Arc::new(self);
        (0..runner.workers)
            .map(|worker| {
                let runner = Arc::clone(&runner);
                tokio::spawn(async move { runner.worker_loop(worker).await })
            })
            .collect()
    }

    async fn worker_loop(&self, worker: usize) {
        debug!("Task worker {} started", worker);
        let job_available = self.queue.job_available();

        loop {
            if self.shutdown_token.is_cancelled() {
                break;
            }

            if let Some(job) = self.queue.take_next() {
                self.run_job(job).await;
                continue;
            }

            tokio::select! {
                _ = job_available.notified() => {}
                _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
                _ = self.shutdown_token.cancelled() => break,
            }
        }

        info!("Task worker {} stopped", worker);
    }

    async fn run_job(&self, job: JobMeta) {
        let start_time = Instant::now();

        let Some(task) = self.manager.registry().get(&job.name) else {
            error!("Job {} has unknown task type '{}'", job.id, job.name);
            self.drop_job(&job);
            return;
        };

        // Blocks until the launching transaction has committed.
        let db = self.services.db.clone();
        let job_id = job.id.clone();
        let record = run_blocking(move || {
            db.get_task(&job_id)?
                .ok_or_else(|| TaskError::NotFound(format!("task record {}", job_id)))
        })
        .await;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                error!("Cannot run job {} ({}): {}", job.id, job.name, e);
                self.drop_job(&job);
                return;
            }
        };

        info!(
            "Starting task {} ({}) for user {}",
            record.id, record.name, record.user_id
        );
        metrics::task_started();

        let ctx = TaskContext {
            task_id: record.id.clone(),
            user_id: record.user_id,
            manager: self.manager.clone(),
            services: self.services.clone(),
        };
        let args = job.args.clone();
        let result = tokio::task::spawn_blocking(move || task.execute(&ctx, &args)).await;
        let elapsed = start_time.elapsed();

        let (outcome, status_label) = match result {
            Ok(Ok(())) => {
                info!(
                    "Task {} ({}) for user {} completed in {:?}",
                    record.id, record.name, record.user_id, elapsed
                );
                (TaskOutcome::Succeeded, "success")
            }
            Ok(Err(e)) => {
                error!(
                    "Task {} ({}) for user {} failed after {:?}: {}",
                    record.id, record.name, record.user_id, elapsed, e
                );
                (TaskOutcome::Failed, "failed")
            }
            Err(e) => {
                error!(
                    "Task {} ({}) for user {} panicked after {:?}: {}",
                    record.id, record.name, record.user_id, elapsed, e
                );
                (TaskOutcome::Failed, "panic")
            }
        };

        self.finalize(&record.id, outcome).await;

        metrics::record_task_execution(&job.name, status_label, elapsed);
        metrics::task_finished();
    }

    /// Forces progress to 100, stores the outcome and starts the result TTL.
    async fn finalize(&self, task_id: &str, outcome: TaskOutcome) {
        let manager = self.manager.clone();
        let id = task_id.to_string();
        let result = run_blocking(move || {
            if manager.get_progress(&id) < 100 {
                manager.set_progress(&id, 100)?;
            }
            manager.mark_outcome(&id, outcome)?;
            Ok(())
        })
        .await;
        if let Err(e) = result {
            error!("Failed to finalize task {}: {}", task_id, e);
        }

        if let Err(e) = self.queue.finish(task_id) {
            warn!("Failed to mark job {} finished: {:#}", task_id, e);
        }
    }

    fn drop_job(&self, job: &JobMeta) {
        if let Err(e) = self.queue.finish(&job.id) {
            warn!("Failed to mark job {} finished: {:#}", job.id, e);
        }
        metrics::record_task_execution(&job.name, "failed", Duration::ZERO);
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, TaskError>
where
    F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TaskError::Failed(format!("blocking task panicked: {}", e)))?
}
