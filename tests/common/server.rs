//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own database, FTS5 index,
//! recording mailer and task workers.

use super::constants::*;
use super::fixtures::{seed_users, SeededUser};
use microblog_server::background_jobs::{
    default_registry, InMemoryJobQueue, TaskManager, TaskRunner, TaskServices,
};
use microblog_server::mail::MemoryMailer;
use microblog_server::search::{Fts5SearchIndex, IndexSyncObserver, SearchIndex};
use microblog_server::server::{make_app, metrics, serve, RequestsLoggingLevel, ServerConfig, ServerState};
use microblog_server::store::{CommitObserver, Database};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with isolated storage
///
/// When dropped, the server and its workers shut down and temp resources
/// are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Direct database access for assertions and setup
    pub db: Database,

    /// The index the server searches
    pub search_index: Arc<Fts5SearchIndex>,

    /// Every mail the server sent
    pub mailer: MemoryMailer,

    pub user: SeededUser,
    pub other_user: SeededUser,
    pub admin: SeededUser,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if storage setup or port binding fails, or if the server
    /// doesn't become ready within timeout.
    pub async fn spawn() -> Self {
        Self::spawn_with_export_delay(Duration::ZERO).await
    }

    /// Spawns a server whose export task sleeps `delay` per exported post,
    /// keeping it observable while in progress.
    pub async fn spawn_with_export_delay(delay: Duration) -> Self {
        metrics::init_metrics();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let search_index = Arc::new(
            Fts5SearchIndex::new(&temp_dir.path().join("search.db"))
                .expect("Failed to open search index"),
        );
        let observers: Vec<Arc<dyn CommitObserver>> = vec![Arc::new(IndexSyncObserver::new(
            search_index.clone() as Arc<dyn SearchIndex>,
        ))];
        let db = Database::open(temp_dir.path().join("microblog.db"), observers)
            .expect("Failed to open database");
        let (user, other_user, admin) = seed_users(&db).expect("Failed to seed users");

        let mailer = MemoryMailer::new();
        let queue = Arc::new(InMemoryJobQueue::new(Duration::from_secs(500)));
        let task_manager =
            TaskManager::new(db.clone(), queue.clone(), Arc::new(default_registry()));
        let services = TaskServices {
            db: db.clone(),
            mailer: Arc::new(mailer.clone()),
            mail_sender: MAIL_SENDER.to_string(),
            export_step_delay: delay,
        };

        let shutdown = CancellationToken::new();
        TaskRunner::new(queue, task_manager.clone(), services, 2, shutdown.clone())
            .start()
            .await;

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            frontend_dir_path: None,
            posts_per_page: 15,
            admins: vec![ADMIN_USER.to_string()],
            admin_emails: vec![ADMIN_USER_EMAIL.to_string()],
            mail_sender: MAIL_SENDER.to_string(),
        };
        let state = ServerState::new(
            config,
            db.clone(),
            search_index.clone() as Arc<dyn SearchIndex>,
            task_manager,
            Arc::new(mailer.clone()),
        );
        let app = make_app(state);

        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            serve(listener, app, server_shutdown)
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            db,
            search_index,
            mailer,
            user,
            other_user,
            admin,
            _temp_dir: temp_dir,
            shutdown,
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home route
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
