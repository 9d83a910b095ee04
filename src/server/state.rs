use axum::extract::FromRef;

use crate::background_jobs::TaskManager;
use crate::mail::Mailer;
use crate::search::SearchIndex;
use crate::store::Database;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedSearchIndex = Arc<dyn SearchIndex>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub db: Database,
    pub search_index: GuardedSearchIndex,
    pub task_manager: TaskManager,
    pub mailer: Arc<dyn Mailer>,
    pub hash: String,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        db: Database,
        search_index: GuardedSearchIndex,
        task_manager: TaskManager,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            db,
            search_index,
            task_manager,
            mailer,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

impl FromRef<ServerState> for Database {
    fn from_ref(input: &ServerState) -> Self {
        input.db.clone()
    }
}

impl FromRef<ServerState> for GuardedSearchIndex {
    fn from_ref(input: &ServerState) -> Self {
        input.search_index.clone()
    }
}

impl FromRef<ServerState> for TaskManager {
    fn from_ref(input: &ServerState) -> Self {
        input.task_manager.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
