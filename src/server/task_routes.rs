//! Launching and polling background tasks.

use super::error::{blocking, ApiError};
use super::session::Session;
use super::state::ServerState;
use crate::background_jobs::{TaskManager, TaskView};
use crate::store::Database;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

/// Launches the named task for the caller.
///
/// A user runs at most one task of each type at a time, a second launch
/// answers 409.
async fn launch_task(
    session: Session,
    State(manager): State<TaskManager>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = session.user_id();
    let view = blocking(move || {
        let task = manager
            .registry()
            .get(&name)
            .ok_or_else(|| ApiError::NotFound(format!("task type '{}' not found", name)))?;
        let record = manager.launch(user_id, task.name(), task.description(), json!({}))?;
        Ok(manager.view(record))
    })
    .await?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

async fn list_tasks(
    session: Session,
    State(manager): State<TaskManager>,
) -> Result<Json<Vec<TaskView>>, ApiError> {
    let user_id = session.user_id();
    let views = blocking(move || {
        Ok(manager
            .list_in_progress(user_id)?
            .into_iter()
            .map(|task| manager.view(task))
            .collect())
    })
    .await?;
    Ok(Json(views))
}

async fn get_task(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<TaskView>, ApiError> {
    let user_id = session.user_id();
    let db: Database = state.db.clone();
    let manager = state.task_manager.clone();
    let view = blocking(move || {
        // Other users' tasks are indistinguishable from missing ones
        let task = db
            .get_task(&id)?
            .filter(|task| task.user_id == user_id)
            .ok_or_else(|| ApiError::NotFound(format!("task {} not found", id)))?;
        Ok(manager.view(task))
    })
    .await?;
    Ok(Json(view))
}

pub fn make_task_routes(state: ServerState) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/{id}", get(get_task).post(launch_task))
        .with_state(state)
}
