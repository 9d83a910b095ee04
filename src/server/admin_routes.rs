use super::error::{blocking, ApiError};
use super::session::Session;
use super::state::ServerState;
use crate::search::reindex_all;

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use tracing::info;

#[derive(Serialize, Debug)]
struct ReindexResponse {
    indexed: usize,
}

/// Rebuilds the search index from the relational store.
async fn reindex(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Json<ReindexResponse>, ApiError> {
    if !state.config.is_admin(&session.user.username) {
        return Err(ApiError::Forbidden("admin only".to_string()));
    }

    let db = state.db.clone();
    let index = state.search_index.clone();
    let indexed = blocking(move || Ok(reindex_all(&db, index.as_ref())?)).await?;
    info!(
        "Admin {} reindexed {} documents",
        session.user.username, indexed
    );
    Ok(Json(ReindexResponse { indexed }))
}

pub fn make_admin_routes(state: ServerState) -> Router {
    Router::new()
        .route("/reindex", post(reindex))
        .with_state(state)
}
