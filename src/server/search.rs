//! Search API routes

use super::error::{blocking, ApiError};
use super::pagination::{PageQuery, Paginated};
use super::session::Session;
use super::state::ServerState;
use crate::search::search_posts;
use crate::store::Post;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

#[derive(Deserialize, Debug, Default)]
struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

async fn search(
    _session: Session,
    State(state): State<ServerState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Paginated<Post>>, ApiError> {
    let text = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing search query 'q'".to_string()))?
        .to_string();
    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let page = paging.page();
    let per_page = paging.per_page(state.config.posts_per_page);

    let db = state.db.clone();
    let index = state.search_index.clone();
    let query_text = text.clone();
    let results = blocking(move || {
        Ok(search_posts(&db, index.as_ref(), &query_text, page, per_page)?)
    })
    .await?;

    let extra = format!("q={}", urlencoding::encode(&text));
    Ok(Json(Paginated::new(
        results.items,
        results.total,
        page,
        per_page,
        "/v1/search",
        Some(&extra),
    )))
}

pub fn make_search_routes(state: ServerState) -> Router {
    Router::new()
        .route("/search", get(search))
        .with_state(state)
}
