//! Post authoring and the home timeline.

use super::error::{blocking, ApiError};
use super::pagination::{PageQuery, Paginated};
use super::session::Session;
use super::state::ServerState;
use crate::store::{Database, Post};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

#[derive(Deserialize, Debug)]
struct CreatePostBody {
    pub body: String,
    pub language: Option<String>,
}

#[derive(Deserialize, Debug)]
struct UpdatePostBody {
    pub body: String,
}

async fn create_post(
    session: Session,
    State(db): State<Database>,
    Json(body): Json<CreatePostBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = session.user_id();
    let post = blocking(move || {
        let committed = db.write_committed(|tx| {
            tx.insert_post(user_id, &body.body, body.language.as_deref())
        })?;
        Ok(committed.value)
    })
    .await?;
    info!("User {} published post {}", user_id, post.id);
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    session: Session,
    State(db): State<Database>,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostBody>,
) -> Result<Json<Post>, ApiError> {
    let user_id = session.user_id();
    let post = blocking(move || {
        let committed = db.write_committed(|tx| {
            tx.require_own_post(id, user_id)?;
            tx.update_post_body(id, &body.body)
        })?;
        Ok(committed.value)
    })
    .await?;
    Ok(Json(post))
}

async fn delete_post(
    session: Session,
    State(db): State<Database>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user_id = session.user_id();
    blocking(move || {
        db.write_committed(|tx| {
            tx.require_own_post(id, user_id)?;
            tx.delete_post(id)
        })?;
        Ok(())
    })
    .await?;
    info!("User {} deleted post {}", user_id, id);
    Ok(StatusCode::NO_CONTENT)
}

async fn timeline(
    session: Session,
    State(state): State<ServerState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<Post>>, ApiError> {
    let user_id = session.user_id();
    let page = query.page();
    let per_page = query.per_page(state.config.posts_per_page);
    let db = state.db.clone();
    let (posts, total) =
        blocking(move || Ok(db.followed_posts(user_id, page, per_page)?)).await?;
    Ok(Json(Paginated::new(
        posts,
        total,
        page,
        per_page,
        "/v1/timeline",
        None,
    )))
}

pub fn make_post_routes(state: ServerState) -> Router {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/{id}", put(update_post).delete(delete_post))
        .route("/timeline", get(timeline))
        .with_state(state)
}
