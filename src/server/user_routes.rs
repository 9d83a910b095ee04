//! User profiles and the follower graph.

use super::error::{blocking, ApiError};
use super::pagination::{PageQuery, Paginated, DEFAULT_USERS_PER_PAGE};
use super::session::Session;
use crate::store::{Database, User};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub last_seen: DateTime<Utc>,
    pub about_me: Option<String>,
    pub post_count: u64,
    pub follower_count: u64,
    pub followed_count: u64,
}

#[derive(Deserialize, Debug)]
struct UpdateProfileBody {
    pub about_me: Option<String>,
}

fn user_view(db: &Database, user: User) -> Result<UserView, ApiError> {
    let counts = db.user_counts(user.id)?;
    Ok(UserView {
        id: user.id,
        username: user.username,
        last_seen: user.last_seen,
        about_me: user.about_me,
        post_count: counts.post_count,
        follower_count: counts.follower_count,
        followed_count: counts.followed_count,
    })
}

fn require_user(db: &Database, id: i64) -> Result<User, ApiError> {
    db.get_user(id)?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", id)))
}

async fn get_user(
    _session: Session,
    State(db): State<Database>,
    Path(id): Path<i64>,
) -> Result<Json<UserView>, ApiError> {
    let view = blocking(move || {
        let user = require_user(&db, id)?;
        user_view(&db, user)
    })
    .await?;
    Ok(Json(view))
}

async fn update_profile(
    session: Session,
    State(db): State<Database>,
    Json(body): Json<UpdateProfileBody>,
) -> Result<Json<UserView>, ApiError> {
    let user_id = session.user_id();
    let view = blocking(move || {
        let about_me = body
            .about_me
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let user = db
            .write_committed(|tx| tx.update_user_profile(user_id, about_me))?
            .value;
        user_view(&db, user)
    })
    .await?;
    Ok(Json(view))
}

#[derive(Clone, Copy)]
enum Direction {
    Followers,
    Followed,
}

async fn user_page(
    db: Database,
    id: i64,
    query: PageQuery,
    direction: Direction,
) -> Result<Json<Paginated<UserView>>, ApiError> {
    let page = query.page();
    let per_page = query.per_page(DEFAULT_USERS_PER_PAGE);
    let (views, total) = blocking(move || {
        require_user(&db, id)?;
        let (users, total) = match direction {
            Direction::Followers => db.followers_page(id, page, per_page)?,
            Direction::Followed => db.followed_page(id, page, per_page)?,
        };
        let views = users
            .into_iter()
            .map(|user| user_view(&db, user))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((views, total))
    })
    .await?;

    let path = match direction {
        Direction::Followers => format!("/v1/users/{}/followers", id),
        Direction::Followed => format!("/v1/users/{}/followed", id),
    };
    Ok(Json(Paginated::new(views, total, page, per_page, &path, None)))
}

async fn get_followers(
    _session: Session,
    State(db): State<Database>,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<UserView>>, ApiError> {
    user_page(db, id, query, Direction::Followers).await
}

async fn get_followed(
    _session: Session,
    State(db): State<Database>,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<UserView>>, ApiError> {
    user_page(db, id, query, Direction::Followed).await
}

async fn follow(
    session: Session,
    State(db): State<Database>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user_id = session.user_id();
    let added = blocking(move || Ok(db.write_committed(|tx| tx.follow(user_id, id))?.value)).await?;
    if added {
        info!("User {} now follows {}", user_id, id);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn unfollow(
    session: Session,
    State(db): State<Database>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user_id = session.user_id();
    blocking(move || Ok(db.write_committed(|tx| tx.unfollow(user_id, id))?.value)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn make_user_routes(state: super::state::ServerState) -> Router {
    Router::new()
        .route("/users/me", put(update_profile))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/followers", get(get_followers))
        .route("/users/{id}/followed", get(get_followed))
        .route("/users/{id}/follow", post(follow).delete(unfollow))
        .with_state(state)
}
