//! Private messages and notification polling.

use super::error::{blocking, ApiError};
use super::pagination::{PageQuery, Paginated};
use super::session::Session;
use super::state::ServerState;
use crate::notifications::{self, notify_unread_messages, NotificationView};
use crate::store::{Database, Message};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct SendMessageBody {
    /// Recipient username.
    pub recipient: String,
    pub body: String,
}

#[derive(Deserialize, Debug, Default)]
struct NotificationsQuery {
    /// Epoch seconds. Only newer notifications are returned.
    pub since: Option<f64>,
}

async fn send_message(
    session: Session,
    State(db): State<Database>,
    Json(body): Json<SendMessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    let sender_id = session.user_id();
    let message = blocking(move || {
        let recipient = db
            .get_user_by_username(&body.recipient)?
            .ok_or_else(|| ApiError::NotFound(format!("user '{}' not found", body.recipient)))?;
        let committed = db.write_committed(|tx| {
            let message = tx.insert_message(sender_id, recipient.id, &body.body)?;
            notify_unread_messages(tx, recipient.id)?;
            Ok(message)
        })?;
        Ok(committed.value)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Lists the inbox, newest first, and marks it read.
async fn get_messages(
    session: Session,
    State(state): State<ServerState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<Message>>, ApiError> {
    let user_id = session.user_id();
    let page = query.page();
    let per_page = query.per_page(state.config.posts_per_page);
    let db = state.db.clone();
    let (messages, total) = blocking(move || {
        db.write_committed(|tx| {
            tx.mark_messages_read(user_id)?;
            notify_unread_messages(tx, user_id)
        })?;
        Ok(db.messages_received(user_id, page, per_page)?)
    })
    .await?;
    Ok(Json(Paginated::new(
        messages,
        total,
        page,
        per_page,
        "/v1/messages",
        None,
    )))
}

async fn get_notifications(
    session: Session,
    State(db): State<Database>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Vec<NotificationView>>, ApiError> {
    let user_id = session.user_id();
    let since = query.since.unwrap_or(0.0);
    let views =
        blocking(move || Ok(notifications::notifications_since(&db, user_id, since)?)).await?;
    Ok(Json(views))
}

pub fn make_message_routes(state: ServerState) -> Router {
    Router::new()
        .route("/messages", get(get_messages).post(send_message))
        .route("/notifications", get(get_notifications))
        .with_state(state)
}
