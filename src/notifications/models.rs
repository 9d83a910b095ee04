//! Notification data models

use crate::store::{Database, Notification, StoreError, Transaction};
use serde::{Deserialize, Serialize};

/// Carries the number of messages received since the inbox was last read.
pub const UNREAD_MESSAGE_COUNT: &str = "unread_message_count";

/// Name of the progress notification of a background job type.
pub fn progress_notification_name(job_name: &str) -> String {
    format!("{}_progress", job_name)
}

/// Payload of a `{job}_progress` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgressPayload {
    pub task_id: String,
    pub progress: u8,
}

/// A notification as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationView {
    pub id: i64,
    pub name: String,
    pub data: serde_json::Value,
    pub timestamp: f64,
}

impl From<Notification> for NotificationView {
    fn from(notification: Notification) -> Self {
        let data = notification.payload();
        Self {
            id: notification.id,
            name: notification.name,
            data,
            timestamp: notification.timestamp,
        }
    }
}

/// Notifications newer than `since` (epoch seconds), oldest first.
pub fn notifications_since(
    db: &Database,
    user_id: i64,
    since: f64,
) -> Result<Vec<NotificationView>, StoreError> {
    Ok(db
        .notifications_since(user_id, since)?
        .into_iter()
        .map(NotificationView::from)
        .collect())
}

/// Replaces the user's unread message count with the current value.
pub fn notify_unread_messages(
    tx: &mut Transaction<'_>,
    user_id: i64,
) -> Result<Notification, StoreError> {
    let count = tx.new_messages_count(user_id)?;
    tx.add_notification(user_id, UNREAD_MESSAGE_COUNT, &serde_json::json!(count))
}
