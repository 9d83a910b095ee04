//! User notifications: well-known names, payloads and the polling view.

mod models;

pub use models::{
    notifications_since, notify_unread_messages, progress_notification_name, NotificationView,
    TaskProgressPayload, UNREAD_MESSAGE_COUNT,
};
