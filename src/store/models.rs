use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

pub const MAX_POST_LENGTH: usize = 140;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub email: String,
    pub about_me: Option<String>,
    pub last_seen: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub last_message_read_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// A stored notification. The payload is kept as raw JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
    /// Seconds since the epoch, with sub-second precision.
    pub timestamp: f64,
    pub payload_json: String,
}

impl Notification {
    pub fn payload(&self) -> serde_json::Value {
        serde_json::from_str(&self.payload_json).unwrap_or(serde_json::Value::Null)
    }
}

/// How a finished task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded,
    Failed,
    /// The process stopped while the task was queued or running.
    Interrupted,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Succeeded => "succeeded",
            TaskOutcome::Failed => "failed",
            TaskOutcome::Interrupted => "interrupted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "succeeded" => Some(TaskOutcome::Succeeded),
            "failed" => Some(TaskOutcome::Failed),
            "interrupted" => Some(TaskOutcome::Interrupted),
            _ => None,
        }
    }
}

/// Durable record of a background task, keyed by the queue's job id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub user_id: i64,
    pub complete: bool,
    pub outcome: Option<TaskOutcome>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counters shown alongside a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserCounts {
    pub post_count: u64,
    pub follower_count: u64,
    pub followed_count: u64,
}

pub(crate) fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// Current time as fractional epoch seconds, the notification clock.
pub fn epoch_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
