//! Read queries shared by [`super::Database`] and [`super::Transaction`].

use super::models::{
    from_millis, Message, Notification, Post, TaskOutcome, TaskRecord, User, UserCounts,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, username, email, about_me, last_seen, last_message_read_time";
const POST_COLUMNS: &str = "id, body, timestamp, user_id, language";
const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, body, timestamp";
const NOTIFICATION_COLUMNS: &str = "id, name, user_id, timestamp, payload_json";
const TASK_COLUMNS: &str = "id, name, description, user_id, complete, outcome, created_at";

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        about_me: row.get("about_me")?,
        last_seen: from_millis(row.get("last_seen")?),
        last_message_read_time: row
            .get::<_, Option<i64>>("last_message_read_time")?
            .map(from_millis),
    })
}

fn row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get("id")?,
        body: row.get("body")?,
        timestamp: from_millis(row.get("timestamp")?),
        user_id: row.get("user_id")?,
        language: row.get("language")?,
    })
}

fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get("id")?,
        sender_id: row.get("sender_id")?,
        recipient_id: row.get("recipient_id")?,
        body: row.get("body")?,
        timestamp: from_millis(row.get("timestamp")?),
    })
}

fn row_to_notification(row: &Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get("id")?,
        name: row.get("name")?,
        user_id: row.get("user_id")?,
        timestamp: row.get("timestamp")?,
        payload_json: row.get("payload_json")?,
    })
}

fn row_to_task(row: &Row) -> rusqlite::Result<TaskRecord> {
    let outcome: Option<String> = row.get("outcome")?;
    Ok(TaskRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        user_id: row.get("user_id")?,
        complete: row.get::<_, i64>("complete")? != 0,
        outcome: outcome.as_deref().and_then(TaskOutcome::parse),
        created_at: from_millis(row.get("created_at")?),
    })
}

// =============================================================================
// Users
// =============================================================================

pub fn get_user(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        row_to_user,
    )
    .optional()
}

pub fn get_user_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        params![username],
        row_to_user,
    )
    .optional()
}

pub fn user_by_token_hash(
    conn: &Connection,
    token_hash: &str,
    now_ms: i64,
) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!(
            "SELECT {USER_COLUMNS} FROM users WHERE token_hash = ?1 AND token_expiration > ?2"
        ),
        params![token_hash, now_ms],
        row_to_user,
    )
    .optional()
}

pub fn all_users(conn: &Connection) -> rusqlite::Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
    let users = stmt.query_map([], row_to_user)?.collect();
    users
}

pub fn user_counts(conn: &Connection, user_id: i64) -> rusqlite::Result<UserCounts> {
    conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM posts WHERE user_id = ?1),
            (SELECT COUNT(*) FROM followers WHERE followed_id = ?1),
            (SELECT COUNT(*) FROM followers WHERE follower_id = ?1)",
        params![user_id],
        |row| {
            Ok(UserCounts {
                post_count: row.get::<_, i64>(0)? as u64,
                follower_count: row.get::<_, i64>(1)? as u64,
                followed_count: row.get::<_, i64>(2)? as u64,
            })
        },
    )
}

// =============================================================================
// Followers
// =============================================================================

pub fn is_following(conn: &Connection, follower_id: i64, followed_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM followers WHERE follower_id = ?1 AND followed_id = ?2)",
        params![follower_id, followed_id],
        |row| row.get(0),
    )
}

pub fn followers_page(
    conn: &Connection,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> rusqlite::Result<(Vec<User>, u64)> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE id IN (SELECT follower_id FROM followers WHERE followed_id = ?1)
         ORDER BY username LIMIT ?2 OFFSET ?3"
    ))?;
    let users = stmt
        .query_map(params![user_id, limit, offset], row_to_user)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM followers WHERE followed_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok((users, total as u64))
}

pub fn followed_page(
    conn: &Connection,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> rusqlite::Result<(Vec<User>, u64)> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE id IN (SELECT followed_id FROM followers WHERE follower_id = ?1)
         ORDER BY username LIMIT ?2 OFFSET ?3"
    ))?;
    let users = stmt
        .query_map(params![user_id, limit, offset], row_to_user)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM followers WHERE follower_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok((users, total as u64))
}

// =============================================================================
// Posts
// =============================================================================

pub fn get_post(conn: &Connection, id: i64) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
        params![id],
        row_to_post,
    )
    .optional()
}

/// Loads the posts with the given ids, in no particular order.
pub fn posts_by_ids(conn: &Connection, ids: &[i64]) -> rusqlite::Result<Vec<Post>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(",");
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE id IN ({placeholders})"
    ))?;
    let posts = stmt.query_map(params_from_iter(ids.iter()), row_to_post)?.collect();
    posts
}

pub fn all_posts(conn: &Connection) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts ORDER BY id"))?;
    let posts = stmt.query_map([], row_to_post)?.collect();
    posts
}

pub fn user_posts_ascending(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE user_id = ?1 ORDER BY timestamp ASC, id ASC"
    ))?;
    let posts = stmt.query_map(params![user_id], row_to_post)?.collect();
    posts
}

pub fn count_user_posts(conn: &Connection, user_id: i64) -> rusqlite::Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Posts of followed users plus the user's own, newest first.
pub fn followed_posts(
    conn: &Connection,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> rusqlite::Result<(Vec<Post>, u64)> {
    const FILTER: &str = "user_id = ?1
        OR user_id IN (SELECT followed_id FROM followers WHERE follower_id = ?1)";
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE {FILTER}
         ORDER BY timestamp DESC, id DESC LIMIT ?2 OFFSET ?3"
    ))?;
    let posts = stmt
        .query_map(params![user_id, limit, offset], row_to_post)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM posts WHERE {FILTER}"),
        params![user_id],
        |row| row.get(0),
    )?;
    Ok((posts, total as u64))
}

// =============================================================================
// Messages
// =============================================================================

pub fn get_message(conn: &Connection, id: i64) -> rusqlite::Result<Option<Message>> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        params![id],
        row_to_message,
    )
    .optional()
}

pub fn messages_received(
    conn: &Connection,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> rusqlite::Result<(Vec<Message>, u64)> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE recipient_id = ?1
         ORDER BY timestamp DESC, id DESC LIMIT ?2 OFFSET ?3"
    ))?;
    let messages = stmt
        .query_map(params![user_id, limit, offset], row_to_message)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok((messages, total as u64))
}

/// Messages received after the user last opened the inbox.
pub fn new_messages_count(conn: &Connection, user_id: i64) -> rusqlite::Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages m JOIN users u ON u.id = m.recipient_id
         WHERE m.recipient_id = ?1
           AND m.timestamp > COALESCE(u.last_message_read_time, -1)",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

// =============================================================================
// Notifications
// =============================================================================

pub fn notifications_since(
    conn: &Connection,
    user_id: i64,
    since: f64,
) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE user_id = ?1 AND timestamp > ?2 ORDER BY timestamp ASC, id ASC"
    ))?;
    let notifications = stmt
        .query_map(params![user_id, since], row_to_notification)?
        .collect();
    notifications
}

pub fn notifications_named(
    conn: &Connection,
    user_id: i64,
    name: &str,
) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE user_id = ?1 AND name = ?2 ORDER BY id"
    ))?;
    let notifications = stmt
        .query_map(params![user_id, name], row_to_notification)?
        .collect();
    notifications
}

pub fn get_notification(conn: &Connection, id: i64) -> rusqlite::Result<Option<Notification>> {
    conn.query_row(
        &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
        params![id],
        row_to_notification,
    )
    .optional()
}

// =============================================================================
// Tasks
// =============================================================================

pub fn get_task(conn: &Connection, id: &str) -> rusqlite::Result<Option<TaskRecord>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        params![id],
        row_to_task,
    )
    .optional()
}

pub fn tasks_in_progress(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<TaskRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND complete = 0
         ORDER BY created_at, id"
    ))?;
    let tasks = stmt.query_map(params![user_id], row_to_task)?.collect();
    tasks
}

pub fn task_in_progress(
    conn: &Connection,
    user_id: i64,
    name: &str,
) -> rusqlite::Result<Option<TaskRecord>> {
    conn.query_row(
        &format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND name = ?2 AND complete = 0
             ORDER BY created_at LIMIT 1"
        ),
        params![user_id, name],
        row_to_task,
    )
    .optional()
}

pub fn incomplete_tasks(conn: &Connection) -> rusqlite::Result<Vec<TaskRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE complete = 0 ORDER BY created_at, id"
    ))?;
    let tasks = stmt.query_map([], row_to_task)?.collect();
    tasks
}
