use super::change_set::{ChangeSet, Entity};
use super::error::StoreError;
use super::models::{
    epoch_seconds, to_millis, Message, Notification, Post, TaskOutcome, TaskRecord, User,
    MAX_POST_LENGTH,
};
use super::queries;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

/// An open write transaction.
///
/// Every write records a snapshot of the affected row in the transaction's
/// [`ChangeSet`]. Dropping the transaction without committing rolls it back.
pub struct Transaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
    changes: ChangeSet,
}

fn validate_post_body(body: &str) -> Result<String, StoreError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(StoreError::Invalid("post body is empty".to_string()));
    }
    if body.chars().count() > MAX_POST_LENGTH {
        return Err(StoreError::Invalid(format!(
            "post body is longer than {} characters",
            MAX_POST_LENGTH
        )));
    }
    Ok(body.to_string())
}

impl<'conn> Transaction<'conn> {
    pub(super) fn new(tx: rusqlite::Transaction<'conn>) -> Self {
        Self {
            tx,
            changes: ChangeSet::default(),
        }
    }

    pub(super) fn commit(self) -> Result<ChangeSet, StoreError> {
        self.tx.commit()?;
        Ok(self.changes)
    }

    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    fn require_user(&self, id: i64) -> Result<User, StoreError> {
        queries::get_user(&self.tx, id)?.ok_or_else(|| StoreError::NotFound(format!("user {}", id)))
    }

    fn require_post(&self, id: i64) -> Result<Post, StoreError> {
        queries::get_post(&self.tx, id)?.ok_or_else(|| StoreError::NotFound(format!("post {}", id)))
    }

    fn require_task(&self, id: &str) -> Result<TaskRecord, StoreError> {
        queries::get_task(&self.tx, id)?.ok_or_else(|| StoreError::NotFound(format!("task {}", id)))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(queries::get_user(&self.tx, id)?)
    }

    pub fn get_post(&self, id: i64) -> Result<Option<Post>, StoreError> {
        Ok(queries::get_post(&self.tx, id)?)
    }

    /// Loads a post, failing unless `user_id` wrote it.
    pub fn require_own_post(&self, post_id: i64, user_id: i64) -> Result<Post, StoreError> {
        let post = self.require_post(post_id)?;
        if post.user_id != user_id {
            return Err(StoreError::Forbidden(format!(
                "post {} belongs to another user",
                post_id
            )));
        }
        Ok(post)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        Ok(queries::get_task(&self.tx, id)?)
    }

    pub fn task_in_progress(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<Option<TaskRecord>, StoreError> {
        Ok(queries::task_in_progress(&self.tx, user_id, name)?)
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn insert_user(&mut self, username: &str, email: &str) -> Result<User, StoreError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() {
            return Err(StoreError::Invalid(
                "username and email are required".to_string(),
            ));
        }
        let taken: bool = self.tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 OR email = ?2)",
            params![username, email],
            |row| row.get(0),
        )?;
        if taken {
            return Err(StoreError::Conflict(
                "username or email already in use".to_string(),
            ));
        }
        self.tx.execute(
            "INSERT INTO users (username, email, last_seen) VALUES (?1, ?2, ?3)",
            params![username, email, to_millis(&Utc::now())],
        )?;
        let user = self.require_user(self.tx.last_insert_rowid())?;
        self.changes.record_new(Entity::User(user.clone()));
        Ok(user)
    }

    pub fn update_user_profile(
        &mut self,
        user_id: i64,
        about_me: Option<&str>,
    ) -> Result<User, StoreError> {
        let updated = self.tx.execute(
            "UPDATE users SET about_me = ?1 WHERE id = ?2",
            params![about_me, user_id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }
        let user = self.require_user(user_id)?;
        self.changes.record_modified(Entity::User(user.clone()));
        Ok(user)
    }

    pub fn touch_last_seen(&mut self, user_id: i64) -> Result<(), StoreError> {
        self.tx.execute(
            "UPDATE users SET last_seen = ?1 WHERE id = ?2",
            params![to_millis(&Utc::now()), user_id],
        )?;
        let user = self.require_user(user_id)?;
        self.changes.record_modified(Entity::User(user));
        Ok(())
    }

    pub fn set_user_token(
        &mut self,
        user_id: i64,
        token_hash: &str,
        expiration: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let updated = self.tx.execute(
            "UPDATE users SET token_hash = ?1, token_expiration = ?2 WHERE id = ?3",
            params![token_hash, to_millis(&expiration), user_id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }

    /// Expires the user's token one second in the past.
    pub fn revoke_user_token(&mut self, user_id: i64) -> Result<(), StoreError> {
        let expired = Utc::now() - chrono::Duration::seconds(1);
        self.tx.execute(
            "UPDATE users SET token_expiration = ?1 WHERE id = ?2",
            params![to_millis(&expired), user_id],
        )?;
        Ok(())
    }

    // =========================================================================
    // Followers
    // =========================================================================

    /// Returns false when the relation already existed.
    pub fn follow(&mut self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        if follower_id == followed_id {
            return Err(StoreError::Invalid("users cannot follow themselves".to_string()));
        }
        self.require_user(follower_id)?;
        self.require_user(followed_id)?;
        let inserted = self.tx.execute(
            "INSERT OR IGNORE INTO followers (follower_id, followed_id) VALUES (?1, ?2)",
            params![follower_id, followed_id],
        )?;
        Ok(inserted > 0)
    }

    /// Returns false when there was nothing to remove.
    pub fn unfollow(&mut self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        self.require_user(followed_id)?;
        let removed = self.tx.execute(
            "DELETE FROM followers WHERE follower_id = ?1 AND followed_id = ?2",
            params![follower_id, followed_id],
        )?;
        Ok(removed > 0)
    }

    // =========================================================================
    // Posts
    // =========================================================================

    pub fn insert_post(
        &mut self,
        user_id: i64,
        body: &str,
        language: Option<&str>,
    ) -> Result<Post, StoreError> {
        self.insert_post_at(user_id, body, language, Utc::now())
    }

    pub fn insert_post_at(
        &mut self,
        user_id: i64,
        body: &str,
        language: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<Post, StoreError> {
        let body = validate_post_body(body)?;
        self.require_user(user_id)?;
        self.tx.execute(
            "INSERT INTO posts (body, timestamp, user_id, language) VALUES (?1, ?2, ?3, ?4)",
            params![body, to_millis(&timestamp), user_id, language],
        )?;
        let post = self.require_post(self.tx.last_insert_rowid())?;
        self.changes.record_new(Entity::Post(post.clone()));
        Ok(post)
    }

    pub fn update_post_body(&mut self, post_id: i64, body: &str) -> Result<Post, StoreError> {
        let body = validate_post_body(body)?;
        let updated = self.tx.execute(
            "UPDATE posts SET body = ?1 WHERE id = ?2",
            params![body, post_id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("post {}", post_id)));
        }
        let post = self.require_post(post_id)?;
        self.changes.record_modified(Entity::Post(post.clone()));
        Ok(post)
    }

    pub fn delete_post(&mut self, post_id: i64) -> Result<Post, StoreError> {
        let post = self.require_post(post_id)?;
        self.tx
            .execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;
        self.changes.record_deleted(Entity::Post(post.clone()));
        Ok(post)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    pub fn insert_message(
        &mut self,
        sender_id: i64,
        recipient_id: i64,
        body: &str,
    ) -> Result<Message, StoreError> {
        let body = validate_post_body(body)?;
        self.require_user(sender_id)?;
        self.require_user(recipient_id)?;
        self.tx.execute(
            "INSERT INTO messages (sender_id, recipient_id, body, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![sender_id, recipient_id, body, to_millis(&Utc::now())],
        )?;
        let message = queries::get_message(&self.tx, self.tx.last_insert_rowid())?
            .ok_or_else(|| StoreError::NotFound("message".to_string()))?;
        self.changes.record_new(Entity::Message(message.clone()));
        Ok(message)
    }

    pub fn mark_messages_read(&mut self, user_id: i64) -> Result<(), StoreError> {
        self.tx.execute(
            "UPDATE users SET last_message_read_time = ?1 WHERE id = ?2",
            params![to_millis(&Utc::now()), user_id],
        )?;
        let user = self.require_user(user_id)?;
        self.changes.record_modified(Entity::User(user));
        Ok(())
    }

    pub fn new_messages_count(&self, user_id: i64) -> Result<u64, StoreError> {
        Ok(queries::new_messages_count(&self.tx, user_id)?)
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Replaces the user's notification called `name` with a fresh one.
    ///
    /// At most one notification per user and name exists afterwards.
    pub fn add_notification(
        &mut self,
        user_id: i64,
        name: &str,
        payload: &serde_json::Value,
    ) -> Result<Notification, StoreError> {
        for previous in queries::notifications_named(&self.tx, user_id, name)? {
            self.tx.execute(
                "DELETE FROM notifications WHERE id = ?1",
                params![previous.id],
            )?;
            self.changes.record_deleted(Entity::Notification(previous));
        }

        let payload_json = serde_json::to_string(payload)
            .map_err(|e| StoreError::Invalid(format!("notification payload: {}", e)))?;
        self.tx.execute(
            "INSERT INTO notifications (name, user_id, timestamp, payload_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, user_id, epoch_seconds(), payload_json],
        )?;
        let notification = queries::get_notification(&self.tx, self.tx.last_insert_rowid())?
            .ok_or_else(|| StoreError::NotFound("notification".to_string()))?;
        self.changes
            .record_new(Entity::Notification(notification.clone()));
        Ok(notification)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn insert_task(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        user_id: i64,
    ) -> Result<TaskRecord, StoreError> {
        self.require_user(user_id)?;
        self.tx.execute(
            "INSERT INTO tasks (id, name, description, user_id, complete, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![id, name, description, user_id, to_millis(&Utc::now())],
        )?;
        let task = self.require_task(id)?;
        self.changes.record_new(Entity::Task(task.clone()));
        Ok(task)
    }

    /// Flips the completion flag. Completed tasks stay completed.
    pub fn complete_task(&mut self, id: &str) -> Result<TaskRecord, StoreError> {
        let updated = self
            .tx
            .execute("UPDATE tasks SET complete = 1 WHERE id = ?1", params![id])?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("task {}", id)));
        }
        let task = self.require_task(id)?;
        self.changes.record_modified(Entity::Task(task.clone()));
        Ok(task)
    }

    /// Records how a task ended and marks it complete.
    pub fn set_task_outcome(
        &mut self,
        id: &str,
        outcome: TaskOutcome,
    ) -> Result<TaskRecord, StoreError> {
        let updated = self.tx.execute(
            "UPDATE tasks SET complete = 1, outcome = ?1 WHERE id = ?2",
            params![outcome.as_str(), id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("task {}", id)));
        }
        let task = self.require_task(id)?;
        self.changes.record_modified(Entity::Task(task.clone()));
        Ok(task)
    }
}
