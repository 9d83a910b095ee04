use super::change_set::{ChangeSet, CommitObserver};
use super::error::{ObserverFailure, StoreError};
use super::models::{
    to_millis, Message, Notification, Post, TaskRecord, User, UserCounts,
};
use super::queries;
use super::schema::MICROBLOG_VERSIONED_SCHEMAS;
use super::tokens::{hash_token, ApiToken, TOKEN_LIFETIME_SECS};
use super::transaction::Transaction;
use crate::sqlite_persistence::{open_versioned, prepare_schema};
use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// Result of a write whose commit succeeded, together with the failures of
/// any observer that could not mirror it.
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    pub changes: ChangeSet,
    pub observer_errors: Vec<ObserverFailure>,
}

/// The relational store.
///
/// All access goes through one connection behind a mutex. Writes run in a
/// [`Transaction`] and, once committed, their [`ChangeSet`] is handed to the
/// registered observers in order.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    observers: Arc<Vec<Arc<dyn CommitObserver>>>,
}

fn limit_offset(page: u32, per_page: u32) -> (i64, i64) {
    let page = page.max(1) as i64;
    let per_page = per_page as i64;
    (per_page, (page - 1) * per_page)
}

impl Database {
    pub fn open<P: AsRef<Path>>(
        db_path: P,
        observers: Vec<Arc<dyn CommitObserver>>,
    ) -> Result<Self> {
        let conn = open_versioned(db_path, MICROBLOG_VERSIONED_SCHEMAS)?;
        Ok(Self::with_connection(conn, observers))
    }

    pub fn open_in_memory(observers: Vec<Arc<dyn CommitObserver>>) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        prepare_schema(&mut conn, MICROBLOG_VERSIONED_SCHEMAS)?;
        Ok(Self::with_connection(conn, observers))
    }

    fn with_connection(conn: Connection, observers: Vec<Arc<dyn CommitObserver>>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            observers: Arc::new(observers),
        }
    }

    pub fn observer_names(&self) -> Vec<&'static str> {
        self.observers.iter().map(|o| o.name()).collect()
    }

    /// Runs `f` in a transaction and commits it.
    ///
    /// If `f` fails the transaction is rolled back and no observer runs.
    /// If an observer fails after the commit, the data stays committed and
    /// the first failure is returned as [`StoreError::PostCommit`].
    pub fn write<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, StoreError>,
    {
        let committed = self.write_committed(f)?;
        match committed.observer_errors.into_iter().next() {
            Some(failure) => Err(failure.into()),
            None => Ok(committed.value),
        }
    }

    /// Like [`Database::write`], but returns the committed value even when
    /// observers failed, along with every failure.
    pub fn write_committed<T, F>(&self, f: F) -> Result<Committed<T>, StoreError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, StoreError>,
    {
        let (value, changes) = {
            let mut conn = self.conn.lock().unwrap();
            let mut tx = Transaction::new(conn.transaction()?);
            let value = f(&mut tx)?;
            let changes = tx.commit()?;
            (value, changes)
        };

        let observer_errors = self.notify_observers(&changes);
        Ok(Committed {
            value,
            changes,
            observer_errors,
        })
    }

    fn notify_observers(&self, changes: &ChangeSet) -> Vec<ObserverFailure> {
        let mut failures = Vec::new();
        for observer in self.observers.iter() {
            debug!(
                "Notifying observer '{}' of {} change(s)",
                observer.name(),
                changes.len()
            );
            if let Err(e) = observer.after_commit(changes) {
                error!("Observer '{}' failed after commit: {:#}", observer.name(), e);
                failures.push(ObserverFailure {
                    observer: observer.name(),
                    error: e,
                });
            }
        }
        failures
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T, StoreError> {
        let conn = self.conn.lock().unwrap();
        Ok(f(&conn)?)
    }

    // =========================================================================
    // Users and tokens
    // =========================================================================

    pub fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.read(|c| queries::get_user(c, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.read(|c| queries::get_user_by_username(c, username))
    }

    pub fn all_users(&self) -> Result<Vec<User>, StoreError> {
        self.read(queries::all_users)
    }

    pub fn user_counts(&self, user_id: i64) -> Result<UserCounts, StoreError> {
        self.read(|c| queries::user_counts(c, user_id))
    }

    /// Resolves a raw bearer token to its unexpired owner.
    pub fn user_by_token(&self, raw_token: &str) -> Result<Option<User>, StoreError> {
        let token_hash = hash_token(raw_token);
        let now_ms = to_millis(&Utc::now());
        self.read(|c| queries::user_by_token_hash(c, &token_hash, now_ms))
    }

    /// Issues a fresh token for the user. Any previous token stops working.
    pub fn issue_token(&self, user_id: i64) -> Result<ApiToken, StoreError> {
        let token = ApiToken::generate();
        let expiration = Utc::now() + Duration::seconds(TOKEN_LIFETIME_SECS);
        self.write(|tx| tx.set_user_token(user_id, &token.hash(), expiration))?;
        Ok(token)
    }

    pub fn revoke_token(&self, user_id: i64) -> Result<(), StoreError> {
        self.write(|tx| tx.revoke_user_token(user_id))
    }

    // =========================================================================
    // Followers
    // =========================================================================

    pub fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        self.read(|c| queries::is_following(c, follower_id, followed_id))
    }

    pub fn followers_page(
        &self,
        user_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<User>, u64), StoreError> {
        let (limit, offset) = limit_offset(page, per_page);
        self.read(|c| queries::followers_page(c, user_id, limit, offset))
    }

    pub fn followed_page(
        &self,
        user_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<User>, u64), StoreError> {
        let (limit, offset) = limit_offset(page, per_page);
        self.read(|c| queries::followed_page(c, user_id, limit, offset))
    }

    // =========================================================================
    // Posts
    // =========================================================================

    pub fn get_post(&self, id: i64) -> Result<Option<Post>, StoreError> {
        self.read(|c| queries::get_post(c, id))
    }

    pub fn posts_by_ids(&self, ids: &[i64]) -> Result<Vec<Post>, StoreError> {
        self.read(|c| queries::posts_by_ids(c, ids))
    }

    pub fn all_posts(&self) -> Result<Vec<Post>, StoreError> {
        self.read(queries::all_posts)
    }

    pub fn user_posts_ascending(&self, user_id: i64) -> Result<Vec<Post>, StoreError> {
        self.read(|c| queries::user_posts_ascending(c, user_id))
    }

    pub fn count_user_posts(&self, user_id: i64) -> Result<u64, StoreError> {
        self.read(|c| queries::count_user_posts(c, user_id))
    }

    pub fn followed_posts(
        &self,
        user_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Post>, u64), StoreError> {
        let (limit, offset) = limit_offset(page, per_page);
        self.read(|c| queries::followed_posts(c, user_id, limit, offset))
    }

    // =========================================================================
    // Messages and notifications
    // =========================================================================

    pub fn messages_received(
        &self,
        user_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Message>, u64), StoreError> {
        let (limit, offset) = limit_offset(page, per_page);
        self.read(|c| queries::messages_received(c, user_id, limit, offset))
    }

    pub fn new_messages_count(&self, user_id: i64) -> Result<u64, StoreError> {
        self.read(|c| queries::new_messages_count(c, user_id))
    }

    pub fn notifications_since(
        &self,
        user_id: i64,
        since: f64,
    ) -> Result<Vec<Notification>, StoreError> {
        self.read(|c| queries::notifications_since(c, user_id, since))
    }

    pub fn notifications_named(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<Vec<Notification>, StoreError> {
        self.read(|c| queries::notifications_named(c, user_id, name))
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn get_task(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        self.read(|c| queries::get_task(c, id))
    }

    pub fn tasks_in_progress(&self, user_id: i64) -> Result<Vec<TaskRecord>, StoreError> {
        self.read(|c| queries::tasks_in_progress(c, user_id))
    }

    pub fn task_in_progress(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<Option<TaskRecord>, StoreError> {
        self.read(|c| queries::task_in_progress(c, user_id, name))
    }

    pub fn incomplete_tasks(&self) -> Result<Vec<TaskRecord>, StoreError> {
        self.read(queries::incomplete_tasks)
    }
}
