//! Relational store: users, posts, followers, messages, notifications and
//! task records, with post-commit change observation.

mod change_set;
mod database;
mod error;
mod models;
mod queries;
mod schema;
mod tokens;
mod transaction;

pub use change_set::{ChangeSet, CommitObserver, Entity, EntityKey};
pub use database::{Committed, Database};
pub use error::{ObserverFailure, StoreError};
pub use models::{
    epoch_seconds, Message, Notification, Post, TaskOutcome, TaskRecord, User, UserCounts,
    MAX_POST_LENGTH,
};
pub use schema::MICROBLOG_VERSIONED_SCHEMAS;
pub use tokens::{hash_token, ApiToken, TOKEN_LIFETIME_SECS};
pub use transaction::Transaction;
