//! Microblog server library.
//!
//! Exposes the store, search, background job and HTTP layers to the
//! binaries and the end-to-end tests.

pub mod background_jobs;
pub mod config;
pub mod mail;
pub mod notifications;
pub mod search;
pub mod server;
pub mod sqlite_persistence;
pub mod store;

pub use search::{NoOpSearchIndex, SearchIndex};
pub use server::{run_server, RequestsLoggingLevel};
pub use store::Database;
