use thiserror::Error;

/// A post-commit observer that failed to mirror a committed change set.
#[derive(Debug)]
pub struct ObserverFailure {
    pub observer: &'static str,
    pub error: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    /// Any other failure raised inside a write closure. The transaction
    /// was rolled back.
    #[error(transparent)]
    Rollback(#[from] anyhow::Error),

    /// The transaction committed, a mirror of it did not.
    #[error("changes committed, but observer '{observer}' failed: {source}")]
    PostCommit {
        observer: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl StoreError {
    pub fn is_post_commit(&self) -> bool {
        matches!(self, StoreError::PostCommit { .. })
    }
}

impl From<ObserverFailure> for StoreError {
    fn from(failure: ObserverFailure) -> Self {
        StoreError::PostCommit {
            observer: failure.observer,
            source: failure.error,
        }
    }
}
