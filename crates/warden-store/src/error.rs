//! Error types for the warden-store crate.

use thiserror::Error;

/// Persistence errors.
///
/// Wraps the backing store's failures with enough shape for callers to
/// distinguish the recoverable cases. Transactional composites either
/// commit fully or surface one of these with state unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to establish or acquire a connection.
    #[error("Store connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    /// A query or transaction failed to execute.
    #[error("Store query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// The referenced row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Check if this error indicates a missing row.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Check if this error indicates a uniqueness conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err)
            }
            _ => StoreError::Query(err),
        }
    }
}
