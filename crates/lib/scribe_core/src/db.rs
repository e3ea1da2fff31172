//! Shared storage plumbing.
//!
//! Every store call is bounded by [`STORAGE_TIMEOUT`]. A timeout surfaces as a
//! transient [`StoreError::Timeout`] and is never retried here; retrying is
//! the caller's decision.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Upper bound for a single store round-trip.
pub const STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Postgres SQLSTATE for unique-constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write. Carries the constraint name.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("SQL error: {0}")]
    Sql(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e
            && db.code().as_deref() == Some(UNIQUE_VIOLATION)
        {
            return StoreError::Conflict(db.constraint().unwrap_or("unique").to_string());
        }
        StoreError::Sql(e)
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Run a store future under [`STORAGE_TIMEOUT`].
pub async fn bounded<T, E, F>(fut: F) -> StoreResult<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<StoreError>,
{
    match tokio::time::timeout(STORAGE_TIMEOUT, fut).await {
        Ok(res) => res.map_err(Into::into),
        Err(_) => Err(StoreError::Timeout(STORAGE_TIMEOUT)),
    }
}
