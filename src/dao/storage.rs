//! Backend-independent storage errors and call deadlines.

use std::{error::Error, time::Duration};

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the call.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Backend-specific description.
        message: String,
        /// Original backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The call did not complete before its deadline.
    #[error("storage operation `{operation}` exceeded its deadline")]
    Timeout {
        /// Name of the call that timed out.
        operation: &'static str,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Await a storage call for at most `limit`, naming it `operation` when the deadline hits.
pub async fn with_deadline<T, F>(limit: Duration, operation: &'static str, call: F) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StorageError::Timeout { operation })?
}
