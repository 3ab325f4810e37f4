//! Failures of the CouchDB backend; all of them surface as [`StorageError::Unavailable`].
//!
//! [`StorageError::Unavailable`]: crate::dao::storage::StorageError::Unavailable

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias used throughout the CouchDB backend.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Everything that can go wrong while talking to CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// A required configuration value is absent.
    #[error("missing CouchDB setting `{setting}`")]
    MissingSetting {
        /// Name of the missing setting.
        setting: &'static str,
    },
    /// The configured database name breaks CouchDB naming rules.
    #[error("`{database}` is not a valid CouchDB database name")]
    InvalidDatabaseName {
        /// Database name as configured.
        database: String,
    },
    /// The HTTP client could not be built.
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
    /// Database could neither be read nor created.
    #[error("CouchDB database `{database}` answered {status}")]
    DatabaseStatus {
        /// Database name as configured.
        database: String,
        /// Status CouchDB answered with.
        status: StatusCode,
    },
    /// The request never got an answer.
    #[error("CouchDB request to `{path}` failed")]
    RequestSend {
        /// Document or endpoint path inside the database.
        path: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB answered with an unexpected status.
    #[error("CouchDB answered {status} for `{path}`")]
    RequestStatus {
        /// Document or endpoint path inside the database.
        path: String,
        /// Status CouchDB answered with.
        status: StatusCode,
    },
    /// A concurrent writer updated the document first.
    #[error("CouchDB revision conflict on `{path}`")]
    Conflict {
        /// Document or endpoint path inside the database.
        path: String,
    },
    /// The response body was not the expected JSON.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        /// Document or endpoint path inside the database.
        path: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
    /// A stored document could not be read into its model.
    #[error("CouchDB document `{path}` does not match the expected shape")]
    DeserializeValue {
        /// Document or endpoint path inside the database.
        path: String,
        /// Underlying decoding error.
        #[source]
        source: serde_json::Error,
    },
}
