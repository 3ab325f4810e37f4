use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias used throughout the MongoDB backend.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Everything that can go wrong while talking to MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// A required configuration value is absent.
    #[error("missing MongoDB setting `{setting}`")]
    MissingSetting {
        /// Name of the missing setting.
        setting: &'static str,
    },
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// URI as configured.
        uri: String,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// The driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// The database did not answer when the connection was opened.
    #[error("MongoDB database `{database}` did not answer the initial ping")]
    InitialPing {
        /// Database the connection targets.
        database: String,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// A periodic health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// An index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection owning the index.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// Writing a snapshot failed.
    #[error("failed to save snapshot `{key}`")]
    SaveSnapshot {
        /// Snapshot key.
        key: String,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a snapshot failed.
    #[error("failed to load snapshot `{key}`")]
    LoadSnapshot {
        /// Snapshot key.
        key: String,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// Looking up a user failed.
    #[error("failed to look up user `{username}`")]
    FindUser {
        /// Username that was looked up.
        username: String,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// Incrementing a win counter failed.
    #[error("failed to record win for user `{id}`")]
    RecordWin {
        /// Id of the user that won.
        id: String,
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
    /// Listing users for the leaderboard failed.
    #[error("failed to list users for the leaderboard")]
    Leaderboard {
        /// Underlying driver error.
        #[source]
        source: MongoError,
    },
}
