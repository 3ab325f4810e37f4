//! One MongoDB client bound to the database the store works in.

use std::time::Duration;

use mongodb::{Client, Collection, Database, bson::doc, error::Error as MongoError};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

/// Used when the URI does not set `serverSelectionTimeoutMS`.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct MongoConnection {
    database: Database,
}

impl MongoConnection {
    /// Build a client from `config` and require one successful ping.
    ///
    /// No retry happens here; the storage supervisor owns the back-off.
    pub async fn open(config: &MongoConfig) -> MongoResult<Self> {
        let mut options = config.options.clone();
        options
            .server_selection_timeout
            .get_or_insert(SERVER_SELECTION_TIMEOUT);

        let client = Client::with_options(options)
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let connection = Self {
            database: client.database(&config.database_name),
        };

        connection
            .ping()
            .await
            .map_err(|source| MongoDaoError::InitialPing {
                database: config.database_name.clone(),
                source,
            })?;
        Ok(connection)
    }

    pub async fn ping(&self) -> Result<(), MongoError> {
        self.database.run_command(doc! { "ping": 1 }).await.map(|_| ())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database.collection::<T>(name)
    }
}
