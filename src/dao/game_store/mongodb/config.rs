use mongodb::options::ClientOptions;

use crate::config::PersistenceConfig;

use super::error::{MongoDaoError, MongoResult};

/// Parsed driver options plus the database to use.
#[derive(Clone)]
pub struct MongoConfig {
    /// Driver options parsed from the connection URI.
    pub options: ClientOptions,
    /// Database holding the snapshot and user collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse `uri` into driver options.
    pub async fn from_uri(uri: &str, db_name: &str) -> MongoResult<Self> {
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name: db_name.to_owned(),
        })
    }

    /// Build from the persistence section; `addr` is required.
    pub async fn from_app_config(persistence: &PersistenceConfig) -> MongoResult<Self> {
        let uri = persistence
            .addr
            .as_deref()
            .ok_or(MongoDaoError::MissingSetting {
                setting: "persistence.addr",
            })?;
        Self::from_uri(uri, &persistence.database).await
    }
}
