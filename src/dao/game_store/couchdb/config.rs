use crate::config::PersistenceConfig;

use super::error::{CouchDaoError, CouchResult};

/// Runtime configuration describing how to connect to CouchDB.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server root, e.g. `http://localhost:5984`.
    pub base_url: String,
    /// Database holding snapshots and user documents.
    pub database: String,
    /// Basic-auth user, if the server requires one.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
}

impl CouchConfig {
    /// Construct a configuration from explicit base URL and database name.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            username: None,
            password: None,
        }
    }

    /// Attach basic-auth credentials to the configuration.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Build a configuration from the persistence section of the application config.
    ///
    /// Credentials are only read from `COUCH_USERNAME`/`COUCH_PASSWORD` so they never sit in
    /// the JSON file.
    pub fn from_app_config(persistence: &PersistenceConfig) -> CouchResult<Self> {
        let base_url = persistence
            .addr
            .clone()
            .ok_or(CouchDaoError::MissingSetting { setting: "persistence.addr" })?;

        if !is_valid_database_name(&persistence.database) {
            return Err(CouchDaoError::InvalidDatabaseName {
                database: persistence.database.clone(),
            });
        }

        let mut config = Self::new(base_url, persistence.database.clone());

        if let (Some(username), Some(password)) = (
            std::env::var("COUCH_USERNAME").ok(),
            std::env::var("COUCH_PASSWORD").ok(),
        ) {
            config = config.with_credentials(username, password);
        }

        Ok(config)
    }
}

/// CouchDB accepts `^[a-z][a-z0-9_$()+/-]*$`.
fn is_valid_database_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first.is_ascii_lowercase())
        && chars.all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+/-".contains(c)
        })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::PersistenceKind;

    fn persistence(database: &str) -> PersistenceConfig {
        PersistenceConfig {
            kind: PersistenceKind::Couchdb,
            addr: Some("http://localhost:5984/".into()),
            database: database.into(),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn database_names_follow_couchdb_rules() {
        assert!(CouchConfig::from_app_config(&persistence("scrambled_words")).is_ok());
        assert!(matches!(
            CouchConfig::from_app_config(&persistence("Scrambled")),
            Err(CouchDaoError::InvalidDatabaseName { .. })
        ));
        assert!(CouchConfig::from_app_config(&persistence("")).is_err());
    }

    #[test]
    fn address_is_required() {
        let mut config = persistence("game");
        config.addr = None;
        assert!(matches!(
            CouchConfig::from_app_config(&config),
            Err(CouchDaoError::MissingSetting { .. })
        ));
    }
}
