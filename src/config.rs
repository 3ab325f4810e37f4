//! Application-level configuration loading: role, listen port, backend pool and persistence.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::round::{DEFAULT_VOCABULARY, MIN_VOCABULARY_LEN};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SCRAMBLED_WORDS_CONFIG_PATH";
const ROLE_ENV: &str = "SCRAMBLED_WORDS_ROLE";
const BACKENDS_ENV: &str = "SCRAMBLED_WORDS_BACKENDS";
const PERSISTENCE_ENV: &str = "SCRAMBLED_WORDS_PERSISTENCE";
const PERSISTENCE_ADDR_ENV: &str = "SCRAMBLED_WORDS_PERSISTENCE_ADDR";
const DATABASE_ENV: &str = "SCRAMBLED_WORDS_DATABASE";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SNAPSHOT_KEY: &str = "game_state";
const DEFAULT_DATABASE: &str = "scrambled_words";
const DEFAULT_BROADCAST_CAPACITY: usize = 64;
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PERSISTENCE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Which half of the deployment this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owns the game state, the connection registry and the broadcaster.
    Game,
    /// Stateless front tier probing and tunnelling to game backends.
    Router,
}

/// Storage backend used for snapshots and the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceKind {
    /// Process-local store; nothing survives a restart.
    Memory,
    /// CouchDB over HTTP.
    #[serde(alias = "couch")]
    Couchdb,
    /// MongoDB through the official driver.
    #[serde(alias = "mongo")]
    Mongodb,
}

/// Connection settings of the storage backend.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Backend to connect to.
    pub kind: PersistenceKind,
    /// Base URL (CouchDB) or connection URI (MongoDB).
    pub addr: Option<String>,
    /// Database name inside the backend.
    pub database: String,
    /// Deadline applied to every load/save call.
    pub timeout: Duration,
}

/// Retry behaviour of the websocket tunnel between a client and a game backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelPolicy {
    /// Fixed pause between two connection attempts.
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts tolerated before the client is dropped; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for TunnelPolicy {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Game server or front router.
    pub role: Role,
    /// TCP port the HTTP server listens on.
    pub port: u16,
    /// Ordered game backend pool probed by the router role.
    pub backend_addrs: Vec<String>,
    /// Deadline of one `/health` probe and of a backend websocket handshake.
    pub probe_timeout: Duration,
    /// Deadline of one forwarded REST call, from sending the request to reading the body.
    pub forward_timeout: Duration,
    /// Probe results are reused for this long; zero disables caching.
    pub probe_cache_ttl: Duration,
    /// Reconnect behaviour of websocket tunnels.
    pub tunnel: TunnelPolicy,
    /// Storage backend of the game role.
    pub persistence: PersistenceConfig,
    /// Key under which the game snapshot is stored.
    pub snapshot_key: String,
    /// Depth of the broadcast hand-off channel.
    pub broadcast_capacity: usize,
    /// Words a round can be played with.
    pub vocabulary: Vec<String>,
    /// Usernames pre-registered in the in-memory user directory.
    pub seed_users: Vec<String>,
}

impl AppConfig {
    /// Load the configuration from disk, then apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::from_file();
        config.apply_overrides(|name| env::var(name).ok());
        config
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        role = ?app_config.role,
                        backends = app_config.backend_addrs.len(),
                        "loaded configuration file"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Apply overrides looked up through `lookup` (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT")
            .or_else(|| lookup("SERVER_PORT"))
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.port = port;
        }

        if let Some(value) = lookup(ROLE_ENV) {
            match parse_enum::<Role>(&value) {
                Some(role) => self.role = role,
                None => warn!(value = %value, "ignoring unknown role override"),
            }
        }

        if let Some(value) = lookup(BACKENDS_ENV) {
            self.backend_addrs = value
                .split(',')
                .map(str::trim)
                .filter(|addr| !addr.is_empty())
                .map(normalize_backend)
                .collect();
        }

        if let Some(value) = lookup(PERSISTENCE_ENV) {
            match parse_enum::<PersistenceKind>(&value) {
                Some(kind) => self.persistence.kind = kind,
                None => warn!(value = %value, "ignoring unknown persistence override"),
            }
        }

        if let Some(addr) = lookup(PERSISTENCE_ADDR_ENV).filter(|addr| !addr.is_empty()) {
            self.persistence.addr = Some(addr);
        }

        if let Some(database) = lookup(DATABASE_ENV).filter(|db| !db.is_empty()) {
            self.persistence.database = database;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            role: Role::Game,
            port: DEFAULT_PORT,
            backend_addrs: vec![
                "http://localhost:8081".into(),
                "http://localhost:8082".into(),
            ],
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
            probe_cache_ttl: Duration::ZERO,
            tunnel: TunnelPolicy::default(),
            persistence: PersistenceConfig {
                kind: PersistenceKind::Memory,
                addr: None,
                database: DEFAULT_DATABASE.into(),
                timeout: DEFAULT_PERSISTENCE_TIMEOUT,
            },
            snapshot_key: DEFAULT_SNAPSHOT_KEY.into(),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            vocabulary: default_vocabulary(),
            seed_users: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    role: Option<Role>,
    port: Option<u16>,
    backend_addrs: Option<Vec<String>>,
    probe_timeout_ms: Option<u64>,
    forward_timeout_ms: Option<u64>,
    probe_cache_ttl_ms: Option<u64>,
    reconnect_delay_ms: Option<u64>,
    max_reconnect_attempts: Option<u32>,
    persistence: Option<RawPersistence>,
    snapshot_key: Option<String>,
    broadcast_capacity: Option<usize>,
    vocabulary: Option<Vec<String>>,
    seed_users: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPersistence {
    kind: PersistenceKind,
    #[serde(default)]
    addr: Option<String>,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();

        let persistence = match value.persistence {
            Some(raw) => PersistenceConfig {
                kind: raw.kind,
                addr: raw.addr,
                database: raw.database.unwrap_or(defaults.persistence.database.clone()),
                timeout: raw
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.persistence.timeout),
            },
            None => defaults.persistence.clone(),
        };

        let vocabulary = match value.vocabulary {
            Some(words) => {
                let words: Vec<String> = words
                    .into_iter()
                    .map(|word| word.trim().to_lowercase())
                    .filter(|word| !word.is_empty())
                    .collect();
                if words.len() >= MIN_VOCABULARY_LEN {
                    words
                } else {
                    warn!(
                        count = words.len(),
                        minimum = MIN_VOCABULARY_LEN,
                        "configured vocabulary too small; using built-in words"
                    );
                    defaults.vocabulary.clone()
                }
            }
            None => defaults.vocabulary.clone(),
        };

        Self {
            role: value.role.unwrap_or(defaults.role),
            port: value.port.unwrap_or(defaults.port),
            backend_addrs: value
                .backend_addrs
                .map(|addrs| addrs.iter().map(|a| normalize_backend(a)).collect())
                .unwrap_or(defaults.backend_addrs),
            probe_timeout: value
                .probe_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.probe_timeout),
            forward_timeout: value
                .forward_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.forward_timeout),
            probe_cache_ttl: value
                .probe_cache_ttl_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.probe_cache_ttl),
            tunnel: TunnelPolicy {
                reconnect_delay: value
                    .reconnect_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.tunnel.reconnect_delay),
                max_attempts: value.max_reconnect_attempts.filter(|max| *max > 0),
            },
            persistence,
            snapshot_key: value
                .snapshot_key
                .filter(|key| !key.is_empty())
                .unwrap_or(defaults.snapshot_key),
            broadcast_capacity: value
                .broadcast_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.broadcast_capacity),
            vocabulary,
            seed_users: value.seed_users.unwrap_or_default(),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn parse_enum<T: for<'de> Deserialize<'de>>(value: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_lowercase())).ok()
}

/// Strip trailing slashes so paths can be appended verbatim.
fn normalize_backend(addr: &str) -> String {
    addr.trim().trim_end_matches('/').to_string()
}

fn default_vocabulary() -> Vec<String> {
    DEFAULT_VOCABULARY.iter().map(|word| word.to_string()).collect()
}
