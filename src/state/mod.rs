//! Shared state of the game role.

/// Websocket fan-out.
pub mod broadcast;
/// Game data and snapshot encoding.
pub mod game;
/// Connection registry.
pub mod registry;
/// Word selection and guess checks.
pub mod round;
/// Locked game state store.
pub mod store;

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, watch};
use tracing::warn;

use crate::{
    config::AppConfig,
    dao::{
        game_store::GameStore,
        storage::{StorageError, with_deadline},
    },
    error::ServiceError,
};

use self::{
    broadcast::Broadcaster, registry::ConnectionRegistry, round::RoundEngine,
    store::GameStateStore,
};

/// Handle to [`AppState`] shared by handlers and background tasks.
pub type SharedState = Arc<AppState>;

/// Central state of the game role: the game itself, live connections and the storage handle.
pub struct AppState {
    config: Arc<AppConfig>,
    store: GameStateStore,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Broadcaster,
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
    /// Serializes snapshot writes so an older snapshot never overwrites a newer one.
    persist_gate: Mutex<()>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    /// Must be called from inside a tokio runtime since it starts the broadcast loop.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_engine(
            config.clone(),
            RoundEngine::new(config.vocabulary.clone()),
        )
    }

    /// Same as [`AppState::new`] with a caller-provided round engine.
    pub fn with_engine(config: AppConfig, engine: RoundEngine) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::spawn(registry.clone(), config.broadcast_capacity);
        Arc::new(Self {
            config: Arc::new(config),
            store: GameStateStore::new(engine),
            registry,
            broadcaster,
            game_store: RwLock::new(None),
            degraded: degraded_tx,
            persist_gate: Mutex::new(()),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Game state store.
    pub fn store(&self) -> &GameStateStore {
        &self.store
    }

    /// Live websocket connections.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Fan-out to every connection.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Publish a fresh `player_list` built from the current state.
    pub async fn publish_player_list(&self) -> bool {
        self.broadcaster
            .publish_player_list(&self.store, &self.registry)
            .await
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the game store or fail with [`ServiceError::Degraded`].
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Read the snapshot from `store` into the in-memory game.
    ///
    /// Called before `store` is installed so no write can reach it first. The snapshot is
    /// ignored when the game already changed. Storage failures are returned so the caller
    /// can retry instead of overwriting a snapshot it never read.
    pub async fn load_snapshot(&self, store: &dyn GameStore) -> Result<(), StorageError> {
        let key = self.config.snapshot_key.clone();
        let limit = self.config.persistence.timeout;

        if let Some(bytes) = with_deadline(limit, "load_snapshot", store.load_snapshot(key)).await? {
            self.store.restore(&bytes).await;
        }
        Ok(())
    }

    /// Best-effort snapshot write; failures are logged and never surface to callers.
    pub async fn persist(&self) {
        let Some(store) = self.game_store().await else {
            return;
        };

        let _gate = self.persist_gate.lock().await;
        let bytes = match self.store.snapshot().await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "failed to encode game snapshot");
                return;
            }
        };

        let key = self.config.snapshot_key.clone();
        let call = store.save_snapshot(key, bytes);
        if let Err(err) = with_deadline(self.config.persistence.timeout, "save_snapshot", call).await {
            warn!(error = %err, "failed to persist game snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::game_store::memory::MemoryGameStore;

    #[tokio::test]
    async fn persist_then_load_restores_the_game() {
        let state = AppState::new(AppConfig::default());
        let backend = Arc::new(MemoryGameStore::new());
        state.set_game_store(backend.clone()).await;
        state.store().join("a".into(), "alice".into()).await.unwrap();
        state.persist().await;

        let restarted = AppState::new(AppConfig::default());
        restarted.load_snapshot(backend.as_ref()).await.unwrap();
        assert_eq!(restarted.store().state().await, state.store().state().await);
    }

    #[tokio::test]
    async fn persisting_without_store_is_a_no_op() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);
        state.store().join("a".into(), "alice".into()).await.unwrap();
        state.persist().await;
        assert!(state.require_game_store().await.is_err());
    }

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        state
            .set_game_store(Arc::new(MemoryGameStore::new()))
            .await;
        assert!(!state.is_degraded().await);
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
    }
}
