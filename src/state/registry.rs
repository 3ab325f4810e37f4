//! Live websocket connections and the player each one is bound to.
//!
//! The registry only remembers which player id sits behind a connection. Names and scores
//! are read from the [`GameStateStore`] on demand, so a broadcast can never show a score
//! older than the last committed mutation.

use std::{
    collections::HashSet,
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

use axum::extract::ws::Message;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::{game::PlayerScore, store::GameStateStore};

/// Opaque handle identifying one registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Player identity attached to a connection after a successful `register`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerBinding {
    /// Id of the player in the game state.
    pub player_id: String,
    /// Username the connection registered with.
    pub username: String,
}

struct ConnectionEntry {
    tx: mpsc::UnboundedSender<Message>,
    binding: Option<PlayerBinding>,
}

/// Every open websocket with its outbound queue, in registration order.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<IndexMap<ConnectionId, ConnectionEntry>>,
}

impl ConnectionRegistry {
    /// Registry with no connections.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<ConnectionId, ConnectionEntry>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a freshly opened connection whose outbound queue is `tx`.
    pub fn register(&self, tx: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let id = ConnectionId(Uuid::new_v4());
        self.lock().insert(id, ConnectionEntry { tx, binding: None });
        id
    }

    /// Attach `binding` to `id`; returns false when the connection is gone.
    pub fn bind(&self, id: ConnectionId, binding: PlayerBinding) -> bool {
        match self.lock().get_mut(&id) {
            Some(entry) => {
                entry.binding = Some(binding);
                true
            }
            None => false,
        }
    }

    /// Forget `id`, returning its binding. Unknown ids are ignored.
    pub fn unregister(&self, id: ConnectionId) -> Option<PlayerBinding> {
        self.lock()
            .shift_remove(&id)
            .and_then(|entry| entry.binding)
    }

    /// Whether any connection is bound to `player_id`.
    pub fn is_player_connected(&self, player_id: &str) -> bool {
        self.lock().values().any(|entry| {
            entry
                .binding
                .as_ref()
                .is_some_and(|binding| binding.player_id == player_id)
        })
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no connection is open.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Outbound queues of every registered connection, in registration order.
    pub fn recipients(&self) -> Vec<(ConnectionId, mpsc::UnboundedSender<Message>)> {
        self.lock()
            .iter()
            .map(|(id, entry)| (*id, entry.tx.clone()))
            .collect()
    }

    /// Queue `message` on every connection bound to `player_id`; returns how many accepted it.
    pub fn send_to_player(&self, player_id: &str, message: Message) -> usize {
        let targets: Vec<_> = self
            .lock()
            .iter()
            .filter(|(_, entry)| {
                entry
                    .binding
                    .as_ref()
                    .is_some_and(|binding| binding.player_id == player_id)
            })
            .map(|(id, entry)| (*id, entry.tx.clone()))
            .collect();

        let mut delivered = 0;
        for (id, tx) in targets {
            if tx.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                self.unregister(id);
            }
        }
        delivered
    }

    /// `(name, score)` of every bound player that is still part of the game.
    ///
    /// Takes the store lock first, then the registry lock.
    pub async fn list_players(&self, store: &GameStateStore) -> Vec<PlayerScore> {
        let view = store.view().await;
        let connections = self.lock();

        let mut seen = HashSet::new();
        connections
            .values()
            .filter_map(|entry| entry.binding.as_ref())
            .filter(|binding| seen.insert(binding.player_id.as_str()))
            .filter_map(|binding| view.game().player(&binding.player_id))
            .map(PlayerScore::from)
            .collect()
    }
}
