//! Fan-out of websocket events to every registered connection.
//!
//! Producers hand messages to a bounded channel drained by a single delivery task.
//! Each message is encoded once and queued on every connection's own outbound queue, so a
//! slow socket only ever delays itself.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::{
    dto::ws::WsMessage,
    state::{registry::ConnectionRegistry, store::GameStateStore},
};

/// Fan-out of server messages to every registered connection.
#[derive(Clone)]
pub struct Broadcaster {
    tx: mpsc::Sender<WsMessage>,
}

impl Broadcaster {
    /// Create the hand-off channel and start the delivery task.
    pub fn spawn(registry: Arc<ConnectionRegistry>, capacity: usize) -> Self {
        let (broadcaster, rx) = Self::channel(capacity);
        tokio::spawn(run_delivery(registry, rx));
        broadcaster
    }

    /// Hand-off channel without a delivery task; the caller drains the receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WsMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue `message`, dropping it when the channel is full. Returns whether it was queued.
    pub fn publish(&self, message: WsMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(kind = message.kind(), "broadcast channel is full; dropping message");
                false
            }
            Err(TrySendError::Closed(message)) => {
                warn!(kind = message.kind(), "broadcast loop stopped; dropping message");
                false
            }
        }
    }

    /// Queue `message`, waiting for room instead of dropping it.
    pub async fn publish_reliable(&self, message: WsMessage) -> bool {
        match self.tx.send(message).await {
            Ok(()) => true,
            Err(err) => {
                warn!(kind = err.0.kind(), "broadcast loop stopped; dropping message");
                false
            }
        }
    }

    /// Rebuild the player list from the store and publish it.
    pub async fn publish_player_list(
        &self,
        store: &GameStateStore,
        registry: &ConnectionRegistry,
    ) -> bool {
        let players = registry.list_players(store).await;
        self.publish(WsMessage::PlayerList { players })
    }
}

async fn run_delivery(registry: Arc<ConnectionRegistry>, mut rx: mpsc::Receiver<WsMessage>) {
    while let Some(message) = rx.recv().await {
        deliver(&registry, &message);
    }
    debug!("broadcast delivery loop finished");
}

/// Deliver `message` to every registered connection, unregistering the ones that are gone.
pub fn deliver(registry: &ConnectionRegistry, message: &WsMessage) -> usize {
    let frame = match message.to_frame() {
        Ok(frame) => frame,
        Err(err) => {
            warn!(kind = message.kind(), error = %err, "failed to encode broadcast message");
            return 0;
        }
    };

    let mut delivered = 0;
    for (id, tx) in registry.recipients() {
        if tx.send(frame.clone()).is_ok() {
            delivered += 1;
        } else {
            warn!(connection = %id, "dropping connection after failed delivery");
            registry.unregister(id);
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::extract::ws::Message;

    use super::*;

    #[test]
    fn failing_connection_does_not_stop_fan_out() {
        let registry = ConnectionRegistry::new();
        let (first_tx, mut first_rx) = mpsc::unbounded_channel();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        let (last_tx, mut last_rx) = mpsc::unbounded_channel();
        registry.register(first_tx);
        registry.register(dead_tx);
        registry.register(last_tx);
        drop(dead_rx);

        let delivered = deliver(&registry, &WsMessage::game_over("alice"));

        assert_eq!(delivered, 2);
        assert_eq!(registry.len(), 2);
        assert!(matches!(first_rx.try_recv(), Ok(Message::Text(_))));
        assert!(matches!(last_rx.try_recv(), Ok(Message::Text(_))));
    }

    #[test]
    fn full_channel_drops_newest_message() {
        let (broadcaster, mut rx) = Broadcaster::channel(1);
        assert!(broadcaster.publish(WsMessage::game_over("a")));
        assert!(!broadcaster.publish(WsMessage::game_over("b")));

        assert_eq!(rx.try_recv().ok(), Some(WsMessage::game_over("a")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reliable_publish_waits_for_room() {
        let (broadcaster, mut rx) = Broadcaster::channel(1);
        assert!(broadcaster.publish(WsMessage::game_over("a")));

        let pending = tokio::spawn({
            let broadcaster = broadcaster.clone();
            async move { broadcaster.publish_reliable(WsMessage::game_over("b")).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        assert_eq!(rx.recv().await, Some(WsMessage::game_over("a")));
        assert!(pending.await.unwrap());
        assert_eq!(rx.recv().await, Some(WsMessage::game_over("b")));
    }

    #[tokio::test]
    async fn spawned_loop_reaches_registered_connections() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(tx);
        let broadcaster = Broadcaster::spawn(registry.clone(), 4);

        assert!(broadcaster.publish(WsMessage::PlayerList { players: vec![] }));
        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let Message::Text(text) = frame else {
            panic!("expected a text frame");
        };
        assert_eq!(
            WsMessage::from_json_str(text.as_str()).unwrap(),
            WsMessage::PlayerList { players: vec![] }
        );
    }
}
