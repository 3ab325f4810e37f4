use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    dao::storage::with_deadline,
    dto::ws::WsMessage,
    error::ServiceError,
    state::{
        SharedState,
        registry::{ConnectionId, PlayerBinding},
    },
};

/// Internal error type for `register` handling.
///
/// Any of these closes the connection.
#[derive(Debug, Error)]
enum RegisterError {
    /// Connection vanished before it could be bound.
    #[error("connection closed")]
    ConnectionClosed,
    /// Error from the user directory lookup.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle of one game websocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection = state.registry().register(outbound_tx.clone());
    info!(connection = %connection, "websocket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match WsMessage::from_json_str(text.as_str()) {
                Ok(WsMessage::Register { username }) => {
                    if let Err(err) = handle_register(&state, connection, &username).await {
                        warn!(connection = %connection, error = %err, "register rejected; closing");
                        let _ = outbound_tx.send(Message::Close(None));
                        break;
                    }
                }
                Ok(other) => {
                    warn!(connection = %connection, kind = other.kind(), "ignoring server-only message");
                }
                Err(err) => {
                    warn!(connection = %connection, error = %err, "failed to parse websocket message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection = %connection, "websocket closed by client");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %connection, error = %err, "websocket error");
                break;
            }
        }
    }

    disconnect(&state, connection).await;
    finalize(writer_task, outbound_tx).await;
}

/// Resolve `username`, add the user to the game if needed and bind it to `connection`.
async fn handle_register(
    state: &SharedState,
    connection: ConnectionId,
    username: &str,
) -> Result<(), RegisterError> {
    let directory = state.require_game_store().await?;
    let limit = state.config().persistence.timeout;
    let user = with_deadline(limit, "find_user", directory.find_user(username.to_string()))
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| ServiceError::Unauthorized(format!("unknown user `{username}`")))?;

    let joined = state.store().ensure_joined(&user.id, &user.username).await;
    let bound = state.registry().bind(
        connection,
        PlayerBinding {
            player_id: user.id.clone(),
            username: user.username.clone(),
        },
    );
    if !bound {
        return Err(RegisterError::ConnectionClosed);
    }
    info!(connection = %connection, player = %user.username, "websocket registered");

    if joined {
        state.persist().await;
    }
    state.publish_player_list().await;
    Ok(())
}

/// Unregister `connection`; the bound player leaves once its last connection is gone.
async fn disconnect(state: &SharedState, connection: ConnectionId) {
    let Some(binding) = state.registry().unregister(connection) else {
        info!(connection = %connection, "websocket disconnected");
        return;
    };
    info!(connection = %connection, player = %binding.username, "websocket disconnected");

    if state.registry().is_player_connected(&binding.player_id) {
        return;
    }
    if state.store().leave(&binding.player_id).await {
        state.persist().await;
    }
    state.publish_player_list().await;
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
