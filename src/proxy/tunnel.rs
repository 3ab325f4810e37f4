//! Websocket relay between one client and whichever game backend is currently healthy.
//!
//! The client socket is split once and outlives any number of backend connections:
//! when the backend leg drops, the client is told so in a text frame and the loop probes
//! the pool again after the configured delay.

use std::time::Duration;

use axum::extract::ws::{self, CloseFrame, Message, WebSocket};
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use thiserror::Error;
use tokio::{net::TcpStream, sync::watch, time::sleep};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::frame::coding::CloseCode},
};
use tracing::{debug, info, warn};

use crate::proxy::SharedProxyState;

/// Prefix of the text frame sent once a backend leg is up; followed by the backend address.
pub const CONNECTED_PREFIX: &str = "Connected to game server: ";
/// Sent when no backend passed its probe.
pub const NO_BACKEND_NOTICE: &str = "Error: No game servers available. Retrying...";
/// Sent when the chosen backend refused the websocket handshake.
pub const DIAL_FAILED_NOTICE: &str = "Error: Unable to connect to game server. Retrying...";
/// Sent when an established backend leg dropped.
pub const DISCONNECTED_NOTICE: &str = "Game server disconnected. Reconnecting...";

type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ClientSink = SplitSink<WebSocket, Message>;
type ClientStream = SplitStream<WebSocket>;

#[derive(Debug, Error)]
enum DialError {
    #[error("websocket handshake timed out")]
    Timeout,
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),
}

/// Why a relay session or a reconnect wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegEnd {
    ClientGone,
    BackendGone,
    Shutdown,
    Elapsed,
}

/// Relay `socket` until the client leaves, shutdown is requested or the retry budget runs out.
///
/// `first` is a backend already known to be healthy; it is used for the first attempt
/// instead of probing again.
pub async fn run_tunnel(state: SharedProxyState, socket: WebSocket, first: Option<String>) {
    let (mut client_tx, mut client_rx) = socket.split();
    let policy = state.tunnel_policy();
    let mut shutdown = state.shutdown_watcher();
    let mut failures: u32 = 0;
    let mut next = first;

    loop {
        if *shutdown.borrow() {
            close_client(&mut client_tx).await;
            return;
        }
        if policy.max_attempts.is_some_and(|max| failures >= max) {
            warn!(failures, "giving up on game servers; closing client");
            close_client(&mut client_tx).await;
            return;
        }

        let backend = match next.take() {
            Some(addr) => Some(addr),
            None => state.pool().probe().await,
        };

        let notice = match backend {
            None => {
                failures += 1;
                NO_BACKEND_NOTICE
            }
            Some(addr) => match dial(&addr, state.pool().probe_timeout()).await {
                Err(err) => {
                    warn!(backend = %addr, error = %err, "failed to connect to game server websocket");
                    failures += 1;
                    DIAL_FAILED_NOTICE
                }
                Ok(backend_ws) => {
                    failures = 0;
                    info!(backend = %addr, "tunnel connected");
                    let greeting = format!("{CONNECTED_PREFIX}{addr}");
                    if send_text(&mut client_tx, greeting).await.is_err() {
                        return;
                    }
                    match relay(&mut client_tx, &mut client_rx, backend_ws, &mut shutdown).await {
                        LegEnd::BackendGone => {
                            warn!(backend = %addr, "game server websocket disconnected");
                            state.pool().invalidate();
                            DISCONNECTED_NOTICE
                        }
                        LegEnd::Shutdown => {
                            close_client(&mut client_tx).await;
                            return;
                        }
                        LegEnd::ClientGone | LegEnd::Elapsed => {
                            info!(backend = %addr, "client left the tunnel");
                            return;
                        }
                    }
                }
            },
        };

        if send_text(&mut client_tx, notice.to_string()).await.is_err() {
            return;
        }

        match wait(&mut client_rx, &mut shutdown, policy.reconnect_delay).await {
            LegEnd::Elapsed => {}
            LegEnd::Shutdown => {
                close_client(&mut client_tx).await;
                return;
            }
            LegEnd::ClientGone | LegEnd::BackendGone => return,
        }
    }
}

/// `http://host:port` → `ws://host:port/ws`.
pub fn backend_ws_url(addr: &str) -> String {
    let base = if let Some(rest) = addr.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = addr.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{addr}")
    };
    format!("{}/ws", base.trim_end_matches('/'))
}

async fn dial(addr: &str, limit: Duration) -> Result<BackendSocket, DialError> {
    let url = backend_ws_url(addr);
    let (stream, _) = tokio::time::timeout(limit, connect_async(url.as_str()))
        .await
        .map_err(|_| DialError::Timeout)??;
    Ok(stream)
}

/// Copy data frames both ways until one side drops.
///
/// Each direction runs its own loop so a slow writer on one leg never stalls reads on the
/// other.
async fn relay(
    client_tx: &mut ClientSink,
    client_rx: &mut ClientStream,
    backend: BackendSocket,
    shutdown: &mut watch::Receiver<bool>,
) -> LegEnd {
    let (mut backend_tx, mut backend_rx) = backend.split();

    let upstream = async {
        loop {
            match client_rx.next().await {
                Some(Ok(Message::Close(frame))) => {
                    let _ = backend_tx
                        .send(tungstenite::Message::Close(frame.map(close_to_backend)))
                        .await;
                    return LegEnd::ClientGone;
                }
                Some(Ok(message)) => {
                    let Some(message) = to_backend(message) else {
                        continue;
                    };
                    if backend_tx.send(message).await.is_err() {
                        return LegEnd::BackendGone;
                    }
                }
                Some(Err(err)) => {
                    debug!(error = %err, "client websocket error");
                    return LegEnd::ClientGone;
                }
                None => return LegEnd::ClientGone,
            }
        }
    };

    let downstream = async {
        loop {
            match backend_rx.next().await {
                Some(Ok(tungstenite::Message::Close(_))) | None => return LegEnd::BackendGone,
                Some(Ok(message)) => {
                    let Some(message) = to_client(message) else {
                        continue;
                    };
                    if client_tx.send(message).await.is_err() {
                        return LegEnd::ClientGone;
                    }
                }
                Some(Err(err)) => {
                    debug!(error = %err, "game server websocket error");
                    return LegEnd::BackendGone;
                }
            }
        }
    };

    let stopped = async {
        loop {
            if shutdown.changed().await.is_err() || *shutdown.borrow() {
                return LegEnd::Shutdown;
            }
        }
    };

    let end = tokio::select! {
        end = upstream => end,
        end = downstream => end,
        end = stopped => end,
    };

    if end != LegEnd::BackendGone {
        let _ = backend_tx.close().await;
    }
    end
}

/// Sleep for `delay` while watching the client leg for a disconnect.
async fn wait(
    client_rx: &mut ClientStream,
    shutdown: &mut watch::Receiver<bool>,
    delay: Duration,
) -> LegEnd {
    let pause = sleep(delay);
    tokio::pin!(pause);

    loop {
        tokio::select! {
            _ = &mut pause => return LegEnd::Elapsed,
            inbound = client_rx.next() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return LegEnd::ClientGone,
                Some(Ok(_)) => debug!("dropping client frame while no game server is connected"),
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return LegEnd::Shutdown;
                }
            }
        }
    }
}

async fn send_text(client_tx: &mut ClientSink, text: String) -> Result<(), axum::Error> {
    client_tx.send(Message::Text(text.into())).await
}

async fn close_client(client_tx: &mut ClientSink) {
    let frame = CloseFrame {
        code: ws::close_code::AWAY,
        reason: "tunnel closing".into(),
    };
    let _ = client_tx.send(Message::Close(Some(frame))).await;
}

fn to_backend(message: Message) -> Option<tungstenite::Message> {
    match message {
        Message::Text(text) => Some(tungstenite::Message::Text(text.as_str().to_owned().into())),
        Message::Binary(bytes) => Some(tungstenite::Message::Binary(bytes)),
        _ => None,
    }
}

fn to_client(message: tungstenite::Message) -> Option<Message> {
    match message {
        tungstenite::Message::Text(text) => Some(Message::Text(text.as_str().to_owned().into())),
        tungstenite::Message::Binary(bytes) => Some(Message::Binary(bytes)),
        _ => None,
    }
}

fn close_to_backend(frame: CloseFrame) -> tungstenite::protocol::CloseFrame {
    tungstenite::protocol::CloseFrame {
        code: CloseCode::from(frame.code),
        reason: frame.reason.as_str().to_owned().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_urls_switch_scheme() {
        assert_eq!(backend_ws_url("http://localhost:8081"), "ws://localhost:8081/ws");
        assert_eq!(backend_ws_url("https://game.example"), "wss://game.example/ws");
        assert_eq!(backend_ws_url("10.0.0.2:9000"), "ws://10.0.0.2:9000/ws");
    }

    #[test]
    fn data_frames_cross_unmodified() {
        let text = to_backend(Message::Text("{\"type\":\"register\"}".into())).unwrap();
        assert_eq!(text.to_text().unwrap(), "{\"type\":\"register\"}");

        let back = to_client(tungstenite::Message::Binary(vec![1u8, 2, 3].into())).unwrap();
        assert_eq!(back, Message::Binary(vec![1u8, 2, 3].into()));

        assert!(to_client(tungstenite::Message::Ping(Vec::new().into())).is_none());
    }

    #[test]
    fn close_codes_are_preserved() {
        let frame = close_to_backend(CloseFrame {
            code: ws::close_code::NORMAL,
            reason: "bye".into(),
        });
        assert_eq!(frame.code, CloseCode::Normal);
        assert_eq!(frame.reason.as_str(), "bye");
    }
}
