mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{RawQuery, State, WebSocketUpgrade, ws},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use tokio_tungstenite::tungstenite::Message;

use common::{connect, next_frame, next_text, send_text, spawn};
use scrambled_words::{
    config::{AppConfig, Role, TunnelPolicy},
    proxy::{
        ProxyState,
        pool::BackendPool,
        tunnel::{CONNECTED_PREFIX, DISCONNECTED_NOTICE, NO_BACKEND_NOTICE},
    },
    routes,
};

const DEAD_BACKEND: &str = "http://127.0.0.1:1";

/// Fake game server whose `/health` answer can be flipped from the test.
#[derive(Clone)]
struct Backend {
    healthy: Arc<AtomicBool>,
    /// Close every websocket right after the upgrade and report unhealthy from then on.
    drop_sockets: bool,
}

async fn health(State(backend): State<Backend>) -> StatusCode {
    if backend.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn join(Json(body): Json<Value>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(json!({ "echo": body })))
}

async fn leaderboard(RawQuery(query): RawQuery) -> Json<Value> {
    Json(json!({ "query": query }))
}

async fn socket(State(backend): State<Backend>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |mut socket| async move {
        if backend.drop_sockets {
            backend.healthy.store(false, Ordering::SeqCst);
            let _ = socket.send(ws::Message::Close(None)).await;
            return;
        }
        while let Some(Ok(message)) = socket.recv().await {
            if matches!(message, ws::Message::Text(_) | ws::Message::Binary(_))
                && socket.send(message).await.is_err()
            {
                break;
            }
        }
    })
}

async fn spawn_backend(healthy: bool, drop_sockets: bool) -> (String, Arc<AtomicBool>) {
    let flag = Arc::new(AtomicBool::new(healthy));
    let app = Router::new()
        .route("/health", get(health))
        .route("/join", post(join))
        .route("/leaderboard", get(leaderboard))
        .route("/ws", get(socket))
        .with_state(Backend {
            healthy: flag.clone(),
            drop_sockets,
        });
    (spawn(app).await, flag)
}

/// Game server that passes `/health` probes but breaks on every other request: the
/// connection is closed, or left open without an answer when `hang` is set.
async fn spawn_broken_backend(hang: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(read) => request.extend_from_slice(&chunk[..read]),
                    }
                }
                if request.starts_with(b"GET /health ") {
                    let _ = stream
                        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                        .await;
                } else if hang {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            });
        }
    });
    format!("http://{addr}")
}

/// Game server that never reads its websocket and pushes a `tick` frame every 50 ms.
async fn spawn_ticking_backend() -> String {
    async fn ticking(upgrade: WebSocketUpgrade) -> Response {
        upgrade.on_upgrade(|mut socket| async move {
            loop {
                tokio::time::sleep(Duration::from_millis(50)).await;
                if socket.send(ws::Message::Text("tick".into())).await.is_err() {
                    return;
                }
            }
        })
    }

    let app = Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/ws", get(ticking));
    spawn(app).await
}

fn router_config(backends: Vec<String>, max_attempts: Option<u32>) -> AppConfig {
    AppConfig {
        role: Role::Router,
        backend_addrs: backends,
        probe_timeout: Duration::from_millis(500),
        tunnel: TunnelPolicy {
            reconnect_delay: Duration::from_millis(50),
            max_attempts,
        },
        ..AppConfig::default()
    }
}

async fn spawn_router(config: &AppConfig) -> String {
    let state = ProxyState::new(config).expect("proxy state");
    spawn(routes::proxy_router(state)).await
}

#[tokio::test]
async fn probe_returns_first_healthy_backend_in_order() {
    let (sick, _) = spawn_backend(false, false).await;
    let (first, _) = spawn_backend(true, false).await;
    let (second, _) = spawn_backend(true, false).await;

    let pool = BackendPool::new(
        vec![DEAD_BACKEND.into(), sick, first.clone(), second],
        Duration::from_millis(500),
        Duration::ZERO,
    )
    .unwrap();

    assert_eq!(pool.probe().await, Some(first));
}

#[tokio::test]
async fn probe_finds_nothing_when_every_backend_is_down() {
    let (sick, _) = spawn_backend(false, false).await;
    let pool = BackendPool::new(
        vec![DEAD_BACKEND.into(), sick],
        Duration::from_millis(500),
        Duration::ZERO,
    )
    .unwrap();

    assert_eq!(pool.probe().await, None);
}

#[tokio::test]
async fn router_reports_its_own_health() {
    let router = spawn_router(&router_config(vec![DEAD_BACKEND.into()], None)).await;
    let response = reqwest::get(format!("{router}/health")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn forwarding_without_backends_is_service_unavailable() {
    let router = spawn_router(&router_config(vec![DEAD_BACKEND.into()], None)).await;

    let response = reqwest::Client::new()
        .post(format!("{router}/join"))
        .json(&json!({ "name": "alice" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn forwarding_relays_status_body_and_query() {
    let (backend, _) = spawn_backend(true, false).await;
    let router = spawn_router(&router_config(vec![DEAD_BACKEND.into(), backend], None)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{router}/join"))
        .json(&json!({ "name": "alice", "id": "a-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "echo": { "name": "alice", "id": "a-1" } }));

    let body: Value = client
        .get(format!("{router}/leaderboard?limit=3"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "query": "limit=3" }));
}

#[tokio::test]
async fn backend_dropping_the_request_is_a_bad_gateway() {
    let backend = spawn_broken_backend(false).await;
    let router = spawn_router(&router_config(vec![backend], None)).await;

    let response = reqwest::Client::new()
        .post(format!("{router}/join"))
        .json(&json!({ "name": "alice" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn silent_backend_times_out_as_a_bad_gateway() {
    let backend = spawn_broken_backend(true).await;
    let config = AppConfig {
        forward_timeout: Duration::from_millis(300),
        ..router_config(vec![backend], None)
    };
    let router = spawn_router(&config).await;

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        reqwest::Client::new().get(format!("{router}/leaderboard")).send(),
    )
    .await
    .expect("router answered before the test deadline")
    .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn websocket_upgrade_needs_a_healthy_backend() {
    let router = spawn_router(&router_config(vec![DEAD_BACKEND.into()], None)).await;
    let url = format!("{}/ws", router.replacen("http://", "ws://", 1));
    assert!(tokio_tungstenite::connect_async(url.as_str()).await.is_err());
}

#[tokio::test]
async fn tunnel_greets_then_relays_frames_both_ways() {
    let (backend, _) = spawn_backend(true, false).await;
    let router = spawn_router(&router_config(vec![backend.clone()], None)).await;

    let mut client = connect(&router).await;
    assert_eq!(next_text(&mut client).await, format!("{CONNECTED_PREFIX}{backend}"));

    let register = r#"{"type":"register","payload":{"username":"alice"}}"#;
    send_text(&mut client, register).await;
    assert_eq!(next_text(&mut client).await, register);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_upstream_does_not_block_downstream_frames() {
    let backend = spawn_ticking_backend().await;
    let router = spawn_router(&router_config(vec![backend], None)).await;

    let mut client = connect(&router).await;
    assert!(next_text(&mut client).await.starts_with(CONNECTED_PREFIX));
    let (mut sink, mut stream) = client.split();

    // Far more than the socket buffers hold, so the write towards the backend stalls.
    let flood = tokio::spawn(async move {
        let chunk = vec![0u8; 64 * 1024];
        for _ in 0..512 {
            if sink.send(Message::Binary(chunk.clone().into())).await.is_err() {
                return;
            }
        }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut ticks = 0;
    while ticks < 5 {
        let frame = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("backend frames kept flowing")
            .expect("client stream open")
            .unwrap();
        if let Message::Text(text) = frame {
            assert_eq!(text.as_str(), "tick");
            ticks += 1;
        }
    }
    flood.abort();
}

#[tokio::test]
async fn tunnel_keeps_client_open_until_a_backend_returns() {
    let (backend, healthy) = spawn_backend(true, true).await;
    let router = spawn_router(&router_config(vec![backend.clone()], None)).await;

    let mut client = connect(&router).await;
    assert_eq!(next_text(&mut client).await, format!("{CONNECTED_PREFIX}{backend}"));
    assert_eq!(next_text(&mut client).await, DISCONNECTED_NOTICE);
    assert_eq!(next_text(&mut client).await, NO_BACKEND_NOTICE);

    healthy.store(true, Ordering::SeqCst);
    loop {
        let text = next_text(&mut client).await;
        if text.starts_with(CONNECTED_PREFIX) {
            assert_eq!(text, format!("{CONNECTED_PREFIX}{backend}"));
            break;
        }
        assert_eq!(text, NO_BACKEND_NOTICE);
    }
}

#[tokio::test]
async fn tunnel_gives_up_after_the_configured_attempts() {
    let (backend, _) = spawn_backend(true, true).await;
    let router = spawn_router(&router_config(vec![backend], Some(2))).await;

    let mut client = connect(&router).await;
    assert!(next_text(&mut client).await.starts_with(CONNECTED_PREFIX));
    assert_eq!(next_text(&mut client).await, DISCONNECTED_NOTICE);
    assert_eq!(next_text(&mut client).await, NO_BACKEND_NOTICE);
    assert_eq!(next_text(&mut client).await, NO_BACKEND_NOTICE);

    match next_frame(&mut client).await {
        Some(Message::Close(_)) | None => {}
        other => panic!("expected the tunnel to close, got {other:?}"),
    }
}
