use axum::{
    Json, Router,
    extract::{Request, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    dto::health::HealthResponse,
    error::{AppError, ServiceError},
    proxy::{SharedProxyState, forward, tunnel},
};

/// Routes of the router role: every game call is replayed against a healthy backend.
pub fn router() -> Router<SharedProxyState> {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_tunnel))
        .route("/join", post(forward_request))
        .route("/leave", post(forward_request))
        .route("/start", post(forward_request))
        .route("/submit", post(forward_request))
        .route("/menu", post(forward_request))
        .route("/leaderboard", get(forward_request))
}

/// The router itself is stateless, so it is healthy whenever it answers.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn forward_request(
    State(state): State<SharedProxyState>,
    request: Request,
) -> Result<Response, AppError> {
    Ok(forward::forward_http(&state, request).await?)
}

/// Upgrade only when some backend is alive, then tunnel the socket to it.
async fn ws_tunnel(
    State(state): State<SharedProxyState>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let backend = state
        .pool()
        .probe()
        .await
        .ok_or(ServiceError::NoHealthyBackend)?;

    Ok(ws.on_upgrade(move |socket| tunnel::run_tunnel(state, socket, Some(backend))))
}
