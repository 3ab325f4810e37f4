//! HTTP surface of both roles.

use axum::Router;

use crate::{proxy::SharedProxyState, state::SharedState};

/// Swagger UI and OpenAPI JSON.
pub mod docs;
/// Extractors with JSON error bodies.
pub mod extract;
/// Game endpoints.
pub mod game;
/// Health endpoint.
pub mod health;
/// Leaderboard endpoint.
pub mod leaderboard;
/// Router role endpoints.
pub mod proxy;
/// Game websocket endpoint.
pub mod websocket;

/// Compose the routes of the game role, wiring in shared state and documentation routes.
pub fn game_router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(game::router())
        .merge(leaderboard::router());

    api_router.merge(docs::router()).with_state(state)
}

/// Compose the routes of the router role.
pub fn proxy_router(state: SharedProxyState) -> Router<()> {
    proxy::router().with_state(state)
}
