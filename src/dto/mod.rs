/// Game endpoint bodies.
pub mod game;
/// Health payloads.
pub mod health;
/// Leaderboard payloads.
pub mod leaderboard;
/// Custom field validators.
pub mod validation;
/// Websocket messages.
pub mod ws;
