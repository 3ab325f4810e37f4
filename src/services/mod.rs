/// OpenAPI documentation generation.
pub mod documentation;
/// Join, start, guess and menu operations.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Win counters read from the user directory.
pub mod leaderboard_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
