use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification of the game role.
#[openapi(
    paths(
        crate::routes::health::health,
        crate::routes::game::join,
        crate::routes::game::leave,
        crate::routes::game::start,
        crate::routes::game::submit,
        crate::routes::game::menu,
        crate::routes::leaderboard::leaderboard,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::game::JoinRequest,
            crate::dto::game::JoinResponse,
            crate::dto::game::PlayerRequest,
            crate::dto::game::SubmitRequest,
            crate::dto::game::SubmitResponse,
            crate::dto::game::MenuRequest,
            crate::dto::game::StartResponse,
            crate::dto::game::MessageResponse,
            crate::dto::game::SuccessResponse,
            crate::dto::game::PlayerSummary,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dto::leaderboard::LeaderboardEntry,
            crate::state::game::PlayerScore,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Joining, playing and scoring"),
        (name = "websocket", description = "Realtime session socket"),
    )
)]
pub struct ApiDoc;
