use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::leaderboard::LeaderboardResponse, error::AppError, services::leaderboard_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "game",
    responses(
        (status = 200, description = "Users ordered by wins", body = LeaderboardResponse),
        (status = 500, description = "User directory failed"),
        (status = 503, description = "No storage available")
    )
)]
/// Return the wins of every known user, highest first.
pub async fn leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(leaderboard_service::leaderboard(&state).await?))
}

/// Leaderboard route.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/leaderboard", get(leaderboard))
}
