use crate::{
    dao::storage::with_deadline,
    dto::leaderboard::{LeaderboardEntry, LeaderboardResponse},
    error::ServiceError,
    state::SharedState,
};

/// Read the win counters of the user directory, highest first.
pub async fn leaderboard(state: &SharedState) -> Result<LeaderboardResponse, ServiceError> {
    let store = state.require_game_store().await?;
    let limit = state.config().persistence.timeout;
    let mut users = with_deadline(limit, "leaderboard", store.leaderboard()).await?;
    users.sort_by(|a, b| b.wins.cmp(&a.wins));

    Ok(LeaderboardResponse {
        leaderboard: users.into_iter().map(LeaderboardEntry::from).collect(),
    })
}
