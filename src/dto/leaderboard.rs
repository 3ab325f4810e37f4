//! Leaderboard payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::models::UserEntity;

/// One user of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntry {
    /// Login name.
    pub username: String,
    /// Rounds won.
    pub wins: u32,
}

impl From<UserEntity> for LeaderboardEntry {
    fn from(user: UserEntity) -> Self {
        Self {
            username: user.username,
            wins: user.wins,
        }
    }
}

/// Users ordered by wins, highest first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardResponse {
    /// Entries, highest wins first.
    pub leaderboard: Vec<LeaderboardEntry>,
}
