use serde::{Deserialize, Serialize};

/// User record held by the external user directory.
///
/// Registration lives outside this service; the game only reads users to bind websocket
/// sessions and bumps `wins` when a round is won.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier, reused as the in-game player id.
    pub id: String,
    /// Login name, also used as the in-game display name.
    pub username: String,
    /// Number of rounds won across all sessions.
    #[serde(default)]
    pub wins: u32,
    /// Score carried over when the user binds a websocket session.
    #[serde(default)]
    pub score: u32,
}

impl UserEntity {
    /// User with no wins and a zero score.
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            wins: 0,
            score: 0,
        }
    }
}
