//! Messages carried by the game websocket.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::state::game::PlayerScore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Envelope exchanged over the game websocket: `{"type": ..., "payload": {...}}`.
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WsMessage {
    /// Client → server: bind this connection to a known user.
    Register {
        /// Login name of a user known to the directory.
        username: String,
    },
    /// Server → one player: plaintext word of the round they just started.
    StartGame {
        /// Plaintext word to guess.
        word: String,
    },
    /// Server → all: current `(name, score)` of every bound player.
    PlayerList {
        /// Bound players in registration order.
        players: Vec<PlayerScore>,
    },
    /// Server → all: a player reached the win threshold.
    GameOver {
        /// Display name of the winner.
        winner: String,
        /// Announcement shown to every player.
        message: String,
    },
}

impl WsMessage {
    /// Parse a text frame received from a client.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// `game_over` announcing `winner`.
    pub fn game_over(winner: &str) -> Self {
        Self::GameOver {
            winner: winner.to_string(),
            message: format!("{winner} won the game!"),
        }
    }

    /// Encode as a websocket text frame.
    pub fn to_frame(&self) -> Result<Message, serde_json::Error> {
        serde_json::to_string(self).map(|text| Message::Text(text.into()))
    }

    /// Value of the `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::StartGame { .. } => "start_game",
            Self::PlayerList { .. } => "player_list",
            Self::GameOver { .. } => "game_over",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_uses_type_and_payload() {
        let value = serde_json::to_value(WsMessage::game_over("alice")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "game_over",
                "payload": {"winner": "alice", "message": "alice won the game!"}
            })
        );
    }

    #[test]
    fn register_parses_from_client_json() {
        let parsed =
            WsMessage::from_json_str(r#"{"type":"register","payload":{"username":"bob"}}"#)
                .unwrap();
        assert_eq!(
            parsed,
            WsMessage::Register {
                username: "bob".into()
            }
        );
        assert!(WsMessage::from_json_str(r#"{"type":"dance","payload":{}}"#).is_err());
    }
}
