//! Request and response bodies of the game endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::{validate_display_name, validate_player_id},
    state::game::{Player, PlayerScore},
};

/// Payload used to add a player to the game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    /// Display name.
    #[validate(length(min = 1, max = 32), custom(function = "validate_display_name"))]
    pub name: String,
    /// Identifier to join under; generated when omitted.
    #[serde(default)]
    #[validate(custom(function = "validate_player_id"))]
    pub id: Option<String>,
}

/// Body shared by the endpoints addressing a single player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    /// Identifier the player joined under.
    #[serde(alias = "player_id")]
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
}

/// Guess for the player's current word.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Identifier the player joined under.
    #[serde(alias = "player_id")]
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    /// Compared case-insensitively with the assigned word.
    #[validate(length(max = 64))]
    pub guess: String,
}

/// Choice made from the post-game menu.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MenuRequest {
    /// Identifier the player joined under.
    #[serde(alias = "player_id")]
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    /// Menu choice; `"new"` resets the player's score.
    #[serde(rename = "type")]
    pub kind: String,
}

impl MenuRequest {
    /// Whether the choice starts a new game.
    pub fn is_new_game(&self) -> bool {
        self.kind == "new"
    }
}

/// Public projection of a player; never exposes the word being guessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerSummary {
    /// Player identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Correct guesses so far.
    pub score: u32,
}

impl From<Player> for PlayerSummary {
    fn from(player: Player) -> Self {
        Self {
            id: player.id,
            name: player.name,
            score: player.score,
        }
    }
}

/// Answer to a successful join.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    /// Human-readable outcome.
    pub message: String,
    /// The player that joined.
    pub player: PlayerSummary,
    /// Display names of every player, in join order.
    pub joined_users: Vec<String>,
}

/// Answer carrying only a message.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable outcome.
    pub message: String,
}

/// Answer to a round start.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartResponse {
    /// Always `true` on a 200 answer.
    pub success: bool,
    /// Plaintext word assigned to the player.
    pub word: String,
}

/// Result of evaluating a guess.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// Whether the guess matched.
    pub correct: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Scores of every player after the guess.
    pub scores: Vec<PlayerScore>,
    /// Scrambled next word, present after a correct guess.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_word: Option<String>,
    /// Submitting player, present after a correct guess.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerSummary>,
    /// Set when this guess won the game.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerSummary>,
}

/// Bare success acknowledgement.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    /// Always `true` on a 200 answer.
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_accepts_both_spellings() {
        let camel: PlayerRequest = serde_json::from_str(r#"{"playerId":"abc"}"#).unwrap();
        let snake: PlayerRequest = serde_json::from_str(r#"{"player_id":"abc"}"#).unwrap();
        assert_eq!(camel.player_id, snake.player_id);
    }

    #[test]
    fn invalid_ids_fail_validation() {
        let request: SubmitRequest =
            serde_json::from_str(r#"{"playerId":"not an id","guess":"apple"}"#).unwrap();
        assert!(request.validate().is_err());

        let join: JoinRequest = serde_json::from_str(r#"{"name":"alice","id":""}"#).unwrap();
        assert!(join.validate().is_err());
        let join: JoinRequest = serde_json::from_str(r#"{"name":"alice"}"#).unwrap();
        assert!(join.validate().is_ok());
        let join: JoinRequest = serde_json::from_str(r#"{"name":"  "}"#).unwrap();
        assert!(join.validate().is_err());
    }

    #[test]
    fn menu_type_field_is_renamed() {
        let menu: MenuRequest =
            serde_json::from_str(r#"{"player_id":"abc","type":"new"}"#).unwrap();
        assert!(menu.is_new_game());
    }

    #[test]
    fn incorrect_submit_omits_optional_fields() {
        let body = serde_json::to_value(SubmitResponse {
            correct: false,
            message: "Incorrect, try again!".into(),
            scores: vec![],
            new_word: None,
            player: None,
            winner: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"correct": false, "message": "Incorrect, try again!", "scores": []})
        );
    }
}
