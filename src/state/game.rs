//! Authoritative game data and its persisted snapshot form.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use utoipa::ToSchema;

/// Snapshot schema written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Participant tracked by the game state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Identity of the player; unique inside a game.
    pub id: String,
    /// Display name, not unique.
    pub name: String,
    /// Correct guesses so far.
    #[serde(default)]
    pub score: u32,
    /// Plaintext word the player is currently guessing; empty when none is assigned.
    #[serde(default)]
    pub current_word: String,
}

impl Player {
    /// Player with a zero score and no word.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            score: 0,
            current_word: String::new(),
        }
    }

    /// Whether a word is currently assigned.
    pub fn has_word(&self) -> bool {
        !self.current_word.is_empty()
    }
}

/// Whole mutable state of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameState {
    /// Last word handed out.
    pub word: String,
    /// Scrambled form of [`GameState::word`].
    pub shuffled_word: String,
    /// Players in join order.
    pub players: Vec<Player>,
    /// A round is in progress.
    pub started: bool,
    /// Set when a player reached the win threshold; only while `started` is false.
    pub winner: Option<Player>,
}

/// `(name, score)` pair exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerScore {
    /// Display name.
    pub name: String,
    /// Correct guesses so far.
    pub score: u32,
}

impl From<&Player> for PlayerScore {
    fn from(player: &Player) -> Self {
        Self {
            name: player.name.clone(),
            score: player.score,
        }
    }
}

impl GameState {
    /// Player with `id`, if present.
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    /// Mutable access to the player with `id`.
    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    /// `(name, score)` of every player, in join order.
    pub fn scores(&self) -> Vec<PlayerScore> {
        self.players.iter().map(PlayerScore::from).collect()
    }

    /// Serialize into the versioned snapshot envelope.
    pub fn to_snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        let saved_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "invalid-timestamp".into());
        let envelope = SnapshotEnvelopeRef {
            version: SNAPSHOT_VERSION,
            saved_at,
            state: self,
        };
        serde_json::to_vec(&envelope).map_err(SnapshotError::Encode)
    }

    /// Decode a snapshot blob, accepting both the envelope and the legacy bare state.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self, SnapshotError> {
        match serde_json::from_slice::<StoredSnapshot>(bytes).map_err(SnapshotError::Decode)? {
            StoredSnapshot::Envelope { version, state, .. } if version == SNAPSHOT_VERSION => {
                Ok(state)
            }
            StoredSnapshot::Envelope { version, .. } => {
                Err(SnapshotError::UnsupportedVersion(version))
            }
            StoredSnapshot::Legacy(state) => Ok(state),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotEnvelopeRef<'a> {
    version: u32,
    saved_at: String,
    state: &'a GameState,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSnapshot {
    #[serde(rename_all = "camelCase")]
    Envelope {
        version: u32,
        #[allow(dead_code)]
        #[serde(default)]
        saved_at: Option<String>,
        state: GameState,
    },
    Legacy(GameState),
}

/// Failure to encode or decode a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The state could not be serialized.
    #[error("failed to encode snapshot")]
    Encode(#[source] serde_json::Error),
    /// The bytes are neither an envelope nor a bare state.
    #[error("failed to decode snapshot")]
    Decode(#[source] serde_json::Error),
    /// Written by a newer build.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}
