//! Single point of mutation for [`GameState`].
//!
//! Every operation takes the one exclusive lock guarding both the state and the
//! [`RoundEngine`], so word assignment, scoring and win detection are atomic.

use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::{
    error::ServiceError,
    state::{
        game::{GameState, Player, PlayerScore, SnapshotError},
        round::{RoundEngine, is_correct_guess, is_winning_score},
    },
};

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// The newly added player.
    pub player: Player,
    /// Display names of every player, in join order.
    pub joined_users: Vec<String>,
}

/// Result of evaluating one guess.
#[derive(Debug, Clone)]
pub struct GuessOutcome {
    /// Whether the guess matched the assigned word.
    pub correct: bool,
    /// A word was assigned to the player because none was set before the guess.
    pub assigned: bool,
    /// Submitting player after the guess was applied.
    pub player: Player,
    /// Scrambled form of the next word, present on a correct guess.
    pub new_word: Option<String>,
    /// Set when this guess ended the round.
    pub winner: Option<Player>,
    /// Scores of every player after the guess.
    pub scores: Vec<PlayerScore>,
}

struct StoreInner {
    game: GameState,
    engine: RoundEngine,
    /// Set by the first mutation; a restore is refused from then on.
    touched: bool,
}

impl StoreInner {
    /// Pick a fresh word, record it as the round word and return `(plain, shuffled)`.
    fn next_word(&mut self) -> (String, String) {
        let word = self.engine.pick_word();
        let shuffled = self.engine.shuffle(&word);
        self.game.word = word.clone();
        self.game.shuffled_word = shuffled.clone();
        (word, shuffled)
    }
}

/// Owner of the game state; all reads and writes go through its single lock.
pub struct GameStateStore {
    inner: Mutex<StoreInner>,
}

/// Read-only access to the state while the store lock is held.
pub struct StoreView<'a> {
    guard: MutexGuard<'a, StoreInner>,
}

impl StoreView<'_> {
    /// State as of the moment the lock was taken.
    pub fn game(&self) -> &GameState {
        &self.guard.game
    }
}

impl GameStateStore {
    /// Empty game driven by `engine`.
    pub fn new(engine: RoundEngine) -> Self {
        Self::with_state(engine, GameState::default())
    }

    /// Store seeded with an existing `game`.
    pub fn with_state(engine: RoundEngine, game: GameState) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                game,
                engine,
                touched: false,
            }),
        }
    }

    /// Lock the store for reading. Callers needing the registry lock as well must take it
    /// after this one.
    pub async fn view(&self) -> StoreView<'_> {
        StoreView {
            guard: self.inner.lock().await,
        }
    }

    /// Append a new player with a zero score.
    pub async fn join(&self, id: String, name: String) -> Result<JoinOutcome, ServiceError> {
        let mut inner = self.inner.lock().await;
        if inner.game.player(&id).is_some() {
            return Err(ServiceError::AlreadyJoined(id));
        }

        let player = Player::new(id, name);
        inner.game.players.push(player.clone());
        inner.touched = true;
        let joined_users = inner
            .game
            .players
            .iter()
            .map(|player| player.name.clone())
            .collect();

        Ok(JoinOutcome {
            player,
            joined_users,
        })
    }

    /// Join unless the id is already present; returns whether a player was added.
    pub async fn ensure_joined(&self, id: &str, name: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.game.player(id).is_some() {
            return false;
        }
        inner.game.players.push(Player::new(id, name));
        inner.touched = true;
        true
    }

    /// Remove the player; returns whether someone was removed.
    pub async fn leave(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.game.players.iter().position(|player| player.id == id) {
            Some(index) => {
                inner.game.players.remove(index);
                inner.touched = true;
                true
            }
            None => false,
        }
    }

    /// Start a round for `id` and return the plaintext word assigned to it.
    pub async fn start_round(&self, id: &str) -> Result<String, ServiceError> {
        let mut inner = self.inner.lock().await;
        if inner.game.player(id).is_none() {
            return Err(player_not_found(id));
        }

        let (word, _) = inner.next_word();
        inner.touched = true;
        inner.game.started = true;
        inner.game.winner = None;
        if let Some(player) = inner.game.player_mut(id) {
            player.current_word = word.clone();
        }
        Ok(word)
    }

    /// Evaluate `guess` against the word assigned to `id`.
    pub async fn submit_guess(&self, id: &str, guess: &str) -> Result<GuessOutcome, ServiceError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let Some(index) = inner.game.players.iter().position(|player| player.id == id) else {
            return Err(player_not_found(id));
        };

        let assigned = !inner.game.players[index].has_word();
        if assigned {
            let (word, _) = inner.next_word();
            inner.game.players[index].current_word = word;
            inner.touched = true;
        }

        if !is_correct_guess(&inner.game.players[index].current_word, guess) {
            return Ok(GuessOutcome {
                correct: false,
                assigned,
                player: inner.game.players[index].clone(),
                new_word: None,
                winner: None,
                scores: inner.game.scores(),
            });
        }

        let (word, shuffled) = inner.next_word();
        inner.touched = true;
        let player = &mut inner.game.players[index];
        player.score += 1;
        player.current_word = word;
        let player = player.clone();

        let winner = if is_winning_score(player.score) {
            info!(player = %player.name, "player reached the win threshold");
            inner.game.started = false;
            inner.game.winner = Some(player.clone());
            Some(player.clone())
        } else {
            None
        };

        Ok(GuessOutcome {
            correct: true,
            assigned,
            player,
            new_word: Some(shuffled),
            winner,
            scores: inner.game.scores(),
        })
    }

    /// Zero the score of `id`; unknown ids are ignored.
    pub async fn reset(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(player) = inner.game.player_mut(id) {
            player.score = 0;
            inner.touched = true;
        }
    }

    /// Current scores in join order.
    pub async fn scores(&self) -> Vec<PlayerScore> {
        self.inner.lock().await.game.scores()
    }

    /// Copy of the player with `id`, if present.
    pub async fn player(&self, id: &str) -> Option<Player> {
        self.inner.lock().await.game.player(id).cloned()
    }

    /// Copy of the whole state.
    pub async fn state(&self) -> GameState {
        self.inner.lock().await.game.clone()
    }

    /// Encode the current state as a versioned snapshot.
    pub async fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        self.inner.lock().await.game.to_snapshot()
    }

    /// Replace the state with a decoded snapshot; undecodable input yields a fresh state.
    ///
    /// Refused once any mutation has been applied, since the live game is then the newer
    /// one. Returns whether the snapshot was applied.
    pub async fn restore(&self, bytes: &[u8]) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.touched {
            info!("game changed before the snapshot arrived; keeping the live state");
            return false;
        }

        let mut game = match GameState::from_snapshot(bytes) {
            Ok(game) => game,
            Err(err) => {
                warn!(error = %err, "discarding unreadable snapshot; starting with an empty game");
                GameState::default()
            }
        };
        if game.started && game.winner.is_some() {
            game.winner = None;
        }
        inner.game = game;
        true
    }
}

fn player_not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("player `{id}` not found"))
}
