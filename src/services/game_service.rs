use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::storage::with_deadline,
    dto::{
        game::{
            JoinRequest, JoinResponse, MenuRequest, MessageResponse, PlayerRequest,
            PlayerSummary, StartResponse, SubmitRequest, SubmitResponse, SuccessResponse,
        },
        ws::WsMessage,
    },
    error::ServiceError,
    state::{SharedState, game::Player},
};

const CORRECT_MESSAGE: &str = "Correct! New word assigned.";
const INCORRECT_MESSAGE: &str = "Incorrect, try again!";

/// Add a player to the game and announce the new roster.
pub async fn join(state: &SharedState, request: JoinRequest) -> Result<JoinResponse, ServiceError> {
    let id = request
        .id
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let outcome = state.store().join(id, request.name.trim().to_string()).await?;
    info!(player = %outcome.player.name, id = %outcome.player.id, "player joined");

    state.persist().await;
    state.publish_player_list().await;

    Ok(JoinResponse {
        message: "Player joined".into(),
        player: outcome.player.into(),
        joined_users: outcome.joined_users,
    })
}

/// Remove a player; leaving twice is not an error.
pub async fn leave(state: &SharedState, request: PlayerRequest) -> MessageResponse {
    if state.store().leave(&request.player_id).await {
        info!(id = %request.player_id, "player left");
        state.persist().await;
        state.publish_player_list().await;
    }

    MessageResponse {
        message: "Player left the game".into(),
    }
}

/// Start a round for the player and push the plaintext word to its sockets.
pub async fn start(
    state: &SharedState,
    request: PlayerRequest,
) -> Result<StartResponse, ServiceError> {
    let word = state.store().start_round(&request.player_id).await?;
    state.persist().await;

    match (WsMessage::StartGame { word: word.clone() }).to_frame() {
        Ok(frame) => {
            if state.registry().send_to_player(&request.player_id, frame) == 0 {
                info!(id = %request.player_id, "round started for a player without a live socket");
            }
        }
        Err(err) => warn!(error = %err, "failed to encode start_game message"),
    }

    Ok(StartResponse {
        success: true,
        word,
    })
}

/// Evaluate a guess, publishing score changes and the end of the round.
pub async fn submit(
    state: &SharedState,
    request: SubmitRequest,
) -> Result<SubmitResponse, ServiceError> {
    let outcome = state
        .store()
        .submit_guess(&request.player_id, &request.guess)
        .await?;

    if !outcome.correct {
        if outcome.assigned {
            state.persist().await;
        }
        return Ok(SubmitResponse {
            correct: false,
            message: INCORRECT_MESSAGE.into(),
            scores: outcome.scores,
            new_word: None,
            player: None,
            winner: None,
        });
    }

    state.persist().await;
    state.publish_player_list().await;

    let message = match &outcome.winner {
        Some(winner) => {
            announce_winner(state, winner).await;
            format!("{} won the game!", winner.name)
        }
        None => CORRECT_MESSAGE.into(),
    };

    Ok(SubmitResponse {
        correct: true,
        message,
        scores: outcome.scores,
        new_word: outcome.new_word,
        player: Some(outcome.player.into()),
        winner: outcome.winner.map(PlayerSummary::from),
    })
}

/// Handle a menu choice; `"new"` zeroes the player's score.
pub async fn menu(state: &SharedState, request: MenuRequest) -> SuccessResponse {
    if request.is_new_game() {
        state.store().reset(&request.player_id).await;
        state.persist().await;
        state.publish_player_list().await;
    }
    SuccessResponse { success: true }
}

async fn announce_winner(state: &SharedState, winner: &Player) {
    info!(winner = %winner.name, "broadcasting game over");
    state
        .broadcaster()
        .publish_reliable(WsMessage::game_over(&winner.name))
        .await;

    let Some(store) = state.game_store().await else {
        warn!(winner = %winner.name, "no storage installed; win not recorded");
        return;
    };
    let limit = state.config().persistence.timeout;
    let call = store.record_win(winner.id.clone(), winner.name.clone());
    if let Err(err) = with_deadline(limit, "record_win", call).await {
        warn!(winner = %winner.name, error = %err, "failed to record win");
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::{GameStore, memory::MemoryGameStore},
        state::{AppState, game::GameState, registry::PlayerBinding},
    };

    async fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<WsMessage> {
        let mut seen = Vec::new();
        while let Ok(Some(frame)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await
        {
            if let Message::Text(text) = frame {
                seen.push(WsMessage::from_json_str(text.as_str()).unwrap());
            }
        }
        seen
    }

    #[tokio::test]
    async fn alice_wins_after_three_correct_guesses() {
        let state = AppState::new(AppConfig::default());
        let backend = Arc::new(MemoryGameStore::new());
        state.set_game_store(backend.clone()).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = state.registry().register(tx);

        let joined = join(
            &state,
            JoinRequest {
                name: "alice".into(),
                id: Some("alice-1".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(joined.joined_users, vec!["alice"]);
        state.registry().bind(
            conn,
            PlayerBinding {
                player_id: "alice-1".into(),
                username: "alice".into(),
            },
        );

        let started = start(
            &state,
            PlayerRequest {
                player_id: "alice-1".into(),
            },
        )
        .await
        .unwrap();
        assert!(started.success);

        let mut last = None;
        for _ in 0..3 {
            let word = state.store().player("alice-1").await.unwrap().current_word;
            last = Some(
                submit(
                    &state,
                    SubmitRequest {
                        player_id: "alice-1".into(),
                        guess: word.to_uppercase(),
                    },
                )
                .await
                .unwrap(),
            );
        }

        let last = last.unwrap();
        assert!(last.correct);
        assert_eq!(last.message, "alice won the game!");
        assert_eq!(last.winner.map(|w| w.name), Some("alice".to_string()));

        let messages = drain(&mut rx).await;
        assert!(messages.contains(&WsMessage::StartGame { word: started.word }));
        let game_overs: Vec<_> = messages
            .iter()
            .filter(|m| matches!(m, WsMessage::GameOver { .. }))
            .collect();
        assert_eq!(game_overs, vec![&WsMessage::game_over("alice")]);

        let board = backend.leaderboard().await.unwrap();
        assert_eq!(board[0].username, "alice");
        assert_eq!(board[0].wins, 1);
    }

    #[tokio::test]
    async fn incorrect_guess_reports_scores_only() {
        let state = AppState::new(AppConfig::default());
        join(
            &state,
            JoinRequest {
                name: "bob".into(),
                id: Some("bob".into()),
            },
        )
        .await
        .unwrap();

        let response = submit(
            &state,
            SubmitRequest {
                player_id: "bob".into(),
                guess: "xyzzy".into(),
            },
        )
        .await
        .unwrap();
        assert!(!response.correct);
        assert_eq!(response.message, INCORRECT_MESSAGE);
        assert_eq!(response.scores.len(), 1);
        assert!(response.new_word.is_none());
    }

    #[tokio::test]
    async fn word_assigned_by_a_wrong_guess_is_persisted() {
        let state = AppState::new(AppConfig::default());
        let backend = Arc::new(MemoryGameStore::new());
        state.set_game_store(backend.clone()).await;
        join(
            &state,
            JoinRequest {
                name: "fay".into(),
                id: Some("f".into()),
            },
        )
        .await
        .unwrap();

        let response = submit(
            &state,
            SubmitRequest {
                player_id: "f".into(),
                guess: "xyzzy".into(),
            },
        )
        .await
        .unwrap();
        assert!(!response.correct);

        let live = state.store().player("f").await.unwrap();
        assert!(live.has_word());
        let stored = backend
            .load_snapshot(state.config().snapshot_key.clone())
            .await
            .unwrap()
            .unwrap();
        let saved = GameState::from_snapshot(&stored).unwrap();
        assert_eq!(saved.player("f").unwrap().current_word, live.current_word);
    }

    #[tokio::test]
    async fn duplicate_join_is_a_conflict() {
        let state = AppState::new(AppConfig::default());
        let request = || JoinRequest {
            name: "carol".into(),
            id: Some("c".into()),
        };
        join(&state, request()).await.unwrap();
        assert!(matches!(
            join(&state, request()).await,
            Err(ServiceError::AlreadyJoined(_))
        ));
    }

    #[tokio::test]
    async fn menu_new_resets_score() {
        let state = AppState::new(AppConfig::default());
        join(
            &state,
            JoinRequest {
                name: "dan".into(),
                id: Some("d".into()),
            },
        )
        .await
        .unwrap();
        let word = state.store().start_round("d").await.unwrap();
        state.store().submit_guess("d", &word).await.unwrap();

        let response = menu(
            &state,
            MenuRequest {
                player_id: "d".into(),
                kind: "new".into(),
            },
        )
        .await;
        assert!(response.success);
        assert_eq!(state.store().player("d").await.unwrap().score, 0);
    }

    #[tokio::test]
    async fn generated_ids_are_valid_player_ids() {
        let state = AppState::new(AppConfig::default());
        let joined = join(
            &state,
            JoinRequest {
                name: "eve".into(),
                id: None,
            },
        )
        .await
        .unwrap();
        assert!(crate::dto::validation::validate_player_id(&joined.player.id).is_ok());
    }
}
