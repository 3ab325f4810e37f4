use axum::{Json, Router, extract::State, routing::post};
use validator::Validate;

use crate::{
    dto::game::{
        JoinRequest, JoinResponse, MenuRequest, MessageResponse, PlayerRequest, StartResponse,
        SubmitRequest, SubmitResponse, SuccessResponse,
    },
    error::AppError,
    routes::extract::JsonBody,
    services::game_service,
    state::SharedState,
};

/// Routes driving a player through the game.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/join", post(join))
        .route("/leave", post(leave))
        .route("/start", post(start))
        .route("/submit", post(submit))
        .route("/menu", post(menu))
}

/// Add a player to the game.
#[utoipa::path(
    post,
    path = "/join",
    tag = "game",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Player joined", body = JoinResponse),
        (status = 400, description = "Invalid body"),
        (status = 409, description = "A player with this id already joined")
    )
)]
pub async fn join(
    State(state): State<SharedState>,
    JsonBody(payload): JsonBody<JoinRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    payload.validate()?;
    Ok(Json(game_service::join(&state, payload).await?))
}

/// Remove a player from the game.
#[utoipa::path(
    post,
    path = "/leave",
    tag = "game",
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Player left", body = MessageResponse),
        (status = 400, description = "Invalid player id")
    )
)]
pub async fn leave(
    State(state): State<SharedState>,
    JsonBody(payload): JsonBody<PlayerRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;
    Ok(Json(game_service::leave(&state, payload).await))
}

/// Assign a new word to the player and start the round.
#[utoipa::path(
    post,
    path = "/start",
    tag = "game",
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Round started", body = StartResponse),
        (status = 400, description = "Invalid player id"),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn start(
    State(state): State<SharedState>,
    JsonBody(payload): JsonBody<PlayerRequest>,
) -> Result<Json<StartResponse>, AppError> {
    payload.validate()?;
    Ok(Json(game_service::start(&state, payload).await?))
}

/// Submit a guess for the player's current word.
#[utoipa::path(
    post,
    path = "/submit",
    tag = "game",
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Guess evaluated", body = SubmitResponse),
        (status = 400, description = "Invalid body"),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn submit(
    State(state): State<SharedState>,
    JsonBody(payload): JsonBody<SubmitRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    payload.validate()?;
    Ok(Json(game_service::submit(&state, payload).await?))
}

/// Apply a menu choice.
#[utoipa::path(
    post,
    path = "/menu",
    tag = "game",
    request_body = MenuRequest,
    responses(
        (status = 200, description = "Choice applied", body = SuccessResponse),
        (status = 400, description = "Invalid player id")
    )
)]
pub async fn menu(
    State(state): State<SharedState>,
    JsonBody(payload): JsonBody<MenuRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    payload.validate()?;
    Ok(Json(game_service::menu(&state, payload).await))
}
