use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        auth::CredentialsRequest,
        session::{
            AnswerRequest, AnswerResponse, EndResponse, ITEM_IMAGE_PATH, SessionResponse,
            SkipResponse, SoundRequest, SoundResponse,
        },
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Round lifecycle endpoints driven by the presentation layer.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session", post(start_session).get(get_session))
        .route("/session/answer", post(submit_answer))
        .route("/session/skip", post(skip_item))
        .route("/session/end", post(end_session))
        .route("/session/sound", post(set_sound))
        .route(ITEM_IMAGE_PATH, get(get_item_image))
}

/// Log the player in and start a new round.
pub async fn start_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CredentialsRequest>>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(session_service::start(&state, payload).await?))
}

/// Return the state of the current (or last) round.
pub async fn get_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(session_service::current(&state).await?))
}

/// Grade an answer against the current puzzle.
pub async fn submit_answer(
    State(state): State<SharedState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    Ok(Json(session_service::answer(&state, payload).await?))
}

/// Skip the current puzzle.
pub async fn skip_item(State(state): State<SharedState>) -> Result<Json<SkipResponse>, AppError> {
    Ok(Json(session_service::skip(&state).await?))
}

/// Terminate the running round.
pub async fn end_session(State(state): State<SharedState>) -> Result<Json<EndResponse>, AppError> {
    Ok(Json(session_service::end(&state).await?))
}

/// Mute or unmute sound cues.
pub async fn set_sound(
    State(state): State<SharedState>,
    Json(payload): Json<SoundRequest>,
) -> Json<SoundResponse> {
    Json(session_service::set_sound(&state, payload))
}

/// Serve the image of the current puzzle.
pub async fn get_item_image(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let item = session_service::current_item(&state).await?;
    Ok((
        [
            (header::CONTENT_TYPE, item.content_type()),
            (header::CACHE_CONTROL, "no-store"),
        ],
        item.image().to_vec(),
    ))
}
