use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use axum_valid::Valid;

use crate::{
    dto::auth::{AuthResponse, CredentialsRequest},
    error::AppError,
    services::auth_service,
    state::SharedState,
};

/// Account endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Create an account.
pub async fn register(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CredentialsRequest>>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = auth_service::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Verify credentials and return the player's statistics.
pub async fn login(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CredentialsRequest>>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(auth_service::login(&state, payload).await?))
}
