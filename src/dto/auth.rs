use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dto::{session::PlayerSummary, validation::validate_username};

/// Credentials used to register, log in, or start a round.
#[derive(Debug, Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(length(min = 4, max = 128, message = "Password must be 4 to 128 characters"))]
    pub password: String,
}

/// Returned after a successful registration or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub player: PlayerSummary,
    pub games_played: u32,
    pub best_session_score: u32,
}
