use std::{fmt::Write, time::SystemTime};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::{
    dao::models::{PlayerEntity, UserEntity},
    dto::{
        auth::{AuthResponse, CredentialsRequest},
        session::PlayerSummary,
    },
    error::ServiceError,
    state::{SharedState, session::Player},
};

/// Hex-encoded SHA-256 digest of `password`.
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest
        .iter()
        .fold(String::with_capacity(digest.len() * 2), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

/// Create an account and its empty statistics.
pub async fn register(
    state: &SharedState,
    request: CredentialsRequest,
) -> Result<AuthResponse, ServiceError> {
    let store = state.require_player_store().await?;
    let user = UserEntity {
        username: request.username.clone(),
        password_hash: hash_password(&request.password),
        created_at: SystemTime::now(),
        last_login: None,
    };

    if !store.register_user(user).await? {
        return Err(ServiceError::Conflict(format!(
            "username `{}` is already taken",
            request.username
        )));
    }
    info!(username = %request.username, "user registered");

    let player = store
        .load_player(request.username.clone())
        .await?
        .unwrap_or_else(|| PlayerEntity::initial(request.username));
    Ok(auth_response(player))
}

/// Verify credentials and return the stored player record.
pub async fn authenticate(
    state: &SharedState,
    request: &CredentialsRequest,
) -> Result<PlayerEntity, ServiceError> {
    let store = state.require_player_store().await?;
    let user = store.find_user(request.username.clone()).await?;

    let valid = user.is_some_and(|user| user.password_hash == hash_password(&request.password));
    if !valid {
        return Err(ServiceError::Unauthorized("invalid username or password".into()));
    }

    if let Err(err) = store.record_login(request.username.clone()).await {
        warn!(username = %request.username, error = %err, "failed to record login");
    }

    let player = store
        .load_player(request.username.clone())
        .await?
        .unwrap_or_else(|| PlayerEntity::initial(request.username.clone()));
    Ok(player)
}

/// Check credentials without starting a round.
pub async fn login(
    state: &SharedState,
    request: CredentialsRequest,
) -> Result<AuthResponse, ServiceError> {
    let player = authenticate(state, &request).await?;
    info!(username = %request.username, "user logged in");
    Ok(auth_response(player))
}

fn auth_response(entity: PlayerEntity) -> AuthResponse {
    let games_played = entity.games_played;
    let best_session_score = entity.best_session_score;
    let player = Player::from(entity.stats);
    AuthResponse {
        player: PlayerSummary::from(&player),
        games_played,
        best_session_score,
    }
}
