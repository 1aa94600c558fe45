use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::leaderboard::{LeaderboardQuery, LeaderboardResponse, PlayerRankResponse},
    error::AppError,
    services::leaderboard_service,
    state::SharedState,
};

/// Ranking endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/leaderboard", get(get_leaderboard))
        .route("/leaderboard/{username}", get(get_player_rank))
}

/// Return the best players ordered by score, then accuracy.
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<LeaderboardQuery>>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(leaderboard_service::top(&state, query.limit).await?))
}

/// Return the rank of a single player.
pub async fn get_player_rank(
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<PlayerRankResponse>, AppError> {
    Ok(Json(
        leaderboard_service::player_rank(&state, username).await?,
    ))
}
