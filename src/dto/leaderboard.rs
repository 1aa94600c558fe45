use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dao::models::PlayerEntity;
use crate::dto::format_system_time;

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Validate)]
pub struct LeaderboardQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: usize,
}

/// One row of the leaderboard.
#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub position: usize,
    pub username: String,
    pub total_score: u32,
    pub accuracy: f64,
    pub games_played: u32,
    pub best_session_score: u32,
    pub last_played: Option<String>,
}

impl LeaderboardEntry {
    pub fn new(position: usize, player: PlayerEntity) -> Self {
        let accuracy = player.accuracy();
        Self {
            position,
            username: player.stats.username,
            total_score: player.stats.total_score,
            accuracy,
            games_played: player.games_played,
            best_session_score: player.best_session_score,
            last_played: player.last_played.map(format_system_time),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    pub total_players: u64,
}

#[derive(Debug, Serialize)]
pub struct PlayerRankResponse {
    pub username: String,
    pub rank: u64,
    pub total_players: u64,
    pub total_score: u32,
    pub accuracy: f64,
    pub games_played: u32,
    pub best_session_score: u32,
}
