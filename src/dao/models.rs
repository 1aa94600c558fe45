use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::session::Player;

/// Login credentials of a registered user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Unique login name.
    pub username: String,
    /// Hex-encoded SHA-256 digest of the password.
    pub password_hash: String,
    /// Registration time.
    pub created_at: SystemTime,
    /// Last successful login.
    pub last_login: Option<SystemTime>,
}

/// Cumulative counters pushed to storage after every graded answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerStatsEntity {
    /// Owner of the stats.
    pub username: String,
    /// Total points.
    pub total_score: u32,
    /// Correct answers.
    pub correct_answers: u32,
    /// Submitted answers.
    pub total_attempts: u32,
}

/// Full persisted player record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Cumulative counters.
    pub stats: PlayerStatsEntity,
    /// Rounds completed.
    pub games_played: u32,
    /// Best score reached in a single round.
    pub best_session_score: u32,
    /// End of the last completed round.
    pub last_played: Option<SystemTime>,
}

impl PlayerEntity {
    /// Record created alongside a new user.
    pub fn initial(username: impl Into<String>) -> Self {
        Self {
            stats: PlayerStatsEntity {
                username: username.into(),
                total_score: 0,
                correct_answers: 0,
                total_attempts: 0,
            },
            games_played: 0,
            best_session_score: 0,
            last_played: None,
        }
    }

    /// Percentage of correct answers, `0.0` before the first attempt.
    pub fn accuracy(&self) -> f64 {
        if self.stats.total_attempts == 0 {
            return 0.0;
        }
        f64::from(self.stats.correct_answers) * 100.0 / f64::from(self.stats.total_attempts)
    }
}

/// Outcome of one finished round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionResultEntity {
    /// Identifier of the stored result.
    pub id: Uuid,
    /// Player of the round.
    pub username: String,
    /// Correct answers in the round.
    pub score: u32,
    /// Round accuracy in percent.
    pub accuracy: f64,
    /// Answers submitted in the round.
    pub attempts: u32,
    /// End of the round.
    pub played_at: SystemTime,
}

impl From<&Player> for PlayerStatsEntity {
    fn from(value: &Player) -> Self {
        Self {
            username: value.username.clone(),
            total_score: value.total_score,
            correct_answers: value.correct_answers,
            total_attempts: value.total_attempts,
        }
    }
}

impl From<PlayerStatsEntity> for Player {
    fn from(value: PlayerStatsEntity) -> Self {
        Self {
            username: value.username,
            total_score: value.total_score,
            correct_answers: value.correct_answers,
            total_attempts: value.total_attempts,
        }
    }
}
