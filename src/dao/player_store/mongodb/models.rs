use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{PlayerEntity, PlayerStatsEntity, SessionResultEntity, UserEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    username: String,
    password_hash: String,
    created_at: DateTime,
    #[serde(default)]
    last_login: Option<DateTime>,
}

/// Player counters are stored as `i64` since BSON has no unsigned integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    username: String,
    #[serde(default)]
    total_score: i64,
    #[serde(default)]
    correct_answers: i64,
    #[serde(default)]
    total_attempts: i64,
    #[serde(default)]
    games_played: i64,
    #[serde(default)]
    best_session_score: i64,
    #[serde(default)]
    last_played: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionResultDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    username: String,
    score: i64,
    accuracy: f64,
    attempts: i64,
    played_at: DateTime,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            username: value.username,
            password_hash: value.password_hash,
            created_at: DateTime::from_system_time(value.created_at),
            last_login: value.last_login.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            username: value.username,
            password_hash: value.password_hash,
            created_at: value.created_at.to_system_time(),
            last_login: value.last_login.map(DateTime::to_system_time),
        }
    }
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            username: value.stats.username,
            total_score: value.stats.total_score.into(),
            correct_answers: value.stats.correct_answers.into(),
            total_attempts: value.stats.total_attempts.into(),
            games_played: value.games_played.into(),
            best_session_score: value.best_session_score.into(),
            last_played: value.last_played.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            stats: PlayerStatsEntity {
                username: value.username,
                total_score: counter(value.total_score),
                correct_answers: counter(value.correct_answers),
                total_attempts: counter(value.total_attempts),
            },
            games_played: counter(value.games_played),
            best_session_score: counter(value.best_session_score),
            last_played: value.last_played.map(DateTime::to_system_time),
        }
    }
}

impl From<SessionResultEntity> for MongoSessionResultDocument {
    fn from(value: SessionResultEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            score: value.score.into(),
            accuracy: value.accuracy,
            attempts: value.attempts.into(),
            played_at: DateTime::from_system_time(value.played_at),
        }
    }
}

fn counter(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Filter matching the documents keyed by `username`.
pub fn doc_id(username: &str) -> Document {
    doc! {"_id": username}
}

/// `$set` body for the cumulative counters of a player.
pub fn stats_fields(stats: &PlayerStatsEntity) -> Document {
    doc! {
        "total_score": i64::from(stats.total_score),
        "correct_answers": i64::from(stats.correct_answers),
        "total_attempts": i64::from(stats.total_attempts),
    }
}
