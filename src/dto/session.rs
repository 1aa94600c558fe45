use serde::{Deserialize, Serialize};

use crate::{
    services::coordinator::{RequestOutcome, SessionSnapshot, SubmitOutcome},
    state::{phase::CoordinatorPhase, session::Player},
};

/// Route serving the image of the current item.
pub const ITEM_IMAGE_PATH: &str = "/session/item/image";

/// Public view of a player's cumulative statistics.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayerSummary {
    pub username: String,
    pub total_score: u32,
    pub correct_answers: u32,
    pub total_attempts: u32,
    pub accuracy: f64,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            username: player.username.clone(),
            total_score: player.total_score,
            correct_answers: player.correct_answers,
            total_attempts: player.total_attempts,
            accuracy: player.accuracy(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseDto {
    Idle,
    Running,
    Ending,
    Ended,
}

impl From<CoordinatorPhase> for PhaseDto {
    fn from(phase: CoordinatorPhase) -> Self {
        match phase {
            CoordinatorPhase::Idle => PhaseDto::Idle,
            CoordinatorPhase::Running => PhaseDto::Running,
            CoordinatorPhase::Ending => PhaseDto::Ending,
            CoordinatorPhase::Ended => PhaseDto::Ended,
        }
    }
}

/// State of the current (or last) round.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub phase: PhaseDto,
    pub player: Option<PlayerSummary>,
    /// Where to download the current puzzle, absent until one is loaded.
    pub image_url: Option<String>,
    pub score: u32,
    pub attempts: u32,
    pub accuracy: f64,
    pub remaining_ms: u64,
    pub active: bool,
    pub loading: bool,
}

impl From<SessionSnapshot> for SessionResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            phase: snapshot.phase.into(),
            player: snapshot.player.as_ref().map(PlayerSummary::from),
            image_url: snapshot
                .current_item
                .as_ref()
                .map(|_| ITEM_IMAGE_PATH.to_string()),
            score: snapshot.score,
            attempts: snapshot.attempts,
            accuracy: snapshot.accuracy,
            remaining_ms: u64::try_from(snapshot.remaining.as_millis()).unwrap_or(u64::MAX),
            active: snapshot.active,
            loading: snapshot.loading,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub value: i32,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Correct,
    Wrong,
    /// No puzzle was loaded; the answer was not counted.
    NoItem,
    /// The round is over; the answer was not counted.
    Inactive,
}

impl From<SubmitOutcome> for AnswerStatus {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Graded { correct: true } => AnswerStatus::Correct,
            SubmitOutcome::Graded { correct: false } => AnswerStatus::Wrong,
            SubmitOutcome::NoItem => AnswerStatus::NoItem,
            SubmitOutcome::Inactive => AnswerStatus::Inactive,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub status: AnswerStatus,
    pub session: SessionResponse,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipStatus {
    Loading,
    AlreadyLoading,
    SessionInactive,
    NotRunning,
}

impl From<RequestOutcome> for SkipStatus {
    fn from(outcome: RequestOutcome) -> Self {
        match outcome {
            RequestOutcome::Started => SkipStatus::Loading,
            RequestOutcome::AlreadyLoading => SkipStatus::AlreadyLoading,
            RequestOutcome::SessionInactive => SkipStatus::SessionInactive,
            RequestOutcome::NotRunning => SkipStatus::NotRunning,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    pub status: SkipStatus,
}

#[derive(Debug, Serialize)]
pub struct EndResponse {
    /// Whether this request terminated the round.
    pub ended: bool,
    pub session: SessionResponse,
}

#[derive(Debug, Deserialize)]
pub struct SoundRequest {
    pub muted: bool,
}

#[derive(Debug, Serialize)]
pub struct SoundResponse {
    pub muted: bool,
}
