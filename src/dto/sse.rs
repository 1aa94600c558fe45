use serde::Serialize;

use crate::dto::session::PlayerSummary;

/// A round started.
pub const EVENT_SESSION_STARTED: &str = "session.started";
/// A puzzle is ready to download.
pub const EVENT_ITEM_LOADED: &str = "item.loaded";
/// An answer was graded.
pub const EVENT_ANSWER_SUBMITTED: &str = "answer.submitted";
/// Cumulative player stats changed.
pub const EVENT_SCORE_UPDATED: &str = "score.updated";
/// The round terminated.
pub const EVENT_SESSION_ENDED: &str = "session.ended";
/// Countdown observation.
pub const EVENT_TICK: &str = "tick";
/// Sound cue to play.
pub const EVENT_SOUND: &str = "sound";
/// Degraded mode changed.
pub const EVENT_SYSTEM_STATUS: &str = "system_status";
/// First event of every stream.
pub const EVENT_HANDSHAKE: &str = "handshake";

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionStartedEvent {
    pub player: PlayerSummary,
}

#[derive(Debug, Serialize)]
/// Broadcast when a puzzle becomes current. The image itself is served by
/// `GET /session/item/image`.
pub struct ItemLoadedEvent {
    pub image_url: String,
    pub image_size: usize,
}

#[derive(Debug, Serialize)]
pub struct AnswerSubmittedEvent {
    pub value: i32,
    pub correct: bool,
    pub player: PlayerSummary,
}

#[derive(Debug, Serialize)]
pub struct ScoreUpdatedEvent {
    pub player: PlayerSummary,
}

#[derive(Debug, Serialize)]
pub struct SessionEndedEvent {
    pub player: PlayerSummary,
    pub score: u32,
    pub attempts: u32,
    pub accuracy: f64,
    pub passed: bool,
    /// RFC 3339 timestamp of the termination.
    pub ended_at: String,
}

#[derive(Debug, Serialize)]
pub struct TickEvent {
    pub remaining_ms: u64,
    /// Whole seconds left, rounded up.
    pub remaining_secs: u64,
}

#[derive(Debug, Serialize)]
/// Named sound cue for the presentation layer to play.
pub struct SoundEvent {
    pub cue: &'static str,
}
