/// Registration and login.
pub mod auth_service;
/// Round lifecycle actor.
pub mod coordinator;
/// Periodic countdown feeding the coordinator.
pub mod countdown;
/// Health check service.
pub mod health_service;
/// Remote puzzle source.
pub mod item_source;
/// Leaderboard queries.
pub mod leaderboard_service;
/// Bus observer persisting answers and round results.
pub mod persistence;
/// HTTP-facing round operations.
pub mod session_service;
/// Bus observer emitting sound cues.
pub mod sound_cues;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
