use axum::Router;

use crate::state::SharedState;

/// Registration and login.
pub mod auth;
/// Health check.
pub mod health;
/// Rankings.
pub mod leaderboard;
/// Round lifecycle.
pub mod session;
/// Event stream.
pub mod sse;

/// Compose all route trees and wire in shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(auth::router())
        .merge(session::router())
        .merge(leaderboard::router())
        .with_state(state)
}
