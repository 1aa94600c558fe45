use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage and coordinator health while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_player_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let coordinator = match state.coordinator().snapshot().await {
        Ok(_) => true,
        Err(err) => {
            warn!(error = %err, "session coordinator unreachable");
            false
        }
    };

    if state.is_degraded() {
        HealthResponse::degraded(coordinator)
    } else {
        HealthResponse::ok(coordinator)
    }
}
