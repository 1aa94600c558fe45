use serde::Serialize;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the coordinator task still answers.
    pub coordinator: bool,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(coordinator: bool) -> Self {
        Self {
            status: "ok".to_string(),
            coordinator,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(coordinator: bool) -> Self {
        Self {
            status: "degraded".to_string(),
            coordinator,
        }
    }
}
