//! Health check payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Coarse service state reported on `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully operational.
    Ok,
    /// Game role running without reachable storage; play continues from memory.
    Degraded,
}

/// Liveness payload served on `/health` by both roles.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Current state.
    pub status: HealthStatus,
}

impl HealthResponse {
    /// Healthy answer.
    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
        }
    }

    /// Answer while storage is unreachable.
    pub fn degraded() -> Self {
        Self {
            status: HealthStatus::Degraded,
        }
    }
}
