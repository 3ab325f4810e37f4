use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the degraded flag maintained by the storage supervisor.
///
/// The store itself is not pinged here, so probes from the router stay cheap.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    if state.is_degraded().await {
        debug!("health requested while storage is unavailable");
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}
