use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    state::SharedState,
};

/// Timing of the supervisor loop.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorPolicy {
    /// First back-off delay after a failure.
    pub initial_delay: Duration,
    /// Upper bound for the doubling back-off.
    pub max_delay: Duration,
    /// Pause between health checks while storage is up.
    pub health_poll_interval: Duration,
    /// In-place reconnect attempts before a full reconnection.
    pub max_reconnect_attempts: u32,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(10),
            health_poll_interval: Duration::from_secs(5),
            max_reconnect_attempts: 3,
        }
    }
}

/// Connect to the storage backend and keep the shared state in degraded mode while it is
/// unavailable.
///
/// The persisted snapshot is read on the first successful connection, before the store is
/// installed, and only applied if nothing changed the game in the meantime. Every
/// connection then writes the in-memory game back.
pub async fn run<F, Fut>(state: SharedState, policy: SupervisorPolicy, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = policy.initial_delay;
    let mut restored = false;

    loop {
        match connect().await {
            Ok(store) => {
                if !restored {
                    if let Err(err) = state.load_snapshot(store.as_ref()).await {
                        warn!(error = %err, "failed to read the game snapshot; retrying connection");
                        sleep(delay).await;
                        delay = (delay * 2).min(policy.max_delay);
                        continue;
                    }
                    restored = true;
                }
                state.set_game_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                state.persist().await;
                delay = policy.initial_delay;

                supervise(&state, &policy, store.as_ref()).await;

                sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}

/// Poll `store` until it fails and cannot be revived in place.
async fn supervise(state: &SharedState, policy: &SupervisorPolicy, store: &dyn GameStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
                sleep(policy.health_poll_interval).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                let mut reconnect_delay = policy.initial_delay;
                let mut reconnected = false;

                for attempt in 0..policy.max_reconnect_attempts {
                    match store.try_reconnect().await {
                        Ok(()) => {
                            info!("storage reconnection succeeded after health check failure");
                            reconnected = true;
                            break;
                        }
                        Err(reconnect_err) => {
                            if attempt == 0 {
                                warn!(
                                    attempt, error = %reconnect_err,
                                    "storage reconnect first attempt failed; entering degraded mode"
                                );
                                state.update_degraded(true).await;
                            } else {
                                warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                            }
                            sleep(reconnect_delay).await;
                            reconnect_delay = (reconnect_delay * 2).min(policy.max_delay);
                        }
                    }
                }

                if !reconnected {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    return;
                }
                state.update_degraded(false).await;
                state.persist().await;
                sleep(policy.health_poll_interval).await;
            }
        }
    }
}
