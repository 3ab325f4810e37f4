//! Health probing of the game backend pool.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use reqwest::{Client, StatusCode};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Ordered list of game backends probed on demand.
pub struct BackendPool {
    backends: Vec<String>,
    client: Client,
    probe_timeout: Duration,
    cache_ttl: Duration,
    cached: Mutex<Option<(Instant, String)>>,
}

impl BackendPool {
    /// Pool probing `backends` in the given order; results are cached for `cache_ttl`.
    pub fn new(
        backends: Vec<String>,
        probe_timeout: Duration,
        cache_ttl: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(probe_timeout).build()?;
        Ok(Self {
            backends,
            client,
            probe_timeout,
            cache_ttl,
            cached: Mutex::new(None),
        })
    }

    /// Configured backends, in probe order.
    pub fn backends(&self) -> &[String] {
        &self.backends
    }

    /// Deadline applied to one probe, reused when dialing the chosen backend.
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// First backend, in pool order, whose `/health` answers `200 OK`.
    pub async fn probe(&self) -> Option<String> {
        if let Some(addr) = self.cached_backend() {
            return Some(addr);
        }

        for addr in &self.backends {
            if self.is_healthy(addr).await {
                self.remember(addr);
                return Some(addr.clone());
            }
        }
        warn!(backends = self.backends.len(), "no healthy game server found");
        None
    }

    /// Drop a cached choice, e.g. after the backend failed mid-request.
    pub fn invalidate(&self) {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    async fn is_healthy(&self, addr: &str) -> bool {
        let url = format!("{addr}/health");
        let probe = self.client.get(&url).send();
        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(response)) if response.status() == StatusCode::OK => true,
            Ok(Ok(response)) => {
                warn!(backend = %addr, status = %response.status(), "game server unhealthy");
                false
            }
            Ok(Err(err)) => {
                warn!(backend = %addr, error = %err, "game server is down");
                false
            }
            Err(_) => {
                warn!(backend = %addr, "game server health probe timed out");
                false
            }
        }
    }

    fn cached_backend(&self) -> Option<String> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        let guard = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some((at, addr)) if at.elapsed() < self.cache_ttl => {
                debug!(backend = %addr, "reusing cached probe result");
                Some(addr.clone())
            }
            _ => None,
        }
    }

    fn remember(&self, addr: &str) {
        if self.cache_ttl.is_zero() {
            return;
        }
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((Instant::now(), addr.to_string()));
    }
}
