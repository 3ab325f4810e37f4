//! Front tier of the deployment: picks a live game backend, forwards REST calls to it and
//! keeps client websockets tunnelled across backend restarts.

/// REST forwarding.
pub mod forward;
/// Backend health probing.
pub mod pool;
/// Websocket tunnelling.
pub mod tunnel;

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::{AppConfig, TunnelPolicy};

use self::pool::BackendPool;

/// Handle to [`ProxyState`] shared by handlers and tunnels.
pub type SharedProxyState = Arc<ProxyState>;

/// State shared by every request handled in the router role.
pub struct ProxyState {
    pool: BackendPool,
    client: reqwest::Client,
    tunnel: TunnelPolicy,
    shutdown: watch::Sender<bool>,
}

impl ProxyState {
    /// Build the backend pool and the forwarding client from `config`.
    pub fn new(config: &AppConfig) -> Result<SharedProxyState, reqwest::Error> {
        let (shutdown, _rx) = watch::channel(false);
        Ok(Arc::new(Self {
            pool: BackendPool::new(
                config.backend_addrs.clone(),
                config.probe_timeout,
                config.probe_cache_ttl,
            )?,
            client: reqwest::Client::builder()
                .timeout(config.forward_timeout)
                .build()?,
            tunnel: config.tunnel,
            shutdown,
        }))
    }

    /// Backends in probe order.
    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    /// Client used to forward REST calls.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Reconnect behaviour applied to each new tunnel.
    pub fn tunnel_policy(&self) -> TunnelPolicy {
        self.tunnel
    }

    /// Ask every open tunnel to close its client connection.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Flips to `true` once [`ProxyState::shutdown`] was called.
    pub fn shutdown_watcher(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
