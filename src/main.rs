//! Scrambled Words binary entrypoint: runs either a game server or the front router.

use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use futures::{FutureExt, future::BoxFuture};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use scrambled_words::{
    config::{AppConfig, PersistenceKind, Role},
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        models::UserEntity,
        storage::StorageError,
    },
    proxy::ProxyState,
    routes,
    services::storage_supervisor::{self, SupervisorPolicy},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    match config.role {
        Role::Game => {
            let connect = store_connector(&config);
            let state = AppState::new(config);
            tokio::spawn(storage_supervisor::run(
                state.clone(),
                SupervisorPolicy::default(),
                connect,
            ));

            info!(%addr, "starting game server");
            serve(addr, build_router(routes::game_router(state)), shutdown_signal()).await
        }
        Role::Router => {
            let state = ProxyState::new(&config).context("building backend pool")?;
            info!(%addr, backends = ?state.pool().backends(), "starting router");

            let tunnels = state.clone();
            let shutdown = async move {
                shutdown_signal().await;
                tunnels.shutdown();
            };
            serve(addr, build_router(routes::proxy_router(state)), shutdown).await
        }
    }
}

async fn serve<F>(addr: SocketAddr, app: Router<()>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .context("serving axum")?;
    Ok(())
}

type Connector = Box<
    dyn FnMut() -> BoxFuture<'static, Result<Arc<dyn GameStore>, StorageError>> + Send + 'static,
>;

/// Build the closure the storage supervisor calls on every (re)connection attempt.
fn store_connector(config: &AppConfig) -> Connector {
    match config.persistence.kind {
        PersistenceKind::Memory => {
            let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::with_users(
                config
                    .seed_users
                    .iter()
                    .map(|username| UserEntity::new(Uuid::new_v4().simple().to_string(), username)),
            ));
            info!(users = config.seed_users.len(), "using in-memory storage");
            Box::new(move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(store) }.boxed()
            })
        }
        #[cfg(feature = "couch-store")]
        PersistenceKind::Couchdb => {
            use scrambled_words::dao::game_store::couchdb::{CouchConfig, CouchGameStore};

            let persistence = config.persistence.clone();
            Box::new(move || {
                let persistence = persistence.clone();
                async move {
                    let couch = CouchConfig::from_app_config(&persistence)?;
                    let store = CouchGameStore::connect(couch).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>)
                }
                .boxed()
            })
        }
        #[cfg(feature = "mongo-store")]
        PersistenceKind::Mongodb => {
            use scrambled_words::dao::game_store::mongodb::{MongoConfig, MongoGameStore};

            let persistence = config.persistence.clone();
            Box::new(move || {
                let persistence = persistence.clone();
                async move {
                    let mongo = MongoConfig::from_app_config(&persistence).await?;
                    let store = MongoGameStore::connect(mongo).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>)
                }
                .boxed()
            })
        }
        #[allow(unreachable_patterns)]
        kind => Box::new(move || {
            async move {
                Err::<Arc<dyn GameStore>, _>(StorageError::unavailable(
                    format!("{kind:?} storage support was not compiled in"),
                    std::io::Error::other("missing cargo feature"),
                ))
            }
            .boxed()
        }),
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(app: Router<()>) -> Router<()> {
    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
