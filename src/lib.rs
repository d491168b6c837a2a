pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod realtime;
pub mod seed;
pub mod store;

use std::sync::Arc;

use tokio::net::TcpListener;

pub use api::routes::create_router;
pub use api::AppState;
pub use model::*;
pub use store::{MemoryStore, PostgresStore, Store};

use crate::api::auth::TokenVerifier;
use crate::config::{AppConfig, StoreBackend};
use crate::realtime::NotificationHub;

/// Info for everything, warn for sqlx. `RUST_LOG` still overrides both.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("sqlx", log::LevelFilter::Warn)
        .parse_default_env()
        .try_init();
}

/// Builds the shared state for a store using the auth and realtime settings.
pub fn build_state<S: Store>(store: Arc<S>, config: &AppConfig) -> AppState<S> {
    AppState::new(
        store,
        TokenVerifier::new(&config.auth),
        NotificationHub::new(config.realtime.channel_capacity),
    )
}

pub async fn run_server() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{} backend={:?}",
        config.server.host,
        config.server.port,
        config.database.backend
    );

    match config.database.backend {
        StoreBackend::Postgres => {
            let database_url = config.database_url()?;
            let store =
                PostgresStore::new(&database_url, config.database.max_connections.unwrap_or(20))
                    .await?;
            log::info!("Running database migrations...");
            store.migrate().await?;
            serve(Arc::new(store), &config).await
        }
        StoreBackend::Memory => {
            log::warn!("Using the in-memory store; data is lost on shutdown");
            serve(Arc::new(MemoryStore::new()), &config).await
        }
    }
}

async fn serve<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("Loading seed data...");
        seed::load_seed_data(&*store).await?;
    }

    let app = create_router(build_state(store, config));

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Pipeline server listening on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
