use emis_alert::config::{AppConfig, StoreKind};
use emis_alert::db::{self, DocumentStore, MemoryStore, PgStore};
use emis_alert::{notify, App};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting EMIS Alert Service v{}...", env!("CARGO_PKG_VERSION"));

    // Init store
    let store: Arc<dyn DocumentStore> = match config.store {
        StoreKind::Postgres => {
            let pool = db::init_pool(&config.database_url).await?;
            info!("Connected to database");
            Arc::new(PgStore::new(pool))
        }
        StoreKind::Memory => {
            warn!("Using in-memory store, data will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let notifier = notify::from_config(&config)?;
    let app = App::new(&config, store, notifier).await?;

    if config.seed_on_start {
        app.seed().await?;
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Listening on port {} under {}", config.port, app.prefix());

    axum::serve(listener, app.router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
