use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{error, info};
use tokio_util::sync::CancellationToken;

use sentinel::{
    config::ScanConfig,
    db::Database,
    live::LiveState,
    retention,
    scanner::{ScanPipeline, ScannerController},
    server::{self, AppState},
    store::EventStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Sentinel starting up...");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sentinel.json"));
    let config = ScanConfig::load(&config_path)?;

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data directory {}", config.data_dir.display())
    })?;

    let db = Database::new(config.db_path.clone())?;
    let store = EventStore::new(db.clone(), config.data_dir.clone());
    let live = LiveState::new(config.g_force_history_len);
    let scanner = ScannerController::new(
        config.clone(),
        store,
        live.clone(),
        Arc::new(ScanPipeline::simulated),
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(retention::retention_loop(
        db.clone(),
        config.data_dir.clone(),
        config.retention.clone(),
        Duration::from_secs(config.retention_interval_hours * 3600),
        scanner.clone(),
        shutdown.clone(),
    ));

    let app = server::router(AppState::new(live, db, scanner.clone()));
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("server error")?;

    shutdown.cancel();
    scanner.stop().await?;
    info!("Sentinel shut down");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        return;
    }
    info!("shutdown signal received");
}
