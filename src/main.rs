//! hostwatch - host availability monitor
//!
//! Probes a set of HTTP(S) endpoints, classifies their health, keeps the
//! history in SQLite and serves uptime statistics over a JSON API.

mod config;
mod db;
mod probe;
mod scheduler;
mod web;

use config::ServerConfig;
use db::{HistoryStore, HostRegistry, Store};
use probe::Prober;
use scheduler::{BatchRunner, RetentionManager, Scheduler};
use web::{AppState, Server};

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("hostwatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting hostwatch on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    let registry: Arc<dyn HostRegistry> = store.clone();
    let history: Arc<dyn HistoryStore> = store;

    let prober = Prober::new(cfg.probe_timeout)?;
    tracing::info!("Probe timeout {:?}", prober.timeout());
    let runner = Arc::new(BatchRunner::new(registry.clone(), history.clone(), prober));

    // Background tasks
    let retention = RetentionManager::new(history.clone(), cfg.retention_hours);
    let retention_handle = retention.start();

    let scheduler = Scheduler::new(runner.clone(), cfg.check_interval, cfg.retry_interval);
    let scheduler_handle = if cfg.continuous {
        Some(scheduler.start())
    } else {
        tracing::info!("Continuous monitoring disabled; probes run on demand only");
        None
    };

    // Start web server
    let state = AppState {
        registry,
        history,
        runner,
    };
    let server = Server::new(cfg, state);
    let served = server.start(shutdown_signal()).await;

    scheduler.stop();
    retention.stop();
    if let Some(handle) = scheduler_handle {
        let _ = handle.await;
    }
    let _ = retention_handle.await;
    tracing::info!("Shutdown complete");

    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
