//! Web server module.

mod error;
mod handlers;

pub use error::*;
pub use handlers::*;

use crate::config::ServerConfig;
use crate::db::{HistoryStore, HostRegistry};
use crate::scheduler::BatchRunner;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn HostRegistry>,
    pub history: Arc<dyn HistoryStore>,
    pub runner: Arc<BatchRunner>,
}

/// Build the router with all routes.
pub fn routes(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/health-check", get(handlers::handle_health_check))
        .route("/api/host-history/{*host}", get(handlers::handle_host_history))
        .route("/api/stats", get(handlers::handle_stats))
        .route("/api/hosts", get(handlers::handle_list_hosts))
        .route("/api/add-host", post(handlers::handle_add_host))
        .route("/api/remove-host", post(handlers::handle_remove_host))
        .route("/api/set-host-active", post(handlers::handle_set_host_active))
        .fallback(handlers::handle_not_found)
        .method_not_allowed_fallback(handlers::handle_method_not_allowed)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        .with_state(state)
}

/// Web server for hostwatch.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = routes(self.state.clone());

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
