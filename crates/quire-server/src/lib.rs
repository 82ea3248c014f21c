//! Quire relay server: live-edit fan-out plus document persistence.

pub mod config;
pub mod error;
pub mod relay;
pub mod repo;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::relay::RelayHub;
use crate::repo::DocumentRepo;

pub use quire_common::telemetry::{self, TelemetryConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<RelayHub>,
    pub repo: Arc<DocumentRepo>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            hub: Arc::new(RelayHub::new(config.relay.channel_capacity)),
            repo: Arc::new(DocumentRepo::with_seeds(&config.storage.seed)),
        }
    }
}

/// Build the axum router with all endpoints
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/markdown", get(routes::ws_markdown))
        .route(
            "/api/documents/{id}",
            get(routes::get_document).post(routes::save_document),
        )
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::render_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until it fails.
pub async fn run(state: AppState, addr: SocketAddr) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind { addr, source: e })?;
    serve(listener, state).await
}

/// Serve on an already bound listener.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!("Starting HTTP server on {}", addr);
    }
    axum::serve(listener, router(state))
        .await
        .map_err(|e| ServerError::Serve { source: e })
}
