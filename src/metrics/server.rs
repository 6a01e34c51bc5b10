//! HTTP exporter for the pipeline metrics.

use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

/// Errors from the metrics exporter.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind metrics listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("metrics server stopped: {0}")]
    Server(String),
}

/// Where the exporter listens.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Listen address.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Listens on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// State shared between the pipeline loop and the HTTP handlers.
pub struct MetricsState {
    registry: MetricsRegistry,
    healthy: bool,
    blocks: u64,
}

impl MetricsState {
    /// Pushes a snapshot into the registry.
    ///
    /// `violating` marks the source degraded until a later snapshot clears it.
    pub fn update(&mut self, snapshot: &MetricsSnapshot, violating: bool) {
        self.registry.update(snapshot);
        self.healthy = !violating;
        self.blocks = snapshot.blocks;
    }

    /// False while the latest run-count report breaks a threshold.
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }
}

/// Serves `/metrics` in Prometheus text format and `/health`.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: Arc<RwLock<MetricsState>>,
}

type SharedState = Arc<RwLock<MetricsState>>;

impl MetricsServer {
    /// Wraps `registry` for serving.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        let state = MetricsState {
            registry,
            healthy: true,
            blocks: 0,
        };
        Self {
            config,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Handle for pushing snapshots while the server runs.
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state())
    }

    /// Serves until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Metrics exporter listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}

async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match state.read().await.registry.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics encoding failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                e.to_string(),
            )
        }
    }
}

async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    let status = if state.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let label = if state.healthy { "ok" } else { "degraded" };
    (status, format!("{} blocks={}\n", label, state.blocks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port() {
        assert_eq!(MetricsServerConfig::default().bind_addr.port(), 9090);
        assert_eq!(MetricsServerConfig::with_port(8080).bind_addr.port(), 8080);
    }

    #[tokio::test]
    async fn test_state_tracks_health() {
        let server = MetricsServer::new(
            MetricsServerConfig::default(),
            MetricsRegistry::new().unwrap(),
        );
        let state = server.state();
        assert!(state.read().await.is_healthy());

        let snapshot = MetricsSnapshot {
            blocks: 4,
            ..Default::default()
        };
        state.write().await.update(&snapshot, true);
        assert!(!state.read().await.is_healthy());
        assert_eq!(state.read().await.blocks, 4);

        state.write().await.update(&snapshot, false);
        assert!(state.read().await.is_healthy());
    }
}
