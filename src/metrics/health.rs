//! Health check endpoints and Prometheus metrics server
//!
//! HTTP endpoints for liveness, readiness, metrics scraping and a
//! human-readable stats page, served with Axum.

use crate::engine::LadderEngine;
use crate::metrics::collector::MetricsCollector;
use crate::types::Discipline;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub engine: Option<Arc<LadderEngine>>,
}

/// Health server that provides HTTP endpoints for monitoring
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                engine: None,
            },
            shutdown_tx,
        }
    }

    /// Attach the engine so health checks can inspect live state
    pub fn with_engine(mut self, engine: Arc<LadderEngine>) -> Self {
        self.state.engine = Some(engine);
        self
    }

    /// Start serving; returns when shut down
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr).await?;
        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .with_state(self.state.clone())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping health server...");
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to health server: {}", e);
        }
        Ok(())
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "ladder-engine",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/alive", "/metrics", "/stats"]
    }))
}

/// Lightweight health check. Healthy means the engine is wired up and its
/// queue is readable.
async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");
    let healthy = matches!(&state.engine, Some(engine) if engine.queue_len().is_ok());
    state
        .metrics_collector
        .update_health_status(if healthy { 2 } else { 0 });
    match &state.engine {
        Some(engine) if engine.queue_len().is_ok() => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "ladder-engine",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Some(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "ladder-engine",
                "error": "queue registry is unreadable"
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "ladder-engine",
                "error": "Service not initialized"
            })),
        ),
    }
}

async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    match &state.engine {
        Some(_) => (StatusCode::OK, "Alive"),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Prometheus metrics endpoint
async fn metrics_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    let registry = state.metrics_collector.registry();
    let metric_families = registry.gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_output) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", encoder.format_type())
            .body(metrics_output)
            .unwrap(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body("Failed to encode metrics".to_string())
                .unwrap()
        }
    }
}

/// Human-readable service statistics
async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Stats endpoint requested");
    match &state.engine {
        Some(engine) => {
            let queue_depth = engine.queue_len().unwrap_or(0);
            let leaderboard_sizes: Vec<_> = Discipline::ALL
                .iter()
                .map(|d| {
                    json!({
                        "discipline": d.to_string(),
                        "rated_participants": engine.leaderboard(*d).map(|l| l.len()).unwrap_or(0)
                    })
                })
                .collect();

            (
                StatusCode::OK,
                Json(json!({
                    "service": {
                        "name": "ladder-engine",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "queue": { "depth": queue_depth },
                    "ladders": leaderboard_sizes,
                    "timestamp": chrono::Utc::now()
                })),
            )
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "Service not initialized",
                "timestamp": chrono::Utc::now()
            })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_server_config_default() {
        let config = HealthServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[tokio::test]
    async fn test_metrics_endpoint_encodes_registry() {
        let collector = Arc::new(MetricsCollector::new().unwrap());
        collector.record_enqueue();
        let state = HealthServerState {
            metrics_collector: collector,
            engine: None,
        };

        let response = metrics_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_unavailable_without_engine() {
        let collector = Arc::new(MetricsCollector::new().unwrap());
        collector.update_health_status(2);
        let state = HealthServerState {
            metrics_collector: collector.clone(),
            engine: None,
        };
        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        // The probe also drives the exported gauge
        assert_eq!(collector.service().health_status.get(), 0);
    }
}
