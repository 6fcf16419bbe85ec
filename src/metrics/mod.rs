//! Metrics and monitoring for the ladder engine
//!
//! Prometheus metrics collection plus the HTTP server exposing health and
//! metrics endpoints.

pub mod collector;
pub mod health;

pub use collector::{
    MetricsCollector, MetricsTimer, PerformanceMetrics, QueueMetrics, ServiceMetrics, WaveMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
