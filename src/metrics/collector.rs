//! Metrics collection using Prometheus

use crate::types::{MatchOutcome, QueueLeaveReason};
use anyhow::Result;
use prometheus::{
    Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the ladder engine
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    service_metrics: ServiceMetrics,
    queue_metrics: QueueMetrics,
    wave_metrics: WaveMetrics,
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Outbound event publishes by event type and status
    pub event_publishes_total: IntCounterVec,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Participants currently waiting in the queue
    pub queue_depth: IntGauge,

    /// Total queue joins accepted
    pub enqueues_total: IntCounter,

    /// Total queue removals by reason
    pub dequeues_total: IntCounterVec,

    /// Current queue pressure ratio
    pub pressure: Gauge,
}

/// Wave and match metrics
#[derive(Clone)]
pub struct WaveMetrics {
    /// Total waves executed
    pub waves_total: IntCounter,

    /// Waves aborted by an invariant violation
    pub wave_aborts_total: IntCounter,

    /// Total matches created
    pub matches_created_total: IntCounter,

    /// Matches reaching a terminal state, by outcome
    pub matches_completed_total: IntCounterVec,

    /// Matches aborted without an outcome
    pub matches_aborted_total: IntCounter,

    /// Matches flagged conflicted
    pub match_conflicts_total: IntCounter,

    /// Participants left queued per wave
    pub wave_leftovers: Histogram,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Full wave pipeline duration
    pub wave_duration_seconds: Histogram,

    /// Durable write jobs processed, by status
    pub write_jobs_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let wave_metrics = WaveMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            wave_metrics,
            performance_metrics,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn wave(&self) -> &WaveMetrics {
        &self.wave_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a completed wave
    pub fn record_wave(&self, matches_created: usize, left_queued: usize, duration: Duration) {
        self.wave_metrics.waves_total.inc();
        self.wave_metrics
            .matches_created_total
            .inc_by(matches_created as u64);
        self.wave_metrics.wave_leftovers.observe(left_queued as f64);
        self.queue_metrics.queue_depth.set(left_queued as i64);
        self.performance_metrics
            .wave_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record a wave aborted before committing anything
    pub fn record_wave_abort(&self) {
        self.wave_metrics.waves_total.inc();
        self.wave_metrics.wave_aborts_total.inc();
    }

    pub fn record_enqueue(&self) {
        self.queue_metrics.enqueues_total.inc();
        self.queue_metrics.queue_depth.inc();
    }

    pub fn record_dequeue(&self, reason: QueueLeaveReason) {
        let reason_str = match reason {
            QueueLeaveReason::Matched => "matched",
            QueueLeaveReason::UserRequest => "user_request",
            QueueLeaveReason::AdminOverride => "admin_override",
        };
        self.queue_metrics
            .dequeues_total
            .with_label_values(&[reason_str])
            .inc();
        self.queue_metrics.queue_depth.dec();
    }

    pub fn record_match_completed(&self, outcome: MatchOutcome) {
        let outcome_str = match outcome {
            MatchOutcome::SideAWin => "side_a_win",
            MatchOutcome::SideBWin => "side_b_win",
            MatchOutcome::Draw => "draw",
        };
        self.wave_metrics
            .matches_completed_total
            .with_label_values(&[outcome_str])
            .inc();
    }

    pub fn record_match_aborted(&self) {
        self.wave_metrics.matches_aborted_total.inc();
    }

    pub fn record_match_conflict(&self) {
        self.wave_metrics.match_conflicts_total.inc();
    }

    /// Record an outbound event publish attempt
    pub fn record_event_publish(&self, event: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.service_metrics
            .event_publishes_total
            .with_label_values(&[event, status])
            .inc();
    }

    /// Record a durable write job result
    pub fn record_write_job(&self, success: bool) {
        let status = if success { "success" } else { "dropped" };
        self.performance_metrics
            .write_jobs_total
            .with_label_values(&[status])
            .inc();
    }

    pub fn set_pressure(&self, pressure: f64) {
        self.queue_metrics.pressure.set(pressure);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status (0=unhealthy, 1=degraded, 2=healthy)
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("ladder_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "ladder_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let event_publishes_total = IntCounterVec::new(
            Opts::new(
                "ladder_event_publishes_total",
                "Outbound event publish attempts",
            ),
            &["event", "status"],
        )?;
        registry.register(Box::new(event_publishes_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            event_publishes_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queue_depth = IntGauge::new(
            "ladder_queue_depth",
            "Participants currently waiting in the queue",
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        let enqueues_total =
            IntCounter::new("ladder_enqueues_total", "Total queue joins accepted")?;
        registry.register(Box::new(enqueues_total.clone()))?;

        let dequeues_total = IntCounterVec::new(
            Opts::new("ladder_dequeues_total", "Total queue removals"),
            &["reason"],
        )?;
        registry.register(Box::new(dequeues_total.clone()))?;

        let pressure = Gauge::new("ladder_queue_pressure", "Current queue pressure ratio")?;
        registry.register(Box::new(pressure.clone()))?;

        Ok(Self {
            queue_depth,
            enqueues_total,
            dequeues_total,
            pressure,
        })
    }
}

impl WaveMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let waves_total = IntCounter::new("ladder_waves_total", "Total waves executed")?;
        registry.register(Box::new(waves_total.clone()))?;

        let wave_aborts_total = IntCounter::new(
            "ladder_wave_aborts_total",
            "Waves aborted by an invariant violation",
        )?;
        registry.register(Box::new(wave_aborts_total.clone()))?;

        let matches_created_total =
            IntCounter::new("ladder_matches_created_total", "Total matches created")?;
        registry.register(Box::new(matches_created_total.clone()))?;

        let matches_completed_total = IntCounterVec::new(
            Opts::new(
                "ladder_matches_completed_total",
                "Matches completed with an outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(matches_completed_total.clone()))?;

        let matches_aborted_total = IntCounter::new(
            "ladder_matches_aborted_total",
            "Matches aborted without an outcome",
        )?;
        registry.register(Box::new(matches_aborted_total.clone()))?;

        let match_conflicts_total = IntCounter::new(
            "ladder_match_conflicts_total",
            "Matches flagged as conflicted",
        )?;
        registry.register(Box::new(match_conflicts_total.clone()))?;

        let wave_leftovers = Histogram::with_opts(HistogramOpts::new(
            "ladder_wave_leftovers",
            "Participants left queued after each wave",
        ))?;
        registry.register(Box::new(wave_leftovers.clone()))?;

        Ok(Self {
            waves_total,
            wave_aborts_total,
            matches_created_total,
            matches_completed_total,
            matches_aborted_total,
            match_conflicts_total,
            wave_leftovers,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let wave_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "ladder_wave_duration_seconds",
            "Full wave pipeline duration",
        ))?;
        registry.register(Box::new(wave_duration_seconds.clone()))?;

        let write_jobs_total = IntCounterVec::new(
            Opts::new("ladder_write_jobs_total", "Durable write jobs processed"),
            &["status"],
        )?;
        registry.register(Box::new(write_jobs_total.clone()))?;

        Ok(Self {
            wave_duration_seconds,
            write_jobs_total,
        })
    }
}
