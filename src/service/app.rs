//! Main application state and service coordination
//!
//! `AppState` assembles the production service: rating store plus writer,
//! ladder engine, wave scheduler, event publisher and the health/metrics
//! server, and sequences startup and graceful shutdown. Shutdown signals
//! the scheduler first so no new wave starts, then drains the write queue
//! within a bounded deadline before the process is allowed to exit.

use crate::config::{validate_config, AppConfig};
use crate::engine::{EngineConfig, LadderEngine};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::notify::connection::AmqpConfig;
use crate::notify::publisher::PublisherConfig;
use crate::notify::{AmqpConnection, AmqpEventPublisher, EventPublisher, NoopEventPublisher};
use crate::queue::Scheduler;
use crate::store::{NullPersistenceBackend, PersistenceBackend, RatingStore, Writer, WriterConfig};
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    engine: Arc<LadderEngine>,
    metrics: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,
    writer: Option<Writer>,
    writer_handle: Option<JoinHandle<()>>,
    writer_shutdown: watch::Sender<bool>,
    scheduler_shutdown: watch::Sender<bool>,
    background_tasks: Vec<JoinHandle<()>>,
    started_at: Instant,
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize with the default (null) persistence backend
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::with_backend(config, Arc::new(NullPersistenceBackend)).await
    }

    /// Initialize the application with all dependencies
    pub async fn with_backend(
        config: AppConfig,
        backend: Arc<dyn PersistenceBackend>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing ladder engine service");
        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics = Arc::new(
            MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            })?,
        );

        let publisher = Self::initialize_publisher(&config).await?;

        let (store, write_rx) = RatingStore::new();
        let store = Arc::new(store);

        let (writer_shutdown, writer_shutdown_rx) = watch::channel(false);
        let writer = Writer::new(
            write_rx,
            backend,
            WriterConfig {
                max_retry_attempts: config.persistence.max_retry_attempts,
                retry_delay: Duration::from_millis(config.persistence.retry_delay_ms),
            },
            writer_shutdown_rx,
        )
        .with_metrics(metrics.clone());

        let engine = Arc::new(
            LadderEngine::new(EngineConfig::from_app_config(&config), store, publisher)
                .map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to build engine: {}", e),
                })?
                .with_metrics(metrics.clone()),
        );

        let health_server = Arc::new(
            HealthServer::new(
                HealthServerConfig {
                    port: config.service.health_port,
                    host: "0.0.0.0".to_string(),
                },
                metrics.clone(),
            )
            .with_engine(engine.clone()),
        );

        let (scheduler_shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            engine,
            metrics,
            health_server,
            writer: Some(writer),
            writer_handle: None,
            writer_shutdown,
            scheduler_shutdown,
            background_tasks: Vec::new(),
            started_at: Instant::now(),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    async fn initialize_publisher(
        config: &AppConfig,
    ) -> Result<Arc<dyn EventPublisher>, ServiceError> {
        if !config.amqp.enabled {
            info!("AMQP disabled; events will be logged and dropped");
            return Ok(Arc::new(NoopEventPublisher));
        }

        info!("Connecting to AMQP broker: {}", config.amqp.url);
        let amqp_config = AmqpConfig::from_url(
            &config.amqp.url,
            config.amqp.max_retry_attempts,
            config.amqp.retry_delay_ms,
        )
        .map_err(|e| ServiceError::Configuration {
            message: format!("Failed to parse AMQP URL: {}", e),
        })?;

        let connection =
            AmqpConnection::new(amqp_config)
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("Failed to connect to AMQP: {}", e),
                })?;
        let channel = connection
            .open_channel()
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to open channel: {}", e),
            })?;

        let publisher = AmqpEventPublisher::new(
            channel,
            config.amqp.exchange_name.clone(),
            PublisherConfig {
                max_retries: config.amqp.max_retry_attempts,
                retry_delay_ms: config.amqp.retry_delay_ms,
                enable_deduplication: true,
            },
        )
        .await
        .map_err(|e| ServiceError::AmqpConnection {
            message: format!("Failed to create publisher: {}", e),
        })?;

        Ok(Arc::new(publisher))
    }

    /// Start all background services
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting ladder engine service");
        *self.is_running.write().await = true;

        // Writer first: the store can already be enqueuing jobs
        let writer = self
            .writer
            .take()
            .ok_or_else(|| ServiceError::Initialization {
                message: "Writer already started".to_string(),
            })?;
        self.writer_handle = Some(writer.spawn());

        let health_server = self.health_server.clone();
        self.background_tasks.push(tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Health server failed: {}", e);
            }
        }));

        let scheduler = Scheduler::new(
            self.engine.clone(),
            self.config.wave_interval(),
            self.scheduler_shutdown.subscribe(),
        );
        self.background_tasks.push(scheduler.spawn());

        self.background_tasks.push(self.spawn_uptime_task());

        info!(
            "Ladder engine service started (wave interval {:?}, health port {})",
            self.config.wave_interval(),
            self.config.service.health_port
        );
        Ok(())
    }

    fn spawn_uptime_task(&self) -> JoinHandle<()> {
        let metrics = self.metrics.clone();
        let engine = self.engine.clone();
        let started_at = self.started_at;
        let mut shutdown = self.scheduler_shutdown.subscribe();

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(10));
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        metrics.update_uptime(started_at.elapsed());
                        if let Ok(depth) = engine.queue_len() {
                            metrics.queue().queue_depth.set(depth as i64);
                        }
                    }
                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Perform graceful shutdown: stop scheduling, stop serving, then drain
    /// the write queue within the configured deadline.
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown");
        *self.is_running.write().await = false;

        if self.scheduler_shutdown.send(true).is_err() {
            warn!("Scheduler already stopped");
        }
        if let Err(e) = self.health_server.stop().await {
            warn!("Failed to stop health server: {}", e);
        }

        // Drain the write queue; losing queued jobs on exit is a data-loss
        // bug, so an expired deadline is logged loudly.
        if self.writer_shutdown.send(true).is_err() {
            warn!("Writer already stopped");
        }
        if let Some(handle) = self.writer_handle.take() {
            let deadline = self.config.drain_deadline();
            match tokio::time::timeout(deadline, handle).await {
                Ok(Ok(())) => info!("Write queue drained"),
                Ok(Err(e)) => error!("Writer task panicked: {}", e),
                Err(_) => error!(
                    "Write queue drain exceeded {:?} deadline; durable state may lag",
                    deadline
                ),
            }
        }

        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        info!("Ladder engine service shutdown completed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// The engine boundary, for request handling and admin tooling
    pub fn engine(&self) -> Arc<LadderEngine> {
        self.engine.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }
}
