//! Asynchronous durable persistence via an ordered write queue
//!
//! Mutations to the in-memory store enqueue `WriteJob`s which a single
//! background `Writer` task drains into the durable store. User-facing
//! operations never wait on storage latency; the durable store is eventually
//! consistent with memory. Jobs are consumed strictly in enqueue order, which
//! subsumes the per-key ordering guarantee.

use crate::error::{LadderError, Result};
use crate::metrics::MetricsCollector;
use crate::types::{Match, ParticipantId};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use super::rating::RatingRecord;

/// A queued intent to mutate durable storage
#[derive(Debug, Clone)]
pub enum WriteJob {
    UpsertRating(RatingRecord),
    InsertMatch(Match),
    RemoveQueueMembership { participant_id: ParticipantId },
}

impl WriteJob {
    /// Logical key the job mutates, for logging
    pub fn key(&self) -> String {
        match self {
            WriteJob::UpsertRating(record) => {
                format!("rating:{}:{}", record.participant_id, record.discipline)
            }
            WriteJob::InsertMatch(m) => format!("match:{}", m.id),
            WriteJob::RemoveQueueMembership { participant_id } => {
                format!("queue:{}", participant_id)
            }
        }
    }
}

/// Trait for the durable storage boundary consuming write jobs
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Apply a single write job; an error triggers the writer's retry loop
    async fn apply(&self, job: &WriteJob) -> Result<()>;
}

/// Backend that acknowledges every job without storing anything.
///
/// Used when the engine runs without a durable store attached; the in-memory
/// state remains authoritative either way.
#[derive(Debug, Default)]
pub struct NullPersistenceBackend;

#[async_trait]
impl PersistenceBackend for NullPersistenceBackend {
    async fn apply(&self, job: &WriteJob) -> Result<()> {
        debug!("Discarding write job {}", job.key());
        Ok(())
    }
}

/// Mock backend recording applied jobs, with optional scripted failures
#[derive(Debug, Default)]
pub struct MockPersistenceBackend {
    applied: Mutex<Vec<WriteJob>>,
    failures_remaining: Mutex<u32>,
}

impl MockPersistenceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` apply calls fail
    pub fn fail_next(&self, count: u32) {
        if let Ok(mut failures) = self.failures_remaining.lock() {
            *failures = count;
        }
    }

    /// All successfully applied jobs, in order
    pub fn applied_jobs(&self) -> Vec<WriteJob> {
        self.applied
            .lock()
            .map(|jobs| jobs.clone())
            .unwrap_or_default()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.lock().map(|jobs| jobs.len()).unwrap_or(0)
    }
}

#[async_trait]
impl PersistenceBackend for MockPersistenceBackend {
    async fn apply(&self, job: &WriteJob) -> Result<()> {
        {
            let mut failures =
                self.failures_remaining
                    .lock()
                    .map_err(|_| LadderError::InternalError {
                        message: "Failed to acquire failures lock".to_string(),
                    })?;
            if *failures > 0 {
                *failures -= 1;
                return Err(LadderError::PersistenceJobFailure {
                    message: format!("scripted failure for {}", job.key()),
                }
                .into());
            }
        }

        self.applied
            .lock()
            .map_err(|_| LadderError::InternalError {
                message: "Failed to acquire applied jobs lock".to_string(),
            })?
            .push(job.clone());
        Ok(())
    }
}

/// Configuration for the background writer
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub max_retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 5,
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// Background consumer draining the write queue into durable storage
pub struct Writer {
    rx: mpsc::UnboundedReceiver<WriteJob>,
    backend: std::sync::Arc<dyn PersistenceBackend>,
    config: WriterConfig,
    shutdown: watch::Receiver<bool>,
    metrics: Option<std::sync::Arc<MetricsCollector>>,
}

impl Writer {
    pub fn new(
        rx: mpsc::UnboundedReceiver<WriteJob>,
        backend: std::sync::Arc<dyn PersistenceBackend>,
        config: WriterConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            rx,
            backend,
            config,
            shutdown,
            metrics: None,
        }
    }

    /// Attach a metrics collector recording per-job outcomes
    pub fn with_metrics(mut self, metrics: std::sync::Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn the writer task. The task runs until shutdown is signalled and
    /// the queue is drained, or until all senders are dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        debug!("Write queue consumer started");
        loop {
            tokio::select! {
                job = self.rx.recv() => {
                    match job {
                        Some(job) => self.process(job).await,
                        None => break,
                    }
                }
                result = self.shutdown.changed() => {
                    if result.is_err() || *self.shutdown.borrow() {
                        self.drain().await;
                        break;
                    }
                }
            }
        }
        debug!("Write queue consumer stopped");
    }

    /// Process remaining queued jobs before exiting. Abrupt termination with
    /// jobs still queued is a data-loss bug, so shutdown waits for this.
    async fn drain(&mut self) {
        let mut drained = 0usize;
        while let Ok(job) = self.rx.try_recv() {
            self.process(job).await;
            drained += 1;
        }
        if drained > 0 {
            debug!("Drained {} write jobs during shutdown", drained);
        }
    }

    /// Apply one job with bounded retries. The in-memory store stays
    /// authoritative, so a job that exhausts its retries is logged loudly and
    /// dropped rather than rolled back.
    async fn process(&self, job: WriteJob) {
        let mut attempt = 0u32;
        loop {
            match self.backend.apply(&job).await {
                Ok(()) => {
                    debug!("Persisted write job {}", job.key());
                    if let Some(metrics) = &self.metrics {
                        metrics.record_write_job(true);
                    }
                    return;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.config.max_retry_attempts {
                        error!(
                            "Write job {} failed after {} attempts, dropping: {}",
                            job.key(),
                            self.config.max_retry_attempts,
                            e
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.record_write_job(false);
                        }
                        return;
                    }
                    warn!(
                        "Write job {} attempt {} failed: {}. Retrying in {:?}",
                        job.key(),
                        attempt,
                        e,
                        self.config.retry_delay
                    );
                    sleep(self.config.retry_delay).await;
                }
            }
        }
    }
}
