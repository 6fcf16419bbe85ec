//! Event publisher implementations
//!
//! [`AmqpEventPublisher`] publishes to a topic exchange with retry and
//! correlation-id deduplication. [`NoopEventPublisher`] backs deployments
//! with AMQP disabled. [`MockEventPublisher`] records events for tests.

use crate::error::{LadderError, Result};
use crate::notify::messages::{routing_key_for, MessageEnvelope};
use crate::types::{LadderEvent, MatchAborted, MatchCreated, QueueRemoved, WaveCompleted};
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Trait for publishing ladder events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_match_created(&self, event: MatchCreated) -> Result<()>;

    async fn publish_match_aborted(&self, event: MatchAborted) -> Result<()>;

    async fn publish_queue_removed(&self, event: QueueRemoved) -> Result<()>;

    async fn publish_wave_completed(&self, event: WaveCompleted) -> Result<()>;
}

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_deduplication: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            enable_deduplication: true,
        }
    }
}

/// AMQP-based event publisher
pub struct AmqpEventPublisher {
    channel: Channel,
    exchange: String,
    config: PublisherConfig,
    published_messages: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl AmqpEventPublisher {
    /// Create a publisher and declare its exchange
    pub async fn new(channel: Channel, exchange: String, config: PublisherConfig) -> Result<Self> {
        let publisher = Self {
            channel,
            exchange,
            config,
            published_messages: std::sync::Mutex::new(std::collections::HashSet::new()),
        };
        publisher.setup_exchange().await?;
        Ok(publisher)
    }

    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.exchange, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            LadderError::AmqpConnectionFailed {
                message: format!("Failed to declare events exchange: {}", e),
            }
        })?;
        info!("Declared AMQP exchange {}", self.exchange);
        Ok(())
    }

    /// Publish an envelope with retry and deduplication
    async fn publish_envelope(&self, envelope: &MessageEnvelope<LadderEvent>) -> Result<()> {
        if self.config.enable_deduplication {
            let published_messages =
                self.published_messages
                    .lock()
                    .map_err(|_| LadderError::InternalError {
                        message: "Failed to acquire published messages lock".to_string(),
                    })?;
            if published_messages.contains(&envelope.correlation_id) {
                debug!(
                    "Message {} already published, skipping",
                    envelope.correlation_id
                );
                return Ok(());
            }
        }

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(_) => {
                    if self.config.enable_deduplication {
                        let mut published_messages =
                            self.published_messages.lock().map_err(|_| {
                                LadderError::InternalError {
                                    message: "Failed to acquire published messages lock"
                                        .to_string(),
                                }
                            })?;
                        published_messages.insert(envelope.correlation_id.clone());
                    }
                    debug!(
                        "Published message {} to exchange {}",
                        envelope.correlation_id, self.exchange
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish message {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );
                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    async fn try_publish(&self, envelope: &MessageEnvelope<LadderEvent>) -> Result<()> {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.exchange, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| LadderError::AmqpConnectionFailed {
                message: format!("Failed to publish message: {}", e),
            })?;
        Ok(())
    }

    async fn publish_event(&self, event: LadderEvent) -> Result<()> {
        let routing_key = routing_key_for(&event).to_string();
        let envelope = MessageEnvelope::new(event, routing_key);
        self.publish_envelope(&envelope).await
    }

    /// Number of cached correlation ids, for monitoring
    pub fn cached_message_count(&self) -> usize {
        self.published_messages
            .lock()
            .map(|cache| cache.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish_match_created(&self, event: MatchCreated) -> Result<()> {
        self.publish_event(LadderEvent::MatchCreated(event)).await
    }

    async fn publish_match_aborted(&self, event: MatchAborted) -> Result<()> {
        self.publish_event(LadderEvent::MatchAborted(event)).await
    }

    async fn publish_queue_removed(&self, event: QueueRemoved) -> Result<()> {
        self.publish_event(LadderEvent::QueueRemoved(event)).await
    }

    async fn publish_wave_completed(&self, event: WaveCompleted) -> Result<()> {
        self.publish_event(LadderEvent::WaveCompleted(event)).await
    }
}

/// Publisher used when AMQP is disabled; events are logged and dropped
#[derive(Debug, Default)]
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish_match_created(&self, event: MatchCreated) -> Result<()> {
        debug!(match_id = %event.match_record.id, "Event publishing disabled, dropping MatchCreated");
        Ok(())
    }

    async fn publish_match_aborted(&self, event: MatchAborted) -> Result<()> {
        debug!(match_id = %event.match_id, "Event publishing disabled, dropping MatchAborted");
        Ok(())
    }

    async fn publish_queue_removed(&self, event: QueueRemoved) -> Result<()> {
        debug!(participant = %event.participant_id, "Event publishing disabled, dropping QueueRemoved");
        Ok(())
    }

    async fn publish_wave_completed(&self, event: WaveCompleted) -> Result<()> {
        debug!(wave = event.wave, "Event publishing disabled, dropping WaveCompleted");
        Ok(())
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<LadderEvent>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All published events, in publish order
    pub fn published_events(&self) -> Vec<LadderEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Published event type names, for quick assertions
    pub fn published_event_names(&self) -> Vec<&'static str> {
        self.published_events()
            .iter()
            .map(|event| match event {
                LadderEvent::MatchCreated(_) => "MatchCreated",
                LadderEvent::MatchAborted(_) => "MatchAborted",
                LadderEvent::QueueRemoved(_) => "QueueRemoved",
                LadderEvent::WaveCompleted(_) => "WaveCompleted",
            })
            .collect()
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }

    fn record(&self, event: LadderEvent) {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_match_created(&self, event: MatchCreated) -> Result<()> {
        self.record(LadderEvent::MatchCreated(event));
        Ok(())
    }

    async fn publish_match_aborted(&self, event: MatchAborted) -> Result<()> {
        self.record(LadderEvent::MatchAborted(event));
        Ok(())
    }

    async fn publish_queue_removed(&self, event: QueueRemoved) -> Result<()> {
        self.record(LadderEvent::QueueRemoved(event));
        Ok(())
    }

    async fn publish_wave_completed(&self, event: WaveCompleted) -> Result<()> {
        self.record(LadderEvent::WaveCompleted(event));
        Ok(())
    }
}
