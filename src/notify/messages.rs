//! Event message definitions and serialization

use crate::error::{LadderError, Result};
use crate::types::LadderEvent;
use serde_json;

/// Default exchange for outbound ladder events
pub const LADDER_EVENTS_EXCHANGE: &str = "ladder.events";

/// Routing keys for events
pub const MATCH_CREATED_ROUTING_KEY: &str = "match.created";
pub const MATCH_ABORTED_ROUTING_KEY: &str = "match.aborted";
pub const QUEUE_REMOVED_ROUTING_KEY: &str = "queue.removed";
pub const WAVE_COMPLETED_ROUTING_KEY: &str = "wave.completed";

/// Routing key for an outbound event
pub fn routing_key_for(event: &LadderEvent) -> &'static str {
    match event {
        LadderEvent::MatchCreated(_) => MATCH_CREATED_ROUTING_KEY,
        LadderEvent::MatchAborted(_) => MATCH_ABORTED_ROUTING_KEY,
        LadderEvent::QueueRemoved(_) => QUEUE_REMOVED_ROUTING_KEY,
        LadderEvent::WaveCompleted(_) => WAVE_COMPLETED_ROUTING_KEY,
    }
}

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            LadderError::InternalError {
                message: format!("Failed to serialize event envelope: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            LadderError::InternalError {
                message: format!("Failed to deserialize event envelope: {}", e),
            }
            .into()
        })
    }
}
