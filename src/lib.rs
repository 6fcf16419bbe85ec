//! Ladder Engine - wave-based matchmaking for a two-discipline ladder
//!
//! This crate implements the competitive ladder core: an authoritative
//! in-memory rating store with an asynchronous durable write path, a wave
//! scheduler that periodically pairs queued participants across the two
//! disciplines, and AMQP event publishing for downstream consumers.

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod queue;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;
pub mod wave;

// Re-export commonly used types and traits
pub use error::{LadderError, Result};
pub use types::*;

// Re-export key components
pub use engine::{EngineConfig, LadderEngine, WaveReport};
pub use notify::publisher::EventPublisher;
pub use store::{RatingStore, Writer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
