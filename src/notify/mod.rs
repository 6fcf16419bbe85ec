//! Outbound event notification
//!
//! The engine reports match lifecycle and queue membership changes through
//! the [`EventPublisher`] trait. The AMQP implementation publishes JSON
//! envelopes to a topic exchange; a no-op implementation logs and drops
//! events when AMQP is disabled.

pub mod connection;
pub mod messages;
pub mod publisher;

pub use connection::AmqpConnection;
pub use messages::*;
pub use publisher::{AmqpEventPublisher, EventPublisher, MockEventPublisher, NoopEventPublisher};
