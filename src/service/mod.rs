//! Service lifecycle coordination
//!
//! Wires the engine, writer, scheduler and monitoring together and owns
//! startup and graceful shutdown.

pub mod app;

pub use app::{AppState, ServiceError};
