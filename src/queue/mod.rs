//! Queue membership and wave scheduling
//!
//! `QueueRegistry` owns the canonical ordered set of waiting participants;
//! `Scheduler` fires the engine's matching waves on an epoch-aligned cadence.

pub mod registry;
pub mod scheduler;

pub use registry::QueueRegistry;
pub use scheduler::{next_epoch_tick, Scheduler};
