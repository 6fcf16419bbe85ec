//! Authoritative in-memory rating/queue store and its durable write path
//!
//! `RatingStore` is the single in-memory source of truth for ratings and
//! queue membership; every mutation becomes visible to readers first and is
//! then persisted asynchronously through the write queue.

pub mod elo;
pub mod rating;
pub mod write_queue;

pub use elo::{EloCalculator, EloSettings};
pub use rating::{LeaderboardEntry, RatingAdjustment, RatingRecord, RatingStore};
pub use write_queue::{
    MockPersistenceBackend, NullPersistenceBackend, PersistenceBackend, WriteJob, Writer,
    WriterConfig,
};
