//! Error types for the ladder engine
//!
//! This module defines all error types using anyhow for consistent error
//! handling throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific ladder scenarios
#[derive(Debug, thiserror::Error)]
pub enum LadderError {
    /// A hard correctness invariant was violated; fatal to the current wave
    /// only, never silently swallowed.
    #[error("invariant violation: {message}")]
    InvariantViolation { message: String },

    /// Pressure calculation received zero or negative population/queue inputs
    #[error("capacity anomaly: {message}")]
    CapacityAnomaly { message: String },

    /// An operation targeted an identity no longer queued; callers treat this
    /// as an idempotent success.
    #[error("stale queue state: {participant_id} is not queued")]
    StaleQueueState { participant_id: String },

    /// A participant is locked into an unresolved match and cannot re-queue
    #[error("participant busy: {participant_id} has an unresolved match")]
    ParticipantBusy { participant_id: String },

    #[error("persistence job failed: {message}")]
    PersistenceJobFailure { message: String },

    #[error("match not found: {match_id}")]
    MatchNotFound { match_id: String },

    #[error("invalid queue request: {reason}")]
    InvalidQueueRequest { reason: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("internal engine error: {message}")]
    InternalError { message: String },
}
