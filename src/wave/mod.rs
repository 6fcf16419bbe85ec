//! The per-wave matching pipeline
//!
//! One wave runs categorize → equalize → window → match → materialize over
//! an immutable queue snapshot. All stages are synchronous, bounded by queue
//! size, and free of side effects until the factory stage commits results.

pub mod categorize;
pub mod equalize;
pub mod factory;
pub mod matcher;
pub mod window;

pub use categorize::{categorize, CategorizedQueue};
pub use equalize::{equalize, EqualizedSides};
pub use factory::{MatchFactory, MatchFactoryConfig};
pub use matcher::{match_sides, validate_committed_pairs, CandidatePair, MatcherConfig};
pub use window::{PressureTier, WindowCalculator, WindowConfig};
