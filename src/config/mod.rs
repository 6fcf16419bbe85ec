//! Configuration for the ladder engine
//!
//! Configuration is loaded from environment variables with sensible defaults,
//! or from a TOML file, and validated before the service starts.

pub mod app;

pub use app::{
    AmqpSettings, AppConfig, MatchmakingSettings, PersistenceSettings, ServiceSettings,
    validate_config,
};
