//! Elo rating application for reported match outcomes
//!
//! Thin wrapper over the skillratings Elo implementation, mapping the
//! ladder's integer ratings and outcome enum onto the crate's types.

use crate::error::Result;
use crate::types::{MatchOutcome, Rating};
use serde::{Deserialize, Serialize};
use skillratings::elo::{elo, EloConfig, EloRating};
use skillratings::Outcomes;

/// Configuration for Elo rating updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EloSettings {
    /// K-factor: maximum rating movement per game
    pub k_factor: f64,
}

impl Default for EloSettings {
    fn default() -> Self {
        Self { k_factor: 32.0 }
    }
}

impl EloSettings {
    /// Slower rating movement for established ladders
    pub fn conservative() -> Self {
        Self { k_factor: 16.0 }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.k_factor <= 0.0 {
            return Err(crate::error::LadderError::ConfigurationError {
                message: "K-factor must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Elo calculator over integer ratings
#[derive(Debug, Clone)]
pub struct EloCalculator {
    settings: EloSettings,
}

impl EloCalculator {
    pub fn new(settings: EloSettings) -> Self {
        Self { settings }
    }

    /// Rate a finished pairing. Returns the new (side A, side B) ratings,
    /// rounded to integers.
    pub fn rate_pair(&self, rating_a: Rating, rating_b: Rating, outcome: MatchOutcome) -> (Rating, Rating) {
        let player_a = EloRating {
            rating: rating_a as f64,
        };
        let player_b = EloRating {
            rating: rating_b as f64,
        };
        let outcome = match outcome {
            MatchOutcome::SideAWin => Outcomes::WIN,
            MatchOutcome::SideBWin => Outcomes::LOSS,
            MatchOutcome::Draw => Outcomes::DRAW,
        };
        let config = EloConfig {
            k: self.settings.k_factor,
        };

        let (new_a, new_b) = elo(&player_a, &player_b, &outcome, &config);
        (
            new_a.rating.round() as Rating,
            new_b.rating.round() as Rating,
        )
    }
}

impl Default for EloCalculator {
    fn default() -> Self {
        Self::new(EloSettings::default())
    }
}
