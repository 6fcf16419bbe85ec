//! Dynamic tolerance window calculation
//!
//! Each wave, every queued participant gets an acceptable rating-difference
//! window derived from queue pressure and their accumulated wait cycles.
//! Pressure is recomputed per wave and windows are never cached across
//! waves. For a fixed pressure tier the window is non-decreasing in wait
//! cycles.

use crate::error::Result;
use crate::types::SnapshotEntry;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// (base, growth) pair selected by pressure tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureTier {
    /// Tolerance granted before any waiting
    pub base: u32,
    /// Additional tolerance per wave waited
    pub growth: u32,
}

/// Configuration for pressure and window calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Below this active population the pressure ratio is amplified so
    /// small queues still feel urgency
    pub low_population_threshold: usize,
    /// Above this active population the ratio is dampened so large queues
    /// don't over-expand
    pub high_population_threshold: usize,
    pub low_population_scale: f64,
    pub normal_population_scale: f64,
    pub high_population_scale: f64,
    /// Pressure at or above this selects the high tier
    pub high_pressure_cutoff: f64,
    /// Pressure at or above this (but below the high cutoff) selects the
    /// moderate tier
    pub moderate_pressure_cutoff: f64,
    pub high_pressure: PressureTier,
    pub moderate_pressure: PressureTier,
    pub low_pressure: PressureTier,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            low_population_threshold: 20,
            high_population_threshold: 100,
            low_population_scale: 2.0,
            normal_population_scale: 1.0,
            high_population_scale: 0.5,
            high_pressure_cutoff: 0.75,
            moderate_pressure_cutoff: 0.40,
            high_pressure: PressureTier {
                base: 200,
                growth: 100,
            },
            moderate_pressure: PressureTier {
                base: 120,
                growth: 60,
            },
            low_pressure: PressureTier {
                base: 80,
                growth: 40,
            },
        }
    }
}

impl WindowConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.low_population_threshold >= self.high_population_threshold {
            return Err(crate::error::LadderError::ConfigurationError {
                message: "low_population_threshold must be below high_population_threshold"
                    .to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.moderate_pressure_cutoff)
            || !(0.0..=1.0).contains(&self.high_pressure_cutoff)
            || self.moderate_pressure_cutoff >= self.high_pressure_cutoff
        {
            return Err(crate::error::LadderError::ConfigurationError {
                message: "pressure cutoffs must satisfy 0 <= moderate < high <= 1".to_string(),
            }
            .into());
        }
        for scale in [
            self.low_population_scale,
            self.normal_population_scale,
            self.high_population_scale,
        ] {
            if scale <= 0.0 {
                return Err(crate::error::LadderError::ConfigurationError {
                    message: "population scales must be positive".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Computes pressure and per-participant tolerance windows for one wave
#[derive(Debug, Clone)]
pub struct WindowCalculator {
    config: WindowConfig,
}

impl WindowCalculator {
    pub fn new(config: WindowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Pressure ratio in [0, 1]: how saturated the queue is relative to the
    /// recently-active population. Zero population with a non-empty queue is
    /// a capacity anomaly and clamps to full pressure rather than dividing
    /// by zero.
    pub fn pressure(&self, queue_size: usize, population: usize) -> f64 {
        if population == 0 {
            if queue_size == 0 {
                return 0.0;
            }
            warn!(
                "Capacity anomaly: {} queued with zero active population; clamping pressure",
                queue_size
            );
            return 1.0;
        }

        let scale = if population < self.config.low_population_threshold {
            self.config.low_population_scale
        } else if population < self.config.high_population_threshold {
            self.config.normal_population_scale
        } else {
            self.config.high_population_scale
        };

        (scale * queue_size as f64 / population as f64).clamp(0.0, 1.0)
    }

    /// Select the (base, growth) tier for a pressure value
    pub fn tier(&self, pressure: f64) -> PressureTier {
        if pressure >= self.config.high_pressure_cutoff {
            self.config.high_pressure
        } else if pressure >= self.config.moderate_pressure_cutoff {
            self.config.moderate_pressure
        } else {
            self.config.low_pressure
        }
    }

    /// Tolerance window for a tier and wait-cycle count
    pub fn tolerance(&self, tier: PressureTier, wait_cycles: u32) -> u32 {
        tier.base.saturating_add(tier.growth.saturating_mul(wait_cycles))
    }

    /// Per-participant window for the current wave
    pub fn window_for(&self, entry: &SnapshotEntry, queue_size: usize, population: usize) -> u32 {
        let tier = self.tier(self.pressure(queue_size, population));
        self.tolerance(tier, entry.wait_cycles)
    }
}

impl Default for WindowCalculator {
    fn default() -> Self {
        Self {
            config: WindowConfig::default(),
        }
    }
}
