//! Epoch-aligned wave scheduling
//!
//! Waves fire on wall-clock epoch boundaries of the configured interval
//! (`next = ceil(now / interval) * interval`) rather than "interval since
//! last tick", so scheduling drift never accumulates across long uptimes.

use crate::engine::LadderEngine;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Next epoch-aligned tick strictly after `now`
pub fn next_epoch_tick(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let interval_ms = interval.as_millis().max(1) as i64;
    let now_ms = now.timestamp_millis();
    let next_ms = (now_ms.div_euclid(interval_ms) + 1) * interval_ms;
    Utc.timestamp_millis_opt(next_ms)
        .single()
        .unwrap_or(now + chrono::Duration::milliseconds(interval_ms))
}

/// Fires matching waves on the engine at a fixed, epoch-aligned cadence
pub struct Scheduler {
    engine: Arc<LadderEngine>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        engine: Arc<LadderEngine>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            interval,
            shutdown,
        }
    }

    /// Spawn the scheduler task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(
            "Wave scheduler started with interval {:?} (epoch-aligned)",
            self.interval
        );
        loop {
            let now = Utc::now();
            let next = next_epoch_tick(now, self.interval);
            let sleep_for = (next - now)
                .to_std()
                .unwrap_or_else(|_| Duration::from_millis(0));

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    // A wave aborted by an invariant violation leaves the
                    // queue untouched for retry on the next tick.
                    if let Err(e) = self.engine.run_wave().await {
                        error!("Wave aborted: {}", e);
                    }
                }
                result = self.shutdown.changed() => {
                    if result.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    warn!("Scheduler observed spurious shutdown change");
                }
            }
        }
        info!("Wave scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_tick_is_aligned_and_in_future() {
        let interval = Duration::from_secs(45);
        let now = Utc.timestamp_millis_opt(1_000_123).single().unwrap();

        let next = next_epoch_tick(now, interval);
        assert!(next > now);
        assert_eq!(next.timestamp_millis() % 45_000, 0);
    }

    #[test]
    fn test_tick_on_exact_boundary_advances_one_interval() {
        let interval = Duration::from_secs(45);
        let boundary = Utc.timestamp_millis_opt(45_000 * 100).single().unwrap();

        let next = next_epoch_tick(boundary, interval);
        assert_eq!(next.timestamp_millis(), 45_000 * 101);
    }

    #[test]
    fn test_no_drift_accumulation() {
        // Ticks computed from slightly-late wakeups stay on the same grid.
        let interval = Duration::from_secs(45);
        let mut now = Utc.timestamp_millis_opt(0).single().unwrap();

        for _ in 0..10 {
            let next = next_epoch_tick(now, interval);
            assert_eq!(next.timestamp_millis() % 45_000, 0);
            // Simulate waking 120ms late
            now = next + chrono::Duration::milliseconds(120);
        }
        assert_eq!(now.timestamp_millis(), 45_000 * 10 + 120);
    }
}
