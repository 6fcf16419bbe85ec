//! Ladder engine orchestration
//!
//! [`LadderEngine`] owns the wave pipeline and the match table, and is the
//! single boundary through which queue membership, ratings and match
//! lifecycle are mutated. Administrative tooling calls the same entry
//! points as the normal flow; there is no separate admin path mutating a
//! shadow structure.
//!
//! Queue-lock ownership: the engine places a match hold on both
//! participants when a match is committed, and exactly one private release
//! path clears those holds, invoked from every terminal transition. No
//! other subsystem touches holds.

use crate::config::AppConfig;
use crate::error::{LadderError, Result};
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::notify::EventPublisher;
use crate::queue::QueueRegistry;
use crate::store::{EloCalculator, EloSettings, RatingAdjustment, RatingRecord, RatingStore};
use crate::store::LeaderboardEntry;
use crate::types::{
    Discipline, Match, MatchAborted, MatchCreated, MatchId, MatchOutcome, MatchStatus,
    Participant, ParticipantId, QueueLeaveReason, QueueRemoved, QueueSnapshot, WaveCompleted,
};
use crate::utils::current_timestamp;
use crate::wave::{
    categorize, equalize, match_sides, MatchFactory, MatchFactoryConfig, MatcherConfig,
    WindowCalculator, WindowConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Callback invoked after every wave with the matches it created
pub type WaveCallback = Box<dyn Fn(&[Match]) + Send + Sync>;

/// Engine configuration, usually derived from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub matcher: MatcherConfig,
    pub window: WindowConfig,
    pub factory: MatchFactoryConfig,
    pub elo: EloSettings,
    /// How far back a participant counts as active for pressure calculation
    pub activity_window: Duration,
}

impl EngineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            matcher: MatcherConfig {
                wait_bonus: config.matchmaking.wait_bonus,
            },
            window: WindowConfig::default(),
            factory: MatchFactoryConfig {
                map_pool: config.matchmaking.map_pool.clone(),
                default_server: config.matchmaking.default_server.clone(),
            },
            elo: EloSettings::default(),
            activity_window: config.activity_window(),
        }
    }
}

/// Summary of one executed wave
#[derive(Debug, Clone)]
pub struct WaveReport {
    pub wave: u64,
    pub matches: Vec<Match>,
    pub left_queued: usize,
}

/// The matchmaking core
pub struct LadderEngine {
    store: Arc<RatingStore>,
    registry: QueueRegistry,
    publisher: Arc<dyn EventPublisher>,
    window: WindowCalculator,
    matcher_config: MatcherConfig,
    factory: MatchFactory,
    elo: EloCalculator,
    activity_window: Duration,
    matches: Mutex<HashMap<MatchId, Match>>,
    wave_callbacks: Mutex<Vec<WaveCallback>>,
    wave_counter: AtomicU64,
    metrics: Option<Arc<MetricsCollector>>,
}

impl LadderEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<RatingStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self> {
        config.matcher.validate()?;
        config.elo.validate()?;
        let window = WindowCalculator::new(config.window)?;
        let factory = MatchFactory::new(config.factory)?;

        Ok(Self {
            store,
            registry: QueueRegistry::new(),
            publisher,
            window,
            matcher_config: config.matcher,
            factory,
            elo: EloCalculator::new(config.elo),
            activity_window: config.activity_window,
            matches: Mutex::new(HashMap::new()),
            wave_callbacks: Mutex::new(Vec::new()),
            wave_counter: AtomicU64::new(0),
            metrics: None,
        })
    }

    /// Attach a metrics collector. Engine operations record into it from
    /// then on; without one they run unobserved.
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The rating store this engine mutates
    pub fn store(&self) -> &Arc<RatingStore> {
        &self.store
    }

    // --- queue boundary ---------------------------------------------------

    /// Add a participant to the queue. Returns false when already queued.
    pub fn enqueue(&self, participant: Participant) -> Result<bool> {
        if participant.id.is_empty() {
            return Err(LadderError::InvalidQueueRequest {
                reason: "participant id cannot be empty".to_string(),
            }
            .into());
        }
        if participant.capabilities.is_empty() {
            return Err(LadderError::InvalidQueueRequest {
                reason: format!("participant {} has no discipline capability", participant.id),
            }
            .into());
        }
        if self.store.is_held(&participant.id)? {
            return Err(LadderError::ParticipantBusy {
                participant_id: participant.id.clone(),
            }
            .into());
        }

        let id = participant.id.clone();
        let added = self.registry.add(participant)?;
        if added {
            self.store.enqueue_member(&id)?;
            self.store.touch(&id)?;
            if let Some(metrics) = &self.metrics {
                metrics.record_enqueue();
            }
            debug!(participant = %id, "Enqueued");
        } else {
            debug!(participant = %id, "Already queued, enqueue ignored");
        }
        Ok(added)
    }

    /// Remove a participant at their own request. Removing an identity that
    /// is not queued is an idempotent success.
    pub async fn dequeue(&self, participant_id: &ParticipantId) -> Result<bool> {
        self.remove_from_queue(participant_id, QueueLeaveReason::UserRequest)
            .await
    }

    /// Administrative removal; same code path as a user leave.
    pub async fn force_remove_from_queue(&self, participant_id: &ParticipantId) -> Result<bool> {
        self.remove_from_queue(participant_id, QueueLeaveReason::AdminOverride)
            .await
    }

    async fn remove_from_queue(
        &self,
        participant_id: &ParticipantId,
        reason: QueueLeaveReason,
    ) -> Result<bool> {
        match self.registry.remove(participant_id)? {
            Some(_) => {
                self.store.dequeue_member(participant_id)?;
                if let Some(metrics) = &self.metrics {
                    metrics.record_dequeue(reason);
                }
                self.publish_queue_removed(participant_id.clone(), reason)
                    .await;
                Ok(true)
            }
            None => {
                debug!(
                    participant = %participant_id,
                    "Not queued, removal treated as success"
                );
                Ok(false)
            }
        }
    }

    /// Immutable copy of the current queue for inspection
    pub fn snapshot_queue_state(&self) -> Result<QueueSnapshot> {
        self.registry.snapshot(&self.store)
    }

    pub fn queue_len(&self) -> Result<usize> {
        self.registry.len()
    }

    // --- rating boundary --------------------------------------------------

    pub fn get_rating(
        &self,
        participant_id: &ParticipantId,
        discipline: Discipline,
    ) -> Result<Option<RatingRecord>> {
        self.store.get(participant_id, discipline)
    }

    /// All rating records for an identity, in discipline order
    pub fn get_all_ratings(&self, participant_id: &ParticipantId) -> Result<Vec<RatingRecord>> {
        let mut by_discipline = self.store.get_all(participant_id)?;
        Ok(Discipline::ALL
            .into_iter()
            .filter_map(|discipline| by_discipline.remove(&discipline))
            .collect())
    }

    /// Administrative rating adjustment through the normal store path
    pub fn adjust_rating(
        &self,
        participant_id: &ParticipantId,
        discipline: Discipline,
        adjustment: RatingAdjustment,
    ) -> Result<RatingRecord> {
        info!(
            participant = %participant_id,
            %discipline,
            ?adjustment,
            "Administrative rating adjustment"
        );
        self.store.update(participant_id, discipline, adjustment)
    }

    pub fn leaderboard(&self, discipline: Discipline) -> Result<Vec<LeaderboardEntry>> {
        self.store.leaderboard(discipline)
    }

    // --- wave pipeline ----------------------------------------------------

    /// Register a callback invoked after every wave with its matches
    pub fn register_wave_callback(&self, callback: WaveCallback) -> Result<()> {
        self.lock_callbacks()?.push(callback);
        Ok(())
    }

    /// Execute one full wave: snapshot, categorize, equalize, window, match,
    /// commit. Invariant violations abort the wave before anything commits,
    /// leaving the queue unchanged for the next tick.
    pub async fn run_wave(&self) -> Result<WaveReport> {
        let timer = self.metrics.as_ref().map(|m| m.start_timer());
        match self.execute_wave().await {
            Ok(report) => {
                if let Some(metrics) = &self.metrics {
                    let duration = timer.map(MetricsTimer::stop).unwrap_or_default();
                    metrics.record_wave(report.matches.len(), report.left_queued, duration);
                }
                Ok(report)
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_wave_abort();
                }
                Err(e)
            }
        }
    }

    async fn execute_wave(&self) -> Result<WaveReport> {
        let wave = self.wave_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.registry.bump_wait_cycles()?;
        let snapshot = self.registry.snapshot(&self.store)?;
        let queue_size = snapshot.len();

        if snapshot.is_empty() {
            debug!(wave, "Queue empty, skipping wave");
            return Ok(WaveReport {
                wave,
                matches: Vec::new(),
                left_queued: 0,
            });
        }

        let population = self.store.active_population(self.activity_window)?;
        if let Some(metrics) = &self.metrics {
            metrics.set_pressure(self.window.pressure(queue_size, population));
        }
        debug!(wave, queue_size, population, "Starting wave");

        let categorized = categorize(&snapshot);
        let sides = equalize(categorized)?;
        let pairs = match_sides(&sides, &self.matcher_config, |entry| {
            self.window.window_for(entry, queue_size, population)
        })?;

        let mut matches = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            let match_record = self.factory.build_match(pair);
            self.commit_match(match_record.clone()).await?;
            matches.push(match_record);
        }

        let left_queued = self.registry.len()?;

        self.publish_wave_completed(wave, matches.len(), left_queued)
            .await;
        for callback in self.lock_callbacks()?.iter() {
            callback(&matches);
        }

        info!(
            wave,
            matches_created = matches.len(),
            left_queued,
            "Wave complete"
        );
        Ok(WaveReport {
            wave,
            matches,
            left_queued,
        })
    }

    /// Commit one match: hold both participants, take them out of the
    /// queue, record the match, then notify. In-memory mutations complete
    /// before any collaborator is called.
    async fn commit_match(&self, match_record: Match) -> Result<()> {
        let side_a = match_record.side_a.id.clone();
        let side_b = match_record.side_b.id.clone();

        self.store.hold_for_match(&side_a)?;
        self.store.hold_for_match(&side_b)?;
        for id in [&side_a, &side_b] {
            if self.registry.remove(id)?.is_none() {
                warn!(participant = %id, "Matched participant was not in the live queue");
            }
            self.store.dequeue_member(id)?;
            self.store.touch(id)?;
            if let Some(metrics) = &self.metrics {
                metrics.record_dequeue(QueueLeaveReason::Matched);
            }
        }

        self.lock_matches()?
            .insert(match_record.id, match_record.clone());
        self.store.persist_match(match_record.clone());

        for id in [side_a, side_b] {
            self.publish_queue_removed(id, QueueLeaveReason::Matched)
                .await;
        }
        let published = self
            .publisher
            .publish_match_created(MatchCreated {
                match_record: match_record.clone(),
                timestamp: current_timestamp(),
            })
            .await;
        self.record_publish("match_created", published.is_ok());
        if let Err(e) = published {
            warn!(match_id = %match_record.id, "Failed to publish MatchCreated: {}", e);
        }

        info!(
            match_id = %match_record.id,
            side_a = %match_record.side_a.id,
            side_b = %match_record.side_b.id,
            map = %match_record.map,
            "Match created"
        );
        Ok(())
    }

    // --- match lifecycle --------------------------------------------------

    pub fn get_match(&self, match_id: &MatchId) -> Result<Option<Match>> {
        Ok(self.lock_matches()?.get(match_id).cloned())
    }

    /// Mark a pending match as being played
    pub fn activate_match(&self, match_id: &MatchId) -> Result<()> {
        let mut matches = self.lock_matches()?;
        let record = matches
            .get_mut(match_id)
            .ok_or_else(|| LadderError::MatchNotFound {
                match_id: match_id.to_string(),
            })?;
        if record.status == MatchStatus::Pending {
            record.status = MatchStatus::Active;
        }
        Ok(())
    }

    /// Report a terminal outcome. Applies Elo to both sides and releases
    /// their queue locks. A second report on the same match is an
    /// idempotent success with no further side effects. Conflicted matches
    /// resolve through this same entry point.
    pub async fn complete_match(&self, match_id: &MatchId, outcome: MatchOutcome) -> Result<()> {
        let record = {
            let mut matches = self.lock_matches()?;
            let record =
                matches
                    .get_mut(match_id)
                    .ok_or_else(|| LadderError::MatchNotFound {
                        match_id: match_id.to_string(),
                    })?;
            if record.status.is_terminal() {
                debug!(match_id = %match_id, "Match already terminal, completion ignored");
                return Ok(());
            }
            record.status = MatchStatus::Completed;
            record.clone()
        };

        let (record_a, record_b) = self.store.record_result(
            (&record.side_a.id, record.side_a.discipline),
            (&record.side_b.id, record.side_b.discipline),
            outcome,
            &self.elo,
        )?;
        self.finalize_terminal(&record)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_match_completed(outcome);
        }

        info!(
            match_id = %match_id,
            ?outcome,
            rating_a = record_a.rating,
            rating_b = record_b.rating,
            "Match completed"
        );
        Ok(())
    }

    /// Resolve a conflicted match with an administratively decided outcome.
    /// Deliberately the same path as a normal completion.
    pub async fn resolve_conflict(&self, match_id: &MatchId, outcome: MatchOutcome) -> Result<()> {
        self.complete_match(match_id, outcome).await
    }

    /// Terminate a match without an outcome. Ratings are untouched; both
    /// participants' queue locks are released. Idempotent on repeat calls.
    pub async fn abort_match(&self, match_id: &MatchId) -> Result<()> {
        let record = {
            let mut matches = self.lock_matches()?;
            let record =
                matches
                    .get_mut(match_id)
                    .ok_or_else(|| LadderError::MatchNotFound {
                        match_id: match_id.to_string(),
                    })?;
            if record.status.is_terminal() {
                debug!(match_id = %match_id, "Match already terminal, abort ignored");
                return Ok(());
            }
            record.status = MatchStatus::Aborted;
            record.clone()
        };

        self.finalize_terminal(&record)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_match_aborted();
        }
        let published = self
            .publisher
            .publish_match_aborted(MatchAborted {
                match_id: record.id,
                participants: vec![record.side_a.id.clone(), record.side_b.id.clone()],
                timestamp: current_timestamp(),
            })
            .await;
        self.record_publish("match_aborted", published.is_ok());
        if let Err(e) = published {
            warn!(match_id = %match_id, "Failed to publish MatchAborted: {}", e);
        }

        info!(match_id = %match_id, "Match aborted");
        Ok(())
    }

    /// Flag irreconcilable reports. The match stays unresolved and both
    /// participants stay locked until an administrator resolves or aborts.
    pub fn flag_conflict(&self, match_id: &MatchId) -> Result<()> {
        let mut matches = self.lock_matches()?;
        let record = matches
            .get_mut(match_id)
            .ok_or_else(|| LadderError::MatchNotFound {
                match_id: match_id.to_string(),
            })?;
        if record.status.is_terminal() {
            debug!(match_id = %match_id, "Match already terminal, conflict flag ignored");
            return Ok(());
        }
        if record.status != MatchStatus::Conflicted {
            record.status = MatchStatus::Conflicted;
            if let Some(metrics) = &self.metrics {
                metrics.record_match_conflict();
            }
            warn!(match_id = %match_id, "Match flagged as conflicted");
        }
        Ok(())
    }

    /// The one place match holds are released. Every terminal transition
    /// funnels through here; a path that skips it leaves participants
    /// queue-locked forever.
    fn finalize_terminal(&self, record: &Match) -> Result<()> {
        for id in [&record.side_a.id, &record.side_b.id] {
            self.store.release_hold(id)?;
            self.store.touch(id)?;
        }
        self.store.persist_match(record.clone());
        Ok(())
    }

    // --- internals --------------------------------------------------------

    async fn publish_queue_removed(&self, participant_id: ParticipantId, reason: QueueLeaveReason) {
        let published = self
            .publisher
            .publish_queue_removed(QueueRemoved {
                participant_id: participant_id.clone(),
                reason,
                timestamp: current_timestamp(),
            })
            .await;
        self.record_publish("queue_removed", published.is_ok());
        if let Err(e) = published {
            warn!(participant = %participant_id, "Failed to publish QueueRemoved: {}", e);
        }
    }

    async fn publish_wave_completed(&self, wave: u64, matches_created: usize, left_queued: usize) {
        let published = self
            .publisher
            .publish_wave_completed(WaveCompleted {
                wave,
                matches_created,
                left_queued,
                timestamp: current_timestamp(),
            })
            .await;
        self.record_publish("wave_completed", published.is_ok());
        if let Err(e) = published {
            warn!(wave, "Failed to publish WaveCompleted: {}", e);
        }
    }

    fn record_publish(&self, event: &str, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_event_publish(event, success);
        }
    }

    fn lock_matches(&self) -> Result<std::sync::MutexGuard<'_, HashMap<MatchId, Match>>> {
        self.matches.lock().map_err(|_| {
            LadderError::InternalError {
                message: "Failed to acquire match table lock".to_string(),
            }
            .into()
        })
    }

    fn lock_callbacks(&self) -> Result<std::sync::MutexGuard<'_, Vec<WaveCallback>>> {
        self.wave_callbacks.lock().map_err(|_| {
            LadderError::InternalError {
                message: "Failed to acquire wave callback lock".to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MockEventPublisher;
    use crate::types::CapabilitySet;

    fn test_engine_config() -> EngineConfig {
        EngineConfig {
            matcher: MatcherConfig::default(),
            window: WindowConfig::default(),
            factory: MatchFactoryConfig {
                map_pool: vec!["Fighting Spirit".to_string()],
                default_server: "eu-central".to_string(),
            },
            elo: EloSettings::default(),
            activity_window: Duration::from_secs(1800),
        }
    }

    fn engine_with_mock() -> (Arc<LadderEngine>, Arc<MockEventPublisher>) {
        let publisher = Arc::new(MockEventPublisher::new());
        let (store, _rx) = RatingStore::new();
        let engine =
            LadderEngine::new(test_engine_config(), Arc::new(store), publisher.clone()).unwrap();
        (Arc::new(engine), publisher)
    }

    fn participant(id: &str, capabilities: CapabilitySet) -> Participant {
        Participant {
            id: id.to_string(),
            capabilities,
            excluded_maps: vec![],
            region: None,
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_dequeue() {
        let (engine, _) = engine_with_mock();
        let p = participant("a", CapabilitySet::only(Discipline::BroodWar));

        assert!(engine.enqueue(p.clone()).unwrap());
        assert!(!engine.enqueue(p).unwrap());
        assert_eq!(engine.queue_len().unwrap(), 1);

        assert!(engine.dequeue(&"a".to_string()).await.unwrap());
        // Second removal is an idempotent success
        assert!(!engine.dequeue(&"a".to_string()).await.unwrap());
        assert_eq!(engine.queue_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_empty_capabilities() {
        let (engine, _) = engine_with_mock();
        let p = participant(
            "a",
            CapabilitySet {
                brood_war: false,
                sc2: false,
            },
        );
        assert!(engine.enqueue(p).is_err());
    }

    #[tokio::test]
    async fn test_wave_matches_cross_discipline_pair() {
        let (engine, publisher) = engine_with_mock();
        engine
            .enqueue(participant("bw", CapabilitySet::only(Discipline::BroodWar)))
            .unwrap();
        engine
            .enqueue(participant("sc", CapabilitySet::only(Discipline::Sc2)))
            .unwrap();

        let report = engine.run_wave().await.unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.left_queued, 0);
        assert_eq!(engine.queue_len().unwrap(), 0);

        // Both are locked until the match resolves
        assert!(engine.store().is_held(&"bw".to_string()).unwrap());
        assert!(engine
            .enqueue(participant("bw", CapabilitySet::only(Discipline::BroodWar)))
            .is_err());

        let names = publisher.published_event_names();
        assert!(names.contains(&"MatchCreated"));
        assert!(names.contains(&"WaveCompleted"));
    }

    #[tokio::test]
    async fn test_single_dual_participant_never_self_matches() {
        let (engine, _) = engine_with_mock();
        engine
            .enqueue(participant("solo", CapabilitySet::both()))
            .unwrap();

        let report = engine.run_wave().await.unwrap();
        assert!(report.matches.is_empty());
        assert_eq!(report.left_queued, 1);
        assert!(engine.store().is_queued(&"solo".to_string()).unwrap());
    }

    #[tokio::test]
    async fn test_unmatched_participants_accrue_wait_cycles() {
        let (engine, _) = engine_with_mock();
        engine
            .enqueue(participant("solo", CapabilitySet::only(Discipline::BroodWar)))
            .unwrap();

        engine.run_wave().await.unwrap();
        engine.run_wave().await.unwrap();

        let snapshot = engine.snapshot_queue_state().unwrap();
        assert_eq!(snapshot.entries[0].wait_cycles, 2);
    }

    #[tokio::test]
    async fn test_attached_collector_observes_engine_activity() {
        let publisher = Arc::new(MockEventPublisher::new());
        let (store, _rx) = RatingStore::new();
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let engine = Arc::new(
            LadderEngine::new(test_engine_config(), Arc::new(store), publisher)
                .unwrap()
                .with_metrics(metrics.clone()),
        );

        engine
            .enqueue(participant("bw", CapabilitySet::only(Discipline::BroodWar)))
            .unwrap();
        engine
            .enqueue(participant("sc", CapabilitySet::only(Discipline::Sc2)))
            .unwrap();
        assert_eq!(metrics.queue().enqueues_total.get(), 2);
        assert_eq!(metrics.queue().queue_depth.get(), 2);

        let report = engine.run_wave().await.unwrap();
        let match_id = report.matches[0].id;
        assert_eq!(metrics.wave().waves_total.get(), 1);
        assert_eq!(metrics.wave().matches_created_total.get(), 1);
        assert_eq!(metrics.queue().queue_depth.get(), 0);
        assert_eq!(
            metrics
                .performance()
                .wave_duration_seconds
                .get_sample_count(),
            1
        );
        assert_eq!(
            metrics
                .service()
                .event_publishes_total
                .with_label_values(&["wave_completed", "success"])
                .get(),
            1
        );

        engine
            .complete_match(&match_id, MatchOutcome::SideAWin)
            .await
            .unwrap();
        assert_eq!(
            metrics
                .wave()
                .matches_completed_total
                .with_label_values(&["side_a_win"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_first_wave_runs_at_one_accrued_cycle() {
        let (engine, _) = engine_with_mock();
        // High pressure tier grants (base 200, growth 100); a 250 gap only
        // fits if the first wave already counts one waited cycle.
        engine
            .adjust_rating(
                &"bw".to_string(),
                Discipline::BroodWar,
                RatingAdjustment::Set(1500),
            )
            .unwrap();
        engine
            .adjust_rating(&"sc".to_string(), Discipline::Sc2, RatingAdjustment::Set(1750))
            .unwrap();
        engine
            .enqueue(participant("bw", CapabilitySet::only(Discipline::BroodWar)))
            .unwrap();
        engine
            .enqueue(participant("sc", CapabilitySet::only(Discipline::Sc2)))
            .unwrap();

        let report = engine.run_wave().await.unwrap();
        assert_eq!(report.matches.len(), 1);
    }

    #[tokio::test]
    async fn test_get_all_ratings_lists_each_discipline() {
        let (engine, _) = engine_with_mock();
        engine
            .adjust_rating(
                &"dual".to_string(),
                Discipline::Sc2,
                RatingAdjustment::Set(1900),
            )
            .unwrap();
        engine
            .adjust_rating(
                &"dual".to_string(),
                Discipline::BroodWar,
                RatingAdjustment::Set(1700),
            )
            .unwrap();

        let records = engine.get_all_ratings(&"dual".to_string()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].discipline, Discipline::BroodWar);
        assert_eq!(records[0].rating, 1700);
        assert_eq!(records[1].discipline, Discipline::Sc2);
        assert_eq!(records[1].rating, 1900);
    }

    #[tokio::test]
    async fn test_complete_match_applies_elo_and_releases_holds() {
        let (engine, _) = engine_with_mock();
        engine
            .enqueue(participant("bw", CapabilitySet::only(Discipline::BroodWar)))
            .unwrap();
        engine
            .enqueue(participant("sc", CapabilitySet::only(Discipline::Sc2)))
            .unwrap();
        let report = engine.run_wave().await.unwrap();
        let match_id = report.matches[0].id;

        engine
            .complete_match(&match_id, MatchOutcome::SideAWin)
            .await
            .unwrap();

        let winner = report.matches[0].side_a.clone();
        let record = engine
            .get_rating(&winner.id, winner.discipline)
            .unwrap()
            .unwrap();
        assert!(record.rating > winner.rating_at_start);
        assert_eq!(record.wins + record.losses, 1);

        // Holds released; re-queueing is allowed again
        assert!(!engine.store().is_held(&winner.id).unwrap());
        assert!(engine
            .enqueue(participant(&winner.id, CapabilitySet::only(winner.discipline)))
            .unwrap());
    }

    #[tokio::test]
    async fn test_terminal_operations_are_idempotent() {
        let (engine, publisher) = engine_with_mock();
        engine
            .enqueue(participant("bw", CapabilitySet::only(Discipline::BroodWar)))
            .unwrap();
        engine
            .enqueue(participant("sc", CapabilitySet::only(Discipline::Sc2)))
            .unwrap();
        let report = engine.run_wave().await.unwrap();
        let match_id = report.matches[0].id;

        engine.abort_match(&match_id).await.unwrap();
        publisher.clear_events();
        engine.abort_match(&match_id).await.unwrap();

        // Second abort produced no further events
        assert!(publisher.published_events().is_empty());
        // A completion after abort is also a no-op
        engine
            .complete_match(&match_id, MatchOutcome::Draw)
            .await
            .unwrap();
        let record = engine.get_rating(&"bw".to_string(), Discipline::BroodWar).unwrap();
        assert!(record.map_or(true, |r| r.games_played == 0));
    }

    #[tokio::test]
    async fn test_conflicted_match_keeps_holds_until_resolved() {
        let (engine, _) = engine_with_mock();
        engine
            .enqueue(participant("bw", CapabilitySet::only(Discipline::BroodWar)))
            .unwrap();
        engine
            .enqueue(participant("sc", CapabilitySet::only(Discipline::Sc2)))
            .unwrap();
        let report = engine.run_wave().await.unwrap();
        let match_id = report.matches[0].id;

        engine.flag_conflict(&match_id).unwrap();
        assert!(engine.store().is_held(&"bw".to_string()).unwrap());

        engine
            .resolve_conflict(&match_id, MatchOutcome::SideBWin)
            .await
            .unwrap();
        assert!(!engine.store().is_held(&"bw".to_string()).unwrap());
        assert_eq!(
            engine.get_match(&match_id).unwrap().unwrap().status,
            MatchStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_unknown_match_is_an_error() {
        let (engine, _) = engine_with_mock();
        let missing = crate::utils::generate_match_id();
        assert!(engine
            .complete_match(&missing, MatchOutcome::Draw)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_wave_callbacks_receive_matches() {
        let (engine, _) = engine_with_mock();
        let seen = Arc::new(std::sync::Mutex::new(0usize));
        let seen_clone = seen.clone();
        engine
            .register_wave_callback(Box::new(move |matches| {
                *seen_clone.lock().unwrap() += matches.len();
            }))
            .unwrap();

        engine
            .enqueue(participant("bw", CapabilitySet::only(Discipline::BroodWar)))
            .unwrap();
        engine
            .enqueue(participant("sc", CapabilitySet::only(Discipline::Sc2)))
            .unwrap();
        engine.run_wave().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_admin_adjustment_visible_to_snapshot() {
        let (engine, _) = engine_with_mock();
        engine
            .adjust_rating(
                &"a".to_string(),
                Discipline::BroodWar,
                RatingAdjustment::Set(1900),
            )
            .unwrap();
        engine
            .enqueue(participant("a", CapabilitySet::only(Discipline::BroodWar)))
            .unwrap();

        let snapshot = engine.snapshot_queue_state().unwrap();
        assert_eq!(snapshot.entries[0].rating_brood_war, 1900);
    }
}
