//! The authoritative in-memory rating store
//!
//! Single source of truth for rating records, queue membership, match holds
//! and activity timestamps. Every mutating operation performs its
//! read-modify-write as one atomic step under the table's lock, becomes
//! visible to readers immediately, and only then enqueues the corresponding
//! durable write job. Derived read caches (the per-discipline leaderboards)
//! are invalidated on mutation and rebuilt lazily on the next read.

use crate::error::{LadderError, Result};
use crate::types::{
    DEFAULT_RATING, Discipline, MatchOutcome, ParticipantId, Rating,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::elo::EloCalculator;
use super::write_queue::WriteJob;

/// Rating record for one (participant, discipline) pair.
///
/// Exactly one record exists per pair; records are created on first use and
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingRecord {
    pub participant_id: ParticipantId,
    pub discipline: Discipline,
    pub rating: Rating,
    pub games_played: u64,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub last_played: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl RatingRecord {
    pub fn new(participant_id: ParticipantId, discipline: Discipline, rating: Rating) -> Self {
        let now = Utc::now();
        Self {
            participant_id,
            discipline,
            rating,
            games_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            last_played: None,
            created_at: now,
            last_updated: now,
        }
    }
}

/// How an administrative rating adjustment is applied
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum RatingAdjustment {
    /// Overwrite the rating with an absolute value
    Set(Rating),
    /// Add a signed delta to the current rating
    Delta(i32),
}

/// One row of the lazily rebuilt leaderboard view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub participant_id: ParticipantId,
    pub rating: Rating,
    pub games_played: u64,
}

/// The authoritative in-memory store
pub struct RatingStore {
    ratings: Mutex<HashMap<(ParticipantId, Discipline), RatingRecord>>,
    /// Mirrored queue-membership view, kept in lockstep with the
    /// QueueRegistry through the engine's joined mutation path
    queue_members: Mutex<HashSet<ParticipantId>>,
    /// Participants locked into an unresolved match; cleared only through
    /// the engine's single terminal-path release
    match_holds: Mutex<HashSet<ParticipantId>>,
    /// Last-active timestamps feeding the pressure calculation
    activity: Mutex<HashMap<ParticipantId, DateTime<Utc>>>,
    /// Derived leaderboard cache; `None` means stale
    leaderboards: Mutex<Option<HashMap<Discipline, Vec<LeaderboardEntry>>>>,
    write_tx: mpsc::UnboundedSender<WriteJob>,
}

impl RatingStore {
    /// Create a store together with the receiver end of its write queue
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WriteJob>) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        (
            Self {
                ratings: Mutex::new(HashMap::new()),
                queue_members: Mutex::new(HashSet::new()),
                match_holds: Mutex::new(HashSet::new()),
                activity: Mutex::new(HashMap::new()),
                leaderboards: Mutex::new(None),
                write_tx,
            },
            write_rx,
        )
    }

    /// Get the rating record for a (participant, discipline) pair
    pub fn get(
        &self,
        participant_id: &ParticipantId,
        discipline: Discipline,
    ) -> Result<Option<RatingRecord>> {
        let ratings = self.lock_ratings()?;
        Ok(ratings
            .get(&(participant_id.clone(), discipline))
            .cloned())
    }

    /// Get all rating records for a participant, keyed by discipline
    pub fn get_all(
        &self,
        participant_id: &ParticipantId,
    ) -> Result<HashMap<Discipline, RatingRecord>> {
        let ratings = self.lock_ratings()?;
        let mut result = HashMap::new();
        for discipline in Discipline::ALL {
            if let Some(record) = ratings.get(&(participant_id.clone(), discipline)) {
                result.insert(discipline, record.clone());
            }
        }
        Ok(result)
    }

    /// Current rating, or the default for participants without a record yet.
    /// Pure read: it does not create a record.
    pub fn rating_or_default(
        &self,
        participant_id: &ParticipantId,
        discipline: Discipline,
    ) -> Result<Rating> {
        Ok(self
            .get(participant_id, discipline)?
            .map(|r| r.rating)
            .unwrap_or(DEFAULT_RATING))
    }

    /// Apply a rating adjustment. A missing record is created with the
    /// default rating and then adjusted; creation and update share this one
    /// code path so a created record is always part of the queryable set.
    ///
    /// The read-modify-write-reassign and the write-job enqueue happen under
    /// one ratings lock acquisition, so jobs for a given key reach the write
    /// queue in the order their mutations were applied. Only cache
    /// invalidation runs outside the lock.
    pub fn update(
        &self,
        participant_id: &ParticipantId,
        discipline: Discipline,
        adjustment: RatingAdjustment,
    ) -> Result<RatingRecord> {
        let updated = {
            let mut ratings = self.lock_ratings()?;
            let record = ratings
                .entry((participant_id.clone(), discipline))
                .or_insert_with(|| {
                    RatingRecord::new(participant_id.clone(), discipline, DEFAULT_RATING)
                });

            record.rating = match adjustment {
                RatingAdjustment::Set(value) => value,
                RatingAdjustment::Delta(delta) => record.rating.saturating_add(delta),
            };
            record.last_updated = Utc::now();
            let updated = record.clone();
            self.enqueue_write(WriteJob::UpsertRating(updated.clone()));
            updated
        };

        self.invalidate_leaderboards()?;
        Ok(updated)
    }

    /// Record a terminal match result for both participants: Elo deltas,
    /// game counters and last-played timestamps.
    ///
    /// The whole fetch-increment-store sequence for both records runs under
    /// one lock acquisition so concurrent completions cannot lose updates.
    pub fn record_result(
        &self,
        side_a: (&ParticipantId, Discipline),
        side_b: (&ParticipantId, Discipline),
        outcome: MatchOutcome,
        elo: &EloCalculator,
    ) -> Result<(RatingRecord, RatingRecord)> {
        let now = Utc::now();
        let (record_a, record_b) = {
            let mut ratings = self.lock_ratings()?;

            let rating_a = ratings
                .get(&(side_a.0.clone(), side_a.1))
                .map(|r| r.rating)
                .unwrap_or(DEFAULT_RATING);
            let rating_b = ratings
                .get(&(side_b.0.clone(), side_b.1))
                .map(|r| r.rating)
                .unwrap_or(DEFAULT_RATING);

            let (new_a, new_b) = elo.rate_pair(rating_a, rating_b, outcome);

            let record_a = {
                let record = ratings
                    .entry((side_a.0.clone(), side_a.1))
                    .or_insert_with(|| {
                        RatingRecord::new(side_a.0.clone(), side_a.1, DEFAULT_RATING)
                    });
                record.rating = new_a;
                record.games_played += 1;
                match outcome {
                    MatchOutcome::SideAWin => record.wins += 1,
                    MatchOutcome::SideBWin => record.losses += 1,
                    MatchOutcome::Draw => record.draws += 1,
                }
                record.last_played = Some(now);
                record.last_updated = now;
                record.clone()
            };

            let record_b = {
                let record = ratings
                    .entry((side_b.0.clone(), side_b.1))
                    .or_insert_with(|| {
                        RatingRecord::new(side_b.0.clone(), side_b.1, DEFAULT_RATING)
                    });
                record.rating = new_b;
                record.games_played += 1;
                match outcome {
                    MatchOutcome::SideAWin => record.losses += 1,
                    MatchOutcome::SideBWin => record.wins += 1,
                    MatchOutcome::Draw => record.draws += 1,
                }
                record.last_played = Some(now);
                record.last_updated = now;
                record.clone()
            };

            self.enqueue_write(WriteJob::UpsertRating(record_a.clone()));
            self.enqueue_write(WriteJob::UpsertRating(record_b.clone()));
            (record_a, record_b)
        };

        self.invalidate_leaderboards()?;
        Ok((record_a, record_b))
    }

    /// Enqueue a match record for durable insertion
    pub fn persist_match(&self, match_record: crate::types::Match) {
        self.enqueue_write(WriteJob::InsertMatch(match_record));
    }

    // --- queue membership view ---

    /// Mark a participant as queued. Returns false if already marked.
    pub fn enqueue_member(&self, participant_id: &ParticipantId) -> Result<bool> {
        let mut members = self.lock_members()?;
        Ok(members.insert(participant_id.clone()))
    }

    /// Clear a participant's queue membership. Returns false if not queued.
    pub fn dequeue_member(&self, participant_id: &ParticipantId) -> Result<bool> {
        let mut members = self.lock_members()?;
        let removed = members.remove(participant_id);
        if removed {
            self.enqueue_write(WriteJob::RemoveQueueMembership {
                participant_id: participant_id.clone(),
            });
        }
        Ok(removed)
    }

    pub fn is_queued(&self, participant_id: &ParticipantId) -> Result<bool> {
        Ok(self.lock_members()?.contains(participant_id))
    }

    pub fn queued_count(&self) -> Result<usize> {
        Ok(self.lock_members()?.len())
    }

    // --- match holds ---

    /// Lock a participant into a match so they cannot re-queue until the
    /// match reaches a terminal state.
    pub fn hold_for_match(&self, participant_id: &ParticipantId) -> Result<()> {
        let mut holds = self.lock_holds()?;
        if !holds.insert(participant_id.clone()) {
            warn!("Participant {} was already match-held", participant_id);
        }
        Ok(())
    }

    /// Release a participant's match hold. Idempotent.
    pub fn release_hold(&self, participant_id: &ParticipantId) -> Result<bool> {
        Ok(self.lock_holds()?.remove(participant_id))
    }

    pub fn is_held(&self, participant_id: &ParticipantId) -> Result<bool> {
        Ok(self.lock_holds()?.contains(participant_id))
    }

    // --- activity / pressure inputs ---

    /// Record that a participant was just active
    pub fn touch(&self, participant_id: &ParticipantId) -> Result<()> {
        self.lock_activity()?
            .insert(participant_id.clone(), Utc::now());
        Ok(())
    }

    /// Participants active (queued or in a match) within the given window
    pub fn active_population(&self, window: Duration) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::hours(1));
        let activity = self.lock_activity()?;
        Ok(activity.values().filter(|&&ts| ts >= cutoff).count())
    }

    // --- derived leaderboard view ---

    /// Leaderboard for a discipline, rating-descending. Rebuilt lazily after
    /// any mutation invalidated the cache; never recomputed on a timer.
    pub fn leaderboard(&self, discipline: Discipline) -> Result<Vec<LeaderboardEntry>> {
        let mut cache = self
            .leaderboards
            .lock()
            .map_err(|_| LadderError::InternalError {
                message: "Failed to acquire leaderboard lock".to_string(),
            })?;

        if cache.is_none() {
            let ratings = self.lock_ratings()?;
            let mut rebuilt: HashMap<Discipline, Vec<LeaderboardEntry>> = HashMap::new();
            for d in Discipline::ALL {
                let mut entries: Vec<LeaderboardEntry> = ratings
                    .values()
                    .filter(|r| r.discipline == d)
                    .map(|r| LeaderboardEntry {
                        participant_id: r.participant_id.clone(),
                        rating: r.rating,
                        games_played: r.games_played,
                    })
                    .collect();
                entries.sort_by(|a, b| b.rating.cmp(&a.rating));
                rebuilt.insert(d, entries);
            }
            debug!("Rebuilt leaderboard cache");
            *cache = Some(rebuilt);
        }

        Ok(cache
            .as_ref()
            .and_then(|boards| boards.get(&discipline).cloned())
            .unwrap_or_default())
    }

    fn invalidate_leaderboards(&self) -> Result<()> {
        *self
            .leaderboards
            .lock()
            .map_err(|_| LadderError::InternalError {
                message: "Failed to acquire leaderboard lock".to_string(),
            })? = None;
        Ok(())
    }

    // --- internals ---

    fn enqueue_write(&self, job: WriteJob) {
        // The receiver only disappears once the writer has shut down; at that
        // point dropping the job is correct (memory stays authoritative).
        if self.write_tx.send(job).is_err() {
            warn!("Write queue closed; dropping durable write job");
        }
    }

    fn lock_ratings(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(ParticipantId, Discipline), RatingRecord>>> {
        self.ratings.lock().map_err(|_| {
            LadderError::InternalError {
                message: "Failed to acquire ratings lock".to_string(),
            }
            .into()
        })
    }

    fn lock_members(&self) -> Result<std::sync::MutexGuard<'_, HashSet<ParticipantId>>> {
        self.queue_members.lock().map_err(|_| {
            LadderError::InternalError {
                message: "Failed to acquire queue members lock".to_string(),
            }
            .into()
        })
    }

    fn lock_holds(&self) -> Result<std::sync::MutexGuard<'_, HashSet<ParticipantId>>> {
        self.match_holds.lock().map_err(|_| {
            LadderError::InternalError {
                message: "Failed to acquire match holds lock".to_string(),
            }
            .into()
        })
    }

    fn lock_activity(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ParticipantId, DateTime<Utc>>>> {
        self.activity.lock().map_err(|_| {
            LadderError::InternalError {
                message: "Failed to acquire activity lock".to_string(),
            }
            .into()
        })
    }
}
