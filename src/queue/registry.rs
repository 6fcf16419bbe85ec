//! The canonical registry of waiting participants
//!
//! Queue membership is tracked here and nowhere else; the RatingStore's
//! membership view mirrors this set through the engine's joined mutation
//! path, and no component keeps a third copy. (A historical failure mode in
//! this class of system: an admin "clear queue" emptied a secondary tracking
//! structure while the structure the matcher read stayed populated.)

use crate::error::{LadderError, Result};
use crate::store::RatingStore;
use crate::types::{
    Discipline, Participant, ParticipantId, QueueSnapshot, QueuedParticipant, SnapshotEntry,
};
use chrono::Utc;
use std::sync::RwLock;
use tracing::debug;

/// Live ordered set of waiting participants
pub struct QueueRegistry {
    entries: RwLock<Vec<QueuedParticipant>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Add a participant to the back of the queue. Returns false if the
    /// identity is already queued.
    pub fn add(&self, participant: Participant) -> Result<bool> {
        let mut entries = self.write_entries()?;
        if entries.iter().any(|e| e.participant.id == participant.id) {
            return Ok(false);
        }
        debug!("Queued participant {}", participant.id);
        entries.push(QueuedParticipant {
            participant,
            enqueued_at: Utc::now(),
            wait_cycles: 0,
        });
        Ok(true)
    }

    /// Remove a participant, returning their queue entry if present
    pub fn remove(&self, participant_id: &ParticipantId) -> Result<Option<QueuedParticipant>> {
        let mut entries = self.write_entries()?;
        let position = entries
            .iter()
            .position(|e| &e.participant.id == participant_id);
        Ok(position.map(|idx| entries.remove(idx)))
    }

    pub fn contains(&self, participant_id: &ParticipantId) -> Result<bool> {
        Ok(self
            .read_entries()?
            .iter()
            .any(|e| &e.participant.id == participant_id))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_entries()?.is_empty())
    }

    /// Increment every queued participant's wait cycle count by exactly one.
    /// Called once per wave, before categorization.
    pub fn bump_wait_cycles(&self) -> Result<()> {
        let mut entries = self.write_entries()?;
        for entry in entries.iter_mut() {
            entry.wait_cycles += 1;
        }
        Ok(())
    }

    /// Take an immutable snapshot of the queue with ratings resolved through
    /// the store. The wave pipeline operates only on this copy, never on the
    /// live registry.
    pub fn snapshot(&self, store: &RatingStore) -> Result<QueueSnapshot> {
        let entries = self.read_entries()?;
        let mut snapshot_entries = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            snapshot_entries.push(SnapshotEntry {
                participant: entry.participant.clone(),
                rating_brood_war: store
                    .rating_or_default(&entry.participant.id, Discipline::BroodWar)?,
                rating_sc2: store.rating_or_default(&entry.participant.id, Discipline::Sc2)?,
                wait_cycles: entry.wait_cycles,
                enqueued_at: entry.enqueued_at,
            });
        }
        Ok(QueueSnapshot {
            taken_at: Utc::now(),
            entries: snapshot_entries,
        })
    }

    /// Current queue contents for diagnostics
    pub fn queued(&self) -> Result<Vec<QueuedParticipant>> {
        Ok(self.read_entries()?.clone())
    }

    fn read_entries(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<QueuedParticipant>>> {
        self.entries.read().map_err(|_| {
            LadderError::InternalError {
                message: "Failed to acquire queue registry read lock".to_string(),
            }
            .into()
        })
    }

    fn write_entries(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<QueuedParticipant>>> {
        self.entries.write().map_err(|_| {
            LadderError::InternalError {
                message: "Failed to acquire queue registry write lock".to_string(),
            }
            .into()
        })
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new()
    }
}
