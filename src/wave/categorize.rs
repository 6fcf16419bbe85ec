//! Snapshot categorization
//!
//! Splits a queue snapshot into discipline-exclusive and dual-eligible
//! groups, each sorted descending by the rating relevant to that group.

use crate::types::{Discipline, QueueSnapshot, SnapshotEntry};
use tracing::warn;

/// The three categorized participant lists of a wave
#[derive(Debug, Clone, Default)]
pub struct CategorizedQueue {
    /// Eligible for Brood War only, sorted by Brood War rating descending
    pub brood_war_only: Vec<SnapshotEntry>,
    /// Eligible for SC2 only, sorted by SC2 rating descending
    pub sc2_only: Vec<SnapshotEntry>,
    /// Eligible for both, sorted by the max of the two ratings descending
    pub dual: Vec<SnapshotEntry>,
}

impl CategorizedQueue {
    pub fn total(&self) -> usize {
        self.brood_war_only.len() + self.sc2_only.len() + self.dual.len()
    }
}

/// Partition a snapshot by declared capability
pub fn categorize(snapshot: &QueueSnapshot) -> CategorizedQueue {
    let mut result = CategorizedQueue::default();

    for entry in &snapshot.entries {
        let caps = entry.participant.capabilities;
        if caps.is_dual() {
            result.dual.push(entry.clone());
        } else {
            match caps.exclusive() {
                Some(Discipline::BroodWar) => result.brood_war_only.push(entry.clone()),
                Some(Discipline::Sc2) => result.sc2_only.push(entry.clone()),
                None => {
                    // The engine rejects capability-less joins; a snapshot
                    // entry without capabilities is unmatched by definition.
                    warn!(
                        "Skipping participant {} with no declared capability",
                        entry.id()
                    );
                }
            }
        }
    }

    result
        .brood_war_only
        .sort_by(|a, b| b.rating_for(Discipline::BroodWar).cmp(&a.rating_for(Discipline::BroodWar)));
    result
        .sc2_only
        .sort_by(|a, b| b.rating_for(Discipline::Sc2).cmp(&a.rating_for(Discipline::Sc2)));
    result
        .dual
        .sort_by(|a, b| b.best_rating().cmp(&a.best_rating()));

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CapabilitySet, Participant};
    use chrono::Utc;

    pub(crate) fn entry(
        id: &str,
        caps: CapabilitySet,
        rating_bw: i32,
        rating_sc2: i32,
    ) -> SnapshotEntry {
        SnapshotEntry {
            participant: Participant {
                id: id.to_string(),
                capabilities: caps,
                excluded_maps: vec![],
                region: None,
            },
            rating_brood_war: rating_bw,
            rating_sc2,
            wait_cycles: 0,
            enqueued_at: Utc::now(),
        }
    }

    fn snapshot(entries: Vec<SnapshotEntry>) -> QueueSnapshot {
        QueueSnapshot {
            taken_at: Utc::now(),
            entries,
        }
    }

    #[test]
    fn test_partition_by_capability() {
        let snap = snapshot(vec![
            entry("bw", CapabilitySet::only(Discipline::BroodWar), 1600, 0),
            entry("sc", CapabilitySet::only(Discipline::Sc2), 0, 1700),
            entry("both", CapabilitySet::both(), 1500, 1550),
        ]);

        let categorized = categorize(&snap);
        assert_eq!(categorized.brood_war_only.len(), 1);
        assert_eq!(categorized.sc2_only.len(), 1);
        assert_eq!(categorized.dual.len(), 1);
        assert_eq!(categorized.total(), 3);
    }

    #[test]
    fn test_lists_sorted_descending_by_relevant_rating() {
        let snap = snapshot(vec![
            entry("bw_low", CapabilitySet::only(Discipline::BroodWar), 1400, 0),
            entry("bw_high", CapabilitySet::only(Discipline::BroodWar), 1900, 0),
            entry("bw_mid", CapabilitySet::only(Discipline::BroodWar), 1650, 0),
        ]);

        let categorized = categorize(&snap);
        let ratings: Vec<_> = categorized
            .brood_war_only
            .iter()
            .map(|e| e.rating_brood_war)
            .collect();
        assert_eq!(ratings, vec![1900, 1650, 1400]);
    }

    #[test]
    fn test_dual_sorted_by_best_rating() {
        let snap = snapshot(vec![
            // Best rating 1600 (SC2)
            entry("a", CapabilitySet::both(), 1200, 1600),
            // Best rating 1800 (BW)
            entry("b", CapabilitySet::both(), 1800, 1300),
        ]);

        let categorized = categorize(&snap);
        assert_eq!(categorized.dual[0].id(), "b");
        assert_eq!(categorized.dual[1].id(), "a");
    }

    #[test]
    fn test_empty_snapshot() {
        let categorized = categorize(&snapshot(vec![]));
        assert_eq!(categorized.total(), 0);
    }
}
