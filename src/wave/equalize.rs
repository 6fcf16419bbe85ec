//! Side equalization
//!
//! Distributes dual-eligible participants over the two discipline sides,
//! balancing side sizes first and pulling the side means toward each other,
//! until the dual list is fully consumed. The output sides are checked for
//! disjointness before anything downstream may use them; an overlap aborts
//! the wave rather than risking a participant matched against themselves.

use crate::error::{LadderError, Result};
use crate::types::{Discipline, SnapshotEntry};
use std::collections::VecDeque;
use tracing::debug;

use super::categorize::CategorizedQueue;

/// The two disjoint sides a wave matches across
#[derive(Debug, Clone)]
pub struct EqualizedSides {
    /// Participants assigned to play Brood War this wave
    pub brood_war: Vec<SnapshotEntry>,
    /// Participants assigned to play SC2 this wave
    pub sc2: Vec<SnapshotEntry>,
}

impl EqualizedSides {
    pub fn total(&self) -> usize {
        self.brood_war.len() + self.sc2.len()
    }
}

fn side_mean(side: &[SnapshotEntry], discipline: Discipline) -> f64 {
    if side.is_empty() {
        return 0.0;
    }
    side.iter()
        .map(|e| e.rating_for(discipline) as f64)
        .sum::<f64>()
        / side.len() as f64
}

/// Pop the dual candidate, from either end of the rating-sorted list, whose
/// assignment best moves `smaller_mean` toward `larger_mean`.
fn pop_mean_correcting(
    dual: &mut VecDeque<SnapshotEntry>,
    smaller: &[SnapshotEntry],
    smaller_discipline: Discipline,
    larger_mean: f64,
) -> SnapshotEntry {
    if smaller.is_empty() {
        // No mean to correct yet; seed with the strongest candidate.
        return dual.pop_front().expect("dual list checked non-empty");
    }
    let smaller_mean = side_mean(smaller, smaller_discipline);
    if smaller_mean < larger_mean {
        // Highest-rated candidate pulls the lagging mean upward
        dual.pop_front().expect("dual list checked non-empty")
    } else {
        dual.pop_back().expect("dual list checked non-empty")
    }
}

/// Produce two disjoint sides covering every categorized participant, fully
/// consuming the dual-eligible list.
pub fn equalize(categorized: CategorizedQueue) -> Result<EqualizedSides> {
    let input_total = categorized.total();
    let mut brood_war = categorized.brood_war_only;
    let mut sc2 = categorized.sc2_only;
    // Sorted rating-descending by the categorizer; both ends stay extreme.
    let mut dual: VecDeque<SnapshotEntry> = categorized.dual.into();

    if brood_war.is_empty() && sc2.is_empty() {
        // No exclusive anchors on either side: split by strict alternation.
        let mut to_brood_war = true;
        while let Some(entry) = dual.pop_front() {
            if to_brood_war {
                brood_war.push(entry);
            } else {
                sc2.push(entry);
            }
            to_brood_war = !to_brood_war;
        }
    } else {
        // Phase 1: feed the smaller side, choosing the dual candidate whose
        // rating best closes the gap between the side means.
        while !dual.is_empty() && brood_war.len() != sc2.len() {
            if brood_war.len() < sc2.len() {
                let larger_mean = side_mean(&sc2, Discipline::Sc2);
                let pick =
                    pop_mean_correcting(&mut dual, &brood_war, Discipline::BroodWar, larger_mean);
                brood_war.push(pick);
            } else {
                let larger_mean = side_mean(&brood_war, Discipline::BroodWar);
                let pick = pop_mean_correcting(&mut dual, &sc2, Discipline::Sc2, larger_mean);
                sc2.push(pick);
            }
        }

        // Phase 2: sizes are equal; alternate any remainder one-by-one.
        let mut to_brood_war = true;
        while let Some(entry) = dual.pop_front() {
            if to_brood_war {
                brood_war.push(entry);
            } else {
                sc2.push(entry);
            }
            to_brood_war = !to_brood_war;
        }
    }

    let sides = EqualizedSides { brood_war, sc2 };
    validate_disjoint(&sides, input_total)?;
    debug!(
        "Equalized sides: {} Brood War, {} SC2",
        sides.brood_war.len(),
        sides.sc2.len()
    );
    Ok(sides)
}

/// Hard post-condition: the sides share no identity and cover every input.
/// Any overlap is a fatal equalization bug and aborts the wave.
fn validate_disjoint(sides: &EqualizedSides, input_total: usize) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for entry in sides.brood_war.iter().chain(sides.sc2.iter()) {
        if !seen.insert(entry.id().clone()) {
            return Err(LadderError::InvariantViolation {
                message: format!(
                    "participant {} appears on both equalized sides",
                    entry.id()
                ),
            }
            .into());
        }
    }
    if sides.total() != input_total {
        return Err(LadderError::InvariantViolation {
            message: format!(
                "equalizer produced {} participants from {} inputs",
                sides.total(),
                input_total
            ),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CapabilitySet;
    use crate::types::Participant;
    use chrono::Utc;
    use std::collections::HashSet;

    fn entry(id: &str, caps: CapabilitySet, rating: i32) -> SnapshotEntry {
        SnapshotEntry {
            participant: Participant {
                id: id.to_string(),
                capabilities: caps,
                excluded_maps: vec![],
                region: None,
            },
            rating_brood_war: rating,
            rating_sc2: rating,
            wait_cycles: 0,
            enqueued_at: Utc::now(),
        }
    }

    fn bw_only(id: &str, rating: i32) -> SnapshotEntry {
        entry(id, CapabilitySet::only(Discipline::BroodWar), rating)
    }

    fn sc2_only(id: &str, rating: i32) -> SnapshotEntry {
        entry(id, CapabilitySet::only(Discipline::Sc2), rating)
    }

    fn dual(id: &str, rating: i32) -> SnapshotEntry {
        entry(id, CapabilitySet::both(), rating)
    }

    fn assert_disjoint_and_complete(sides: &EqualizedSides, expected_total: usize) {
        let ids: HashSet<_> = sides
            .brood_war
            .iter()
            .chain(sides.sc2.iter())
            .map(|e| e.id().clone())
            .collect();
        assert_eq!(ids.len(), sides.total());
        assert_eq!(sides.total(), expected_total);
    }

    #[test]
    fn test_dual_list_fully_consumed_with_unequal_exclusives() {
        // BW-only [2000, 1800], SC2-only [1700, 1600, 1500, 1400],
        // dual [1950, 1750, 1550]
        let categorized = CategorizedQueue {
            brood_war_only: vec![bw_only("bw1", 2000), bw_only("bw2", 1800)],
            sc2_only: vec![
                sc2_only("sc1", 1700),
                sc2_only("sc2", 1600),
                sc2_only("sc3", 1500),
                sc2_only("sc4", 1400),
            ],
            dual: vec![dual("d1", 1950), dual("d2", 1750), dual("d3", 1550)],
        };

        let sides = equalize(categorized).unwrap();
        assert_disjoint_and_complete(&sides, 9);
        // Dual list fully consumed even though final sizes are unequal
        assert_eq!(sides.total(), 9);
    }

    #[test]
    fn test_smaller_side_receives_dual_players_first() {
        let categorized = CategorizedQueue {
            brood_war_only: vec![bw_only("bw1", 1600)],
            sc2_only: vec![
                sc2_only("sc1", 1700),
                sc2_only("sc2", 1600),
                sc2_only("sc3", 1500),
            ],
            dual: vec![dual("d1", 1800), dual("d2", 1400)],
        };

        let sides = equalize(categorized).unwrap();
        assert_disjoint_and_complete(&sides, 6);
        // Both dual players flow to the smaller Brood War side
        assert_eq!(sides.brood_war.len(), 3);
        assert_eq!(sides.sc2.len(), 3);
    }

    #[test]
    fn test_mean_correction_picks_the_right_end() {
        // Smaller BW side has mean 2000, far above the SC2 mean of 1000:
        // the low-end dual candidate should be assigned to BW to close the
        // gap, not the high-end one.
        let categorized = CategorizedQueue {
            brood_war_only: vec![bw_only("bw1", 2000)],
            sc2_only: vec![sc2_only("sc1", 1000), sc2_only("sc2", 1000)],
            dual: vec![dual("d_high", 1900), dual("d_low", 1100)],
        };

        let sides = equalize(categorized).unwrap();
        assert!(sides
            .brood_war
            .iter()
            .any(|e| e.id() == "d_low"));
        assert_disjoint_and_complete(&sides, 5);
    }

    #[test]
    fn test_only_dual_players_alternate_strictly() {
        let categorized = CategorizedQueue {
            brood_war_only: vec![],
            sc2_only: vec![],
            dual: vec![
                dual("d1", 1900),
                dual("d2", 1800),
                dual("d3", 1700),
                dual("d4", 1600),
                dual("d5", 1500),
            ],
        };

        let sides = equalize(categorized).unwrap();
        assert_disjoint_and_complete(&sides, 5);
        // Strict alternation starting with Brood War
        assert_eq!(sides.brood_war.len(), 3);
        assert_eq!(sides.sc2.len(), 2);
        assert_eq!(sides.brood_war[0].id(), "d1");
        assert_eq!(sides.sc2[0].id(), "d2");
    }

    #[test]
    fn test_single_dual_participant_lands_on_one_side_only() {
        // Regression guard: one dual participant in an otherwise empty queue
        // must end up on exactly one side, never both.
        let categorized = CategorizedQueue {
            brood_war_only: vec![],
            sc2_only: vec![],
            dual: vec![dual("solo", 1500)],
        };

        let sides = equalize(categorized).unwrap();
        assert_eq!(sides.total(), 1);
        assert_disjoint_and_complete(&sides, 1);
    }

    #[test]
    fn test_empty_input() {
        let sides = equalize(CategorizedQueue::default()).unwrap();
        assert_eq!(sides.total(), 0);
    }

    #[test]
    fn test_exclusives_never_switch_sides() {
        let categorized = CategorizedQueue {
            brood_war_only: vec![bw_only("bw1", 1500)],
            sc2_only: vec![sc2_only("sc1", 1500)],
            dual: vec![dual("d1", 1500)],
        };

        let sides = equalize(categorized).unwrap();
        assert!(sides.brood_war.iter().any(|e| e.id() == "bw1"));
        assert!(sides.sc2.iter().any(|e| e.id() == "sc1"));
        assert_disjoint_and_complete(&sides, 3);
    }
}
