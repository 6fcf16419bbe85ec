//! Greedy cross-side pairing
//!
//! Pairs participants from the two equalized sides, ordered by priority and
//! constrained by each lead participant's tolerance window. The assignment
//! is greedy rather than globally optimal: constraints are hard thresholds
//! and the sides arrive rating-balanced, so greedy and optimal outcomes
//! converge at this scale. A single refinement pass afterwards swaps pair
//! assignments where that strictly reduces total rating distance.
//!
//! Self-match prevention is layered. Pair construction skips any candidate
//! sharing the lead's identity, the refinement pass rejects swaps that
//! would produce a self-pair, and [`validate_committed_pairs`] makes a
//! final fatal check over everything committed.

use crate::error::{LadderError, Result};
use crate::types::{Discipline, SnapshotEntry};
use crate::utils::rating_difference;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::equalize::EqualizedSides;

/// Configuration for priority calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Priority added per wave a participant has waited
    pub wait_bonus: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { wait_bonus: 50.0 }
    }
}

impl MatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.wait_bonus < 0.0 {
            return Err(LadderError::ConfigurationError {
                message: "wait_bonus must be non-negative".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// A committed pairing between the two sides, not yet a full match record
#[derive(Debug, Clone)]
pub struct CandidatePair {
    pub lead: SnapshotEntry,
    pub follow: SnapshotEntry,
    pub lead_discipline: Discipline,
    pub follow_discipline: Discipline,
    pub rating_difference: u32,
}

impl CandidatePair {
    fn build(
        lead: SnapshotEntry,
        follow: SnapshotEntry,
        lead_discipline: Discipline,
    ) -> Self {
        let follow_discipline = lead_discipline.other();
        let rating_difference = rating_difference(
            lead.rating_for(lead_discipline),
            follow.rating_for(follow_discipline),
        );
        Self {
            lead,
            follow,
            lead_discipline,
            follow_discipline,
            rating_difference,
        }
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

/// Pair participants across the equalized sides.
///
/// The smaller side leads (Brood War on equal sizes). Lead participants are
/// processed in descending priority, where priority rewards both distance
/// from the lead side's mean (outliers are hardest to place later) and
/// accumulated wait cycles. Each lead takes the closest-rated unused follow
/// candidate within the tolerance `tolerance_for` grants that lead; leads
/// with no candidate in window stay queued for the next wave.
pub fn match_sides<F>(
    sides: &EqualizedSides,
    config: &MatcherConfig,
    tolerance_for: F,
) -> Result<Vec<CandidatePair>>
where
    F: Fn(&SnapshotEntry) -> u32,
{
    config.validate()?;

    let (lead_side, follow_side, lead_discipline) =
        if sides.brood_war.len() <= sides.sc2.len() {
            (&sides.brood_war, &sides.sc2, Discipline::BroodWar)
        } else {
            (&sides.sc2, &sides.brood_war, Discipline::Sc2)
        };
    let follow_discipline = lead_discipline.other();

    if lead_side.is_empty() || follow_side.is_empty() {
        return Ok(Vec::new());
    }

    let mean = side_mean(lead_side, lead_discipline);

    // Priority order: descending priority, then ascending rating so the
    // harder-to-place low-rated outlier goes first on ties.
    let mut ordered: Vec<&SnapshotEntry> = lead_side.iter().collect();
    ordered.sort_by(|a, b| {
        let priority = |e: &SnapshotEntry| {
            (e.rating_for(lead_discipline) as f64 - mean).abs()
                + config.wait_bonus * e.wait_cycles as f64
        };
        priority(b)
            .partial_cmp(&priority(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.rating_for(lead_discipline)
                    .cmp(&b.rating_for(lead_discipline))
            })
    });

    // Follow candidates scanned rating-descending; ties on difference keep
    // the first found.
    let mut candidates: Vec<&SnapshotEntry> = follow_side.iter().collect();
    candidates.sort_by(|a, b| {
        b.rating_for(follow_discipline)
            .cmp(&a.rating_for(follow_discipline))
    });
    let mut used = vec![false; candidates.len()];

    let mut pairs = Vec::new();
    for lead in ordered {
        let tolerance = tolerance_for(lead);
        let lead_rating = lead.rating_for(lead_discipline);

        let mut best: Option<(usize, u32)> = None;
        for (index, follow) in candidates.iter().enumerate() {
            if used[index] || follow.id() == lead.id() {
                continue;
            }
            let difference =
                rating_difference(lead_rating, follow.rating_for(follow_discipline));
            if difference > tolerance {
                continue;
            }
            if best.map_or(true, |(_, d)| difference < d) {
                best = Some((index, difference));
            }
        }

        match best {
            Some((index, difference)) => {
                used[index] = true;
                trace!(
                    lead = %lead.id(),
                    follow = %candidates[index].id(),
                    difference,
                    "Committed pair"
                );
                pairs.push(CandidatePair::build(
                    lead.clone(),
                    (*candidates[index]).clone(),
                    lead_discipline,
                ));
            }
            None => {
                trace!(lead = %lead.id(), tolerance, "No follow candidate in window");
            }
        }
    }

    refine_pairs(&mut pairs, &tolerance_for);
    validate_committed_pairs(&pairs)?;

    debug!(
        "Matched {} pairs, {} lead-side leftovers",
        pairs.len(),
        lead_side.len() - pairs.len()
    );
    Ok(pairs)
}

/// One pass over committed pairs, swapping follow assignments where the
/// swap strictly reduces total rating distance, both new differences stay
/// in their leads' windows, and neither new pairing is a self-pair.
fn refine_pairs<F>(pairs: &mut [CandidatePair], tolerance_for: &F)
where
    F: Fn(&SnapshotEntry) -> u32,
{
    for i in 0..pairs.len() {
        for j in (i + 1)..pairs.len() {
            let (left, right) = (&pairs[i], &pairs[j]);
            if left.follow.id() == right.lead.id() || right.follow.id() == left.lead.id() {
                continue;
            }

            let left_swapped = rating_difference(
                left.lead.rating_for(left.lead_discipline),
                right.follow.rating_for(left.follow_discipline),
            );
            let right_swapped = rating_difference(
                right.lead.rating_for(right.lead_discipline),
                left.follow.rating_for(right.follow_discipline),
            );
            if left_swapped > tolerance_for(&left.lead)
                || right_swapped > tolerance_for(&right.lead)
            {
                continue;
            }
            let current = left.rating_difference as u64 + right.rating_difference as u64;
            let swapped = left_swapped as u64 + right_swapped as u64;
            if swapped >= current {
                continue;
            }

            trace!(
                left_lead = %pairs[i].lead.id(),
                right_lead = %pairs[j].lead.id(),
                "Swapping follow assignments"
            );
            let follow_i = pairs[i].follow.clone();
            let follow_j = std::mem::replace(&mut pairs[j].follow, follow_i);
            pairs[i].follow = follow_j;
            pairs[i].rating_difference = left_swapped;
            pairs[j].rating_difference = right_swapped;
        }
    }
}

/// Final check over everything committed this wave. A pair sharing one
/// identity is fatal and aborts the wave before anything is persisted.
pub fn validate_committed_pairs(pairs: &[CandidatePair]) -> Result<()> {
    for pair in pairs {
        if pair.lead.id() == pair.follow.id() {
            return Err(LadderError::InvariantViolation {
                message: format!(
                    "committed pair matches participant {} against themselves",
                    pair.lead.id()
                ),
            }
            .into());
        }
    }
    Ok(())
}
