//! Match record construction
//!
//! Turns validated candidate pairs into full match records: picks a map
//! both participants accept, picks a server from shared locality, and
//! freezes each side's rating at match start. The frozen rating is a copy;
//! the live rating keeps moving while the match is played.

use crate::error::{LadderError, Result};
use crate::types::{Match, MatchSide, MatchStatus};
use crate::utils::{current_timestamp, generate_match_id};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::matcher::CandidatePair;

/// Configuration for map and server selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFactoryConfig {
    /// Full map rotation the ladder draws from
    pub map_pool: Vec<String>,
    /// Server used when the participants share no region
    pub default_server: String,
}

impl MatchFactoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.map_pool.is_empty() {
            return Err(LadderError::ConfigurationError {
                message: "map_pool must not be empty".to_string(),
            }
            .into());
        }
        if self.default_server.trim().is_empty() {
            return Err(LadderError::ConfigurationError {
                message: "default_server must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Builds match records for committed pairs
#[derive(Debug, Clone)]
pub struct MatchFactory {
    config: MatchFactoryConfig,
}

impl MatchFactory {
    pub fn new(config: MatchFactoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Build a pending match for a validated pair
    pub fn build_match(&self, pair: &CandidatePair) -> Match {
        let map = self.select_map(pair);
        let server = self.select_server(pair);

        let side_a = MatchSide {
            id: pair.lead.id().clone(),
            discipline: pair.lead_discipline,
            rating_at_start: pair.lead.rating_for(pair.lead_discipline),
        };
        let side_b = MatchSide {
            id: pair.follow.id().clone(),
            discipline: pair.follow_discipline,
            rating_at_start: pair.follow.rating_for(pair.follow_discipline),
        };

        let match_record = Match {
            id: generate_match_id(),
            side_a,
            side_b,
            map,
            server,
            status: MatchStatus::Pending,
            created_at: current_timestamp(),
        };
        debug!(
            match_id = %match_record.id,
            map = %match_record.map,
            server = %match_record.server,
            "Built match"
        );
        match_record
    }

    /// Random map neither participant excludes, falling back to the full
    /// rotation when their exclusions leave nothing in common.
    fn select_map(&self, pair: &CandidatePair) -> String {
        let eligible: Vec<&String> = self
            .config
            .map_pool
            .iter()
            .filter(|map| {
                !pair.lead.participant.excluded_maps.contains(map)
                    && !pair.follow.participant.excluded_maps.contains(map)
            })
            .collect();

        let mut rng = rand::thread_rng();
        match eligible.choose(&mut rng) {
            Some(map) => (*map).clone(),
            None => self
                .config
                .map_pool
                .choose(&mut rng)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Shared region when both participants declare the same one, otherwise
    /// the configured default server.
    fn select_server(&self, pair: &CandidatePair) -> String {
        match (
            pair.lead.participant.region.as_deref(),
            pair.follow.participant.region.as_deref(),
        ) {
            (Some(a), Some(b)) if a == b => a.to_string(),
            _ => self.config.default_server.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CapabilitySet, Discipline, Participant, Rating, SnapshotEntry};
    use crate::utils::rating_difference;
    use chrono::Utc;

    fn config() -> MatchFactoryConfig {
        MatchFactoryConfig {
            map_pool: vec![
                "Fighting Spirit".to_string(),
                "Circuit Breaker".to_string(),
                "Polypoid".to_string(),
            ],
            default_server: "eu-central".to_string(),
        }
    }

    fn entry(
        id: &str,
        rating: Rating,
        excluded_maps: Vec<String>,
        region: Option<&str>,
    ) -> SnapshotEntry {
        SnapshotEntry {
            participant: Participant {
                id: id.to_string(),
                capabilities: CapabilitySet::both(),
                excluded_maps,
                region: region.map(|r| r.to_string()),
            },
            rating_brood_war: rating,
            rating_sc2: rating,
            wait_cycles: 0,
            enqueued_at: Utc::now(),
        }
    }

    fn pair(lead: SnapshotEntry, follow: SnapshotEntry) -> CandidatePair {
        let rating_difference = rating_difference(
            lead.rating_for(Discipline::BroodWar),
            follow.rating_for(Discipline::Sc2),
        );
        CandidatePair {
            lead,
            follow,
            lead_discipline: Discipline::BroodWar,
            follow_discipline: Discipline::Sc2,
            rating_difference,
        }
    }

    #[test]
    fn test_build_match_freezes_ratings() {
        let factory = MatchFactory::new(config()).unwrap();
        let built = factory.build_match(&pair(
            entry("a", 1700, vec![], None),
            entry("b", 1650, vec![], None),
        ));
        assert_eq!(built.status, MatchStatus::Pending);
        assert_eq!(built.side_a.rating_at_start, 1700);
        assert_eq!(built.side_b.rating_at_start, 1650);
        assert_eq!(built.side_a.discipline, Discipline::BroodWar);
        assert_eq!(built.side_b.discipline, Discipline::Sc2);
    }

    #[test]
    fn test_map_respects_exclusions() {
        let factory = MatchFactory::new(config()).unwrap();
        let built = factory.build_match(&pair(
            entry("a", 1500, vec!["Fighting Spirit".to_string()], None),
            entry("b", 1500, vec!["Circuit Breaker".to_string()], None),
        ));
        assert_eq!(built.map, "Polypoid");
    }

    #[test]
    fn test_full_pool_fallback_when_no_overlap() {
        let factory = MatchFactory::new(config()).unwrap();
        let built = factory.build_match(&pair(
            entry(
                "a",
                1500,
                vec!["Fighting Spirit".to_string(), "Circuit Breaker".to_string()],
                None,
            ),
            entry("b", 1500, vec!["Polypoid".to_string()], None),
        ));
        assert!(config().map_pool.contains(&built.map));
    }

    #[test]
    fn test_shared_region_selects_server() {
        let factory = MatchFactory::new(config()).unwrap();
        let built = factory.build_match(&pair(
            entry("a", 1500, vec![], Some("kr")),
            entry("b", 1500, vec![], Some("kr")),
        ));
        assert_eq!(built.server, "kr");
    }

    #[test]
    fn test_mismatched_regions_fall_back_to_default() {
        let factory = MatchFactory::new(config()).unwrap();
        let built = factory.build_match(&pair(
            entry("a", 1500, vec![], Some("kr")),
            entry("b", 1500, vec![], Some("us-west")),
        ));
        assert_eq!(built.server, "eu-central");
    }

    #[test]
    fn test_rejects_empty_map_pool() {
        let invalid = MatchFactoryConfig {
            map_pool: vec![],
            default_server: "eu-central".to_string(),
        };
        assert!(MatchFactory::new(invalid).is_err());
    }
}
