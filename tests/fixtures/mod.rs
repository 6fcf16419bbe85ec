//! Test fixtures shared by the integration tests

use ladder_engine::engine::{EngineConfig, LadderEngine};
use ladder_engine::notify::MockEventPublisher;
use ladder_engine::store::{EloSettings, RatingStore};
use ladder_engine::types::{CapabilitySet, Discipline, LadderEvent, Participant};
use ladder_engine::wave::{MatchFactoryConfig, MatcherConfig, WindowConfig};
use std::sync::Arc;
use std::time::Duration;

/// Build a fully wired engine backed by a mock publisher
pub fn create_test_engine() -> (Arc<LadderEngine>, Arc<MockEventPublisher>) {
    let publisher = Arc::new(MockEventPublisher::new());
    let (store, _write_rx) = RatingStore::new();

    let engine = LadderEngine::new(
        EngineConfig {
            matcher: MatcherConfig::default(),
            window: WindowConfig::default(),
            factory: MatchFactoryConfig {
                map_pool: vec![
                    "Fighting Spirit".to_string(),
                    "Circuit Breaker".to_string(),
                    "Polypoid".to_string(),
                ],
                default_server: "eu-central".to_string(),
            },
            elo: EloSettings::default(),
            activity_window: Duration::from_secs(1800),
        },
        Arc::new(store),
        publisher.clone(),
    )
    .expect("engine config is valid");

    (Arc::new(engine), publisher)
}

pub fn brood_war_player(id: &str) -> Participant {
    participant(id, CapabilitySet::only(Discipline::BroodWar))
}

pub fn sc2_player(id: &str) -> Participant {
    participant(id, CapabilitySet::only(Discipline::Sc2))
}

pub fn dual_player(id: &str) -> Participant {
    participant(id, CapabilitySet::both())
}

pub fn participant(id: &str, capabilities: CapabilitySet) -> Participant {
    Participant {
        id: id.to_string(),
        capabilities,
        excluded_maps: vec![],
        region: None,
    }
}

/// Count published events of a given variant name
pub fn count_events_of_type(publisher: &MockEventPublisher, event_type: &str) -> usize {
    publisher
        .published_events()
        .iter()
        .filter(|event| match event {
            LadderEvent::MatchCreated(_) => event_type == "MatchCreated",
            LadderEvent::MatchAborted(_) => event_type == "MatchAborted",
            LadderEvent::QueueRemoved(_) => event_type == "QueueRemoved",
            LadderEvent::WaveCompleted(_) => event_type == "WaveCompleted",
        })
        .count()
}
