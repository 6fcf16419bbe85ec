//! Integration tests for the full wave pipeline
//!
//! These tests drive the engine boundary the way the service does:
//! queue joins and leaves, scheduled waves, match lifecycle reporting and
//! administrative overrides, checking events and rating state end to end.

mod fixtures;

use fixtures::{
    brood_war_player, count_events_of_type, create_test_engine, dual_player, sc2_player,
};
use ladder_engine::store::RatingAdjustment;
use ladder_engine::types::{Discipline, MatchOutcome, MatchStatus, DEFAULT_RATING};
use std::collections::HashSet;

#[tokio::test]
async fn test_full_ladder_workflow() {
    let (engine, publisher) = create_test_engine();

    engine.enqueue(brood_war_player("flash")).unwrap();
    engine.enqueue(sc2_player("serral")).unwrap();

    let report = engine.run_wave().await.unwrap();
    assert_eq!(report.matches.len(), 1);
    assert_eq!(count_events_of_type(&publisher, "MatchCreated"), 1);
    assert_eq!(count_events_of_type(&publisher, "WaveCompleted"), 1);
    // Both participants got a queue-removed event for the match
    assert_eq!(count_events_of_type(&publisher, "QueueRemoved"), 2);

    let match_record = &report.matches[0];
    assert_eq!(match_record.status, MatchStatus::Pending);
    assert_eq!(match_record.side_a.rating_at_start, DEFAULT_RATING);

    engine
        .complete_match(&match_record.id, MatchOutcome::SideAWin)
        .await
        .unwrap();

    let winner = engine
        .get_rating(&match_record.side_a.id, match_record.side_a.discipline)
        .unwrap()
        .unwrap();
    let loser = engine
        .get_rating(&match_record.side_b.id, match_record.side_b.discipline)
        .unwrap()
        .unwrap();
    assert!(winner.rating > DEFAULT_RATING);
    assert!(loser.rating < DEFAULT_RATING);
    assert_eq!(winner.wins, 1);
    assert_eq!(loser.losses, 1);

    // Both can queue again and be matched in a later wave
    engine.enqueue(brood_war_player("flash")).unwrap();
    engine.enqueue(sc2_player("serral")).unwrap();
    let second = engine.run_wave().await.unwrap();
    assert_eq!(second.matches.len(), 1);
}

#[tokio::test]
async fn test_no_identity_matched_twice_per_wave() {
    let (engine, _) = create_test_engine();

    for i in 0..6 {
        engine.enqueue(brood_war_player(&format!("bw{}", i))).unwrap();
        engine.enqueue(sc2_player(&format!("sc{}", i))).unwrap();
    }
    for i in 0..4 {
        engine.enqueue(dual_player(&format!("dual{}", i))).unwrap();
    }

    let report = engine.run_wave().await.unwrap();
    assert!(!report.matches.is_empty());

    let mut seen = HashSet::new();
    for match_record in &report.matches {
        assert!(seen.insert(match_record.side_a.id.clone()));
        assert!(seen.insert(match_record.side_b.id.clone()));
        assert_ne!(match_record.side_a.id, match_record.side_b.id);
    }
}

#[tokio::test]
async fn test_dual_players_fill_both_sides() {
    let (engine, _) = create_test_engine();

    engine.enqueue(brood_war_player("bw")).unwrap();
    engine.enqueue(sc2_player("sc")).unwrap();
    engine.enqueue(dual_player("d1")).unwrap();
    engine.enqueue(dual_player("d2")).unwrap();

    let report = engine.run_wave().await.unwrap();
    assert_eq!(report.matches.len(), 2);
    assert_eq!(report.left_queued, 0);
}

#[tokio::test]
async fn test_leftover_waits_until_partner_arrives() {
    let (engine, _) = create_test_engine();

    engine.enqueue(brood_war_player("lonely")).unwrap();
    let first = engine.run_wave().await.unwrap();
    assert!(first.matches.is_empty());
    assert_eq!(first.left_queued, 1);

    let snapshot = engine.snapshot_queue_state().unwrap();
    assert_eq!(snapshot.entries[0].wait_cycles, 1);

    engine.enqueue(sc2_player("partner")).unwrap();
    let second = engine.run_wave().await.unwrap();
    assert_eq!(second.matches.len(), 1);
    assert_eq!(second.left_queued, 0);
}

#[tokio::test]
async fn test_abort_leaves_ratings_untouched_and_unlocks() {
    let (engine, publisher) = create_test_engine();

    engine.enqueue(brood_war_player("a")).unwrap();
    engine.enqueue(sc2_player("b")).unwrap();
    let report = engine.run_wave().await.unwrap();
    let match_id = report.matches[0].id;

    engine.abort_match(&match_id).await.unwrap();
    assert_eq!(count_events_of_type(&publisher, "MatchAborted"), 1);

    for (id, discipline) in [
        ("a".to_string(), Discipline::BroodWar),
        ("b".to_string(), Discipline::Sc2),
    ] {
        let record = engine.get_rating(&id, discipline).unwrap();
        assert!(record.map_or(true, |r| r.games_played == 0));
    }

    // Queue locks released: both may re-queue
    assert!(engine.enqueue(brood_war_player("a")).unwrap());
    assert!(engine.enqueue(sc2_player("b")).unwrap());
}

#[tokio::test]
async fn test_conflict_resolution_applies_outcome_once() {
    let (engine, _) = create_test_engine();

    engine.enqueue(brood_war_player("a")).unwrap();
    engine.enqueue(sc2_player("b")).unwrap();
    let report = engine.run_wave().await.unwrap();
    let match_id = report.matches[0].id;

    engine.flag_conflict(&match_id).unwrap();
    assert_eq!(
        engine.get_match(&match_id).unwrap().unwrap().status,
        MatchStatus::Conflicted
    );
    // Still locked while the conflict is open
    assert!(engine.enqueue(brood_war_player("a")).is_err());

    engine
        .resolve_conflict(&match_id, MatchOutcome::Draw)
        .await
        .unwrap();
    // A late duplicate report changes nothing
    engine
        .complete_match(&match_id, MatchOutcome::SideAWin)
        .await
        .unwrap();

    let record = engine
        .get_rating(&"a".to_string(), Discipline::BroodWar)
        .unwrap()
        .unwrap();
    assert_eq!(record.games_played, 1);
    assert_eq!(record.draws, 1);
    assert_eq!(record.wins, 0);
}

#[tokio::test]
async fn test_admin_overrides_use_live_state() {
    let (engine, publisher) = create_test_engine();

    // Adjusting an unknown identity creates the record
    let record = engine
        .adjust_rating(
            &"smurf".to_string(),
            Discipline::BroodWar,
            RatingAdjustment::Set(2100),
        )
        .unwrap();
    assert_eq!(record.rating, 2100);

    engine.enqueue(brood_war_player("smurf")).unwrap();
    let snapshot = engine.snapshot_queue_state().unwrap();
    assert_eq!(snapshot.entries[0].rating_brood_war, 2100);

    // Force removal goes through the same removal path as a user leave
    assert!(engine
        .force_remove_from_queue(&"smurf".to_string())
        .await
        .unwrap());
    assert_eq!(count_events_of_type(&publisher, "QueueRemoved"), 1);
    // Second removal is an idempotent success
    assert!(!engine
        .force_remove_from_queue(&"smurf".to_string())
        .await
        .unwrap());

    let leaderboard = engine.leaderboard(Discipline::BroodWar).unwrap();
    assert_eq!(leaderboard.len(), 1);
    assert_eq!(leaderboard[0].rating, 2100);
}

#[tokio::test]
async fn test_disciplines_rated_independently() {
    let (engine, _) = create_test_engine();

    engine
        .adjust_rating(
            &"dual".to_string(),
            Discipline::BroodWar,
            RatingAdjustment::Delta(200),
        )
        .unwrap();

    let brood_war = engine
        .get_rating(&"dual".to_string(), Discipline::BroodWar)
        .unwrap()
        .unwrap();
    assert_eq!(brood_war.rating, DEFAULT_RATING + 200);
    assert!(engine
        .get_rating(&"dual".to_string(), Discipline::Sc2)
        .unwrap()
        .is_none());
}
