use rivalry::events::queues;
use rivalry::model::{GameScore, HeadToHeadRecord, Match, MatchResult, RatingHistoryEntry, Side};
use rivalry::outbox::OutboxStore;
use rivalry::{DocumentStore, InMemoryDocumentStore, Pipeline};

use crate::support::fixtures::{config, doubles, pipeline, player, seed_four, seed_players};

#[test_log::test]
fn three_straight_losses_make_an_opponent_the_nemesis() {
    let pipeline = pipeline();
    seed_four(pipeline.store());

    for (id, sets) in [("m1", [(19, 21)]), ("m2", [(18, 21)]), ("m3", [(17, 21)])] {
        assert!(pipeline.record_match(&doubles(id, &sets)).unwrap());
    }
    let stats = pipeline.run_until_idle().unwrap();

    assert_eq!(stats.relayed, 3 + 3 + 12);
    assert_eq!(stats.rating.applied, 3);
    assert_eq!(stats.head_to_head.applied, 3);
    assert_eq!(stats.rating.rejected + stats.head_to_head.rejected, 0);

    let p1 = player(pipeline.store(), "p1");
    let nemesis = p1.nemesis.expect("p1 has a nemesis");
    assert!(["p3", "p4"].contains(&nemesis.opponent_id.as_str()));
    assert_eq!(nemesis.opponent_id, "p3");
    assert!(nemesis.matches_lost >= 3);
    assert_eq!(nemesis.win_rate_percent, 0.0);
    assert!(p1.rating.current.unwrap() < 1600.0);

    assert!(player(pipeline.store(), "p3").nemesis.is_none());
    assert_eq!(
        pipeline.store().count::<HeadToHeadRecord>().unwrap(),
        8
    );
    assert_eq!(
        pipeline.store().count::<RatingHistoryEntry>().unwrap(),
        12
    );
    assert!(pipeline.queue().is_idle());
}

#[test]
fn each_stage_hands_off_through_its_own_queue() {
    let pipeline = pipeline();
    seed_four(pipeline.store());
    pipeline.record_match(&doubles("m1", &[(21, 9)])).unwrap();
    pipeline.run_until_idle().unwrap();

    let queue = pipeline.queue();
    assert_eq!(queue.event_types(queues::RATING), vec!["match.completed"]);
    assert_eq!(
        queue.event_types(queues::HEAD_TO_HEAD),
        vec!["match.rating_processed"]
    );
    assert_eq!(
        queue.event_types(queues::NEMESIS),
        vec!["head_to_head.changed"; 4]
    );

    let m = pipeline.store().get::<Match>("m1").unwrap().unwrap().data;
    assert!(m.rating_processed && m.h2h_processed);
    assert_eq!(m.rating_updates.len(), 4);
}

#[test]
fn rewriting_a_processed_match_does_not_retrigger() {
    let pipeline = pipeline();
    seed_four(pipeline.store());
    let m = doubles("m1", &[(21, 19)]);
    pipeline.record_match(&m).unwrap();
    pipeline.run_until_idle().unwrap();

    // The scheduling surface writes its stale copy back without markers.
    let triggered = pipeline
        .record_match(&m.clone().with_title("Renamed"))
        .unwrap();
    let stats = pipeline.run_until_idle().unwrap();

    assert!(!triggered);
    assert_eq!(stats.rating.settled(), 0);
    let stored = pipeline.store().get::<Match>("m1").unwrap().unwrap().data;
    assert!(stored.rating_processed && stored.h2h_processed);
    assert_eq!(stored.display_title(), "Renamed");
    assert_eq!(player(pipeline.store(), "p1").wins, 1);
}

#[test]
fn malformed_match_is_processed_once_corrected() {
    let pipeline = pipeline();
    seed_four(pipeline.store());

    let mut broken = doubles("m1", &[(21, 12)]);
    broken.result = Some(MatchResult {
        winner: Side::TeamA,
        games: vec![GameScore { sets: Vec::new() }],
    });
    assert!(pipeline.record_match(&broken).unwrap());
    let stats = pipeline.run_until_idle().unwrap();

    assert_eq!(stats.rating.skipped, 1);
    assert_eq!(stats.rating.rejected, 0);
    assert!(!pipeline.store().get::<Match>("m1").unwrap().unwrap().data.rating_processed);
    assert_eq!(player(pipeline.store(), "p1").rating.current, None);

    assert!(pipeline.record_match(&doubles("m1", &[(21, 12)])).unwrap());
    let stats = pipeline.run_until_idle().unwrap();

    assert_eq!(stats.rating.applied, 1);
    assert_eq!(stats.head_to_head.applied, 1);
    assert_eq!(player(pipeline.store(), "p1").wins, 1);
}

#[test]
fn unknown_participant_is_left_out_but_the_match_completes() {
    let pipeline = Pipeline::new(InMemoryDocumentStore::new(), config());
    seed_players(pipeline.store(), &[("p1", "Ana"), ("p2", "Bo"), ("p3", "Cy")]);
    pipeline.record_match(&doubles("m1", &[(21, 15)])).unwrap();

    let stats = pipeline.run_until_idle().unwrap();

    let m = pipeline.store().get::<Match>("m1").unwrap().unwrap().data;
    assert!(m.rating_processed && m.h2h_processed);
    assert!(!m.rating_updates.contains_key("p4"));
    assert!(pipeline.store().get::<rivalry::model::Player>("p4").unwrap().is_none());
    assert_eq!(pipeline.store().count::<HeadToHeadRecord>().unwrap(), 4);
    // Nemesis runs for the three known players only.
    assert_eq!(stats.nemesis.settled(), 3);
}

#[test]
fn scheduled_match_does_not_enter_the_pipeline() {
    let pipeline = pipeline();
    seed_four(pipeline.store());
    let mut m = doubles("m1", &[(21, 15)]);
    m.status = rivalry::model::MatchStatus::Scheduled;

    assert!(!pipeline.record_match(&m).unwrap());
    let stats = pipeline.run_until_idle().unwrap();

    assert_eq!(stats.relayed, 0);
    assert!(pipeline.store().peek_outbox().unwrap().is_empty());
}
