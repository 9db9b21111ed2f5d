use rivalry::events::queues;
use rivalry::model::{HeadToHeadRecord, Match, RatingHistoryEntry};
use rivalry::outbox::OutboxStore;
use rivalry::{DocumentStore, InMemoryDocumentStore, Pipeline};

use crate::support::fixtures::{completed, config, doubles, pipeline, player, seed_four};
use crate::support::flaky_store::FlakyStore;

#[test]
fn duplicate_signals_rate_a_match_once() {
    let pipeline = pipeline();
    seed_four(pipeline.store());
    pipeline.record_match(&doubles("m1", &[(21, 18)])).unwrap();
    pipeline.signal_match_completed("m1").unwrap();
    pipeline.signal_match_completed("m1").unwrap();

    let stats = pipeline.run_until_idle().unwrap();

    assert_eq!(stats.rating.applied, 1);
    assert_eq!(stats.rating.skipped, 2);
    assert_eq!(stats.head_to_head.applied, 1);
    let p1 = player(pipeline.store(), "p1");
    assert_eq!(p1.rating.rated_matches, 1);
    assert_eq!(p1.wins, 1);
    assert_eq!(p1.recent_match_ids, vec!["m1"]);
    let record = pipeline
        .store()
        .get::<HeadToHeadRecord>(&HeadToHeadRecord::record_id("p1", "p3"))
        .unwrap()
        .unwrap();
    assert_eq!(record.data.played, 1);
}

#[test_log::test]
fn transient_store_failure_is_redelivered() {
    let store = FlakyStore::new();
    let pipeline = Pipeline::new(store.clone(), config());
    seed_four(store.inner());
    pipeline.record_match(&doubles("m1", &[(21, 18)])).unwrap();

    store.fail_next_commits(2);
    let stats = pipeline.run_until_idle().unwrap();

    assert_eq!(stats.rating.retried, 2);
    assert_eq!(stats.rating.applied, 1);
    assert_eq!(stats.head_to_head.applied, 1);
    assert!(pipeline.queue().dead_letters().is_empty());
    assert_eq!(player(&store, "p1").rating.rated_matches, 1);
    assert_eq!(store.inner().count::<RatingHistoryEntry>().unwrap(), 4);
}

#[test]
fn persistent_failure_dead_letters_and_can_be_replayed() {
    let store = FlakyStore::new();
    let pipeline = Pipeline::new(store.clone(), config().with_max_deliveries(3));
    seed_four(store.inner());
    pipeline.record_match(&doubles("m1", &[(21, 18)])).unwrap();

    store.fail_next_commits(usize::MAX);
    let stats = pipeline.run_until_idle().unwrap();

    assert_eq!(stats.rating.retried, 3);
    let dead = pipeline.queue().dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].queue, queues::RATING);
    assert_eq!(dead[0].attempts, 3);
    let m = store.get::<Match>("m1").unwrap().unwrap().data;
    assert!(!m.rating_processed);

    store.fail_next_commits(0);
    pipeline.signal_match_completed("m1").unwrap();
    let stats = pipeline.run_until_idle().unwrap();

    assert_eq!(stats.rating.applied, 1);
    assert_eq!(player(&store, "p4").losses, 1);
}

#[test]
fn invalid_rosters_are_dead_lettered_without_retry() {
    let pipeline = pipeline();
    seed_four(pipeline.store());
    let m = completed("m1", &["p1", "p2"], &["p2", "p3"], &[(21, 10)]);
    pipeline.record_match(&m).unwrap();

    let stats = pipeline.run_until_idle().unwrap();

    assert_eq!(stats.rating.rejected, 1);
    assert_eq!(stats.rating.retried, 0);
    let dead = pipeline.queue().dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempts, 1);
    assert!(dead[0].reason.contains("on both teams"), "{}", dead[0].reason);
    assert_eq!(player(pipeline.store(), "p2").rating.current, None);
}

#[test]
fn player_ids_that_would_collide_in_record_keys_are_rejected() {
    let pipeline = pipeline();
    seed_four(pipeline.store());
    let m = completed("m1", &["p1", "p2"], &["p3", "p4:x"], &[(21, 10)]);
    pipeline.record_match(&m).unwrap();

    let stats = pipeline.run_until_idle().unwrap();

    assert_eq!(stats.rating.rejected, 1);
    let dead = pipeline.queue().dead_letters();
    assert!(dead[0].reason.contains("p4:x"), "{}", dead[0].reason);
    assert_eq!(pipeline.store().count::<HeadToHeadRecord>().unwrap(), 0);
    assert_eq!(player(pipeline.store(), "p1").rating.current, None);
}

#[test]
fn messages_stay_in_the_outbox_until_relayed() {
    let pipeline = pipeline();
    seed_four(pipeline.store());
    pipeline.record_match(&doubles("m1", &[(21, 18)])).unwrap();

    assert_eq!(pipeline.queue().pending_len(queues::RATING), 0);
    let drained = pipeline.relay().unwrap();
    assert_eq!((drained.claimed, drained.completed), (1, 1));
    assert_eq!(pipeline.queue().pending_len(queues::RATING), 1);
    assert!(pipeline.relay().unwrap().is_empty());
}

#[test]
fn long_runs_do_not_retain_relayed_messages() {
    let pipeline = Pipeline::new(InMemoryDocumentStore::new(), config());
    seed_four(pipeline.store());
    for i in 0..50 {
        let sets = if i % 2 == 0 { [(21, 17)] } else { [(15, 21)] };
        pipeline.record_match(&doubles(&format!("m{i}"), &sets)).unwrap();
    }

    let stats = pipeline.run_until_idle().unwrap();

    assert_eq!(stats.rating.applied, 50);
    assert_eq!(stats.relayed, 50 * 6);
    assert!(pipeline.store().peek_outbox().unwrap().is_empty());
    assert!(pipeline.queue().sent().is_empty());
    assert!(pipeline.queue().is_idle());
}
