use std::thread;

use rivalry::model::{Match, Player, RatingHistoryEntry};
use rivalry::stage::{RatingStage, SkipReason, StageOutcome};
use rivalry::{DocumentStore, InMemoryDocumentStore, RatingConfig};

use crate::support::fixtures::{
    assert_close, completed, doubles, player, rating, seed_four, seed_rated,
};
use crate::support::flaky_store::FlakyStore;

fn stage() -> RatingStage {
    RatingStage::new(RatingConfig::default(), 5)
}

#[test]
fn winners_gain_exactly_what_losers_give_up() {
    let store = InMemoryDocumentStore::new();
    seed_rated(&store, &[("p1", 1700.0), ("p2", 1500.0), ("p3", 1600.0), ("p4", 1600.0)]);
    store.upsert(&doubles("m1", &[(21, 15), (21, 19)])).unwrap();

    stage().process(&store, "m1").unwrap();

    // Team A rates at 0.7 * 1500 + 0.3 * 1700 = 1560 against 1600.
    let expected = 1.0 / (1.0 + 10f64.powf(40.0 / 400.0));
    let delta = 32.0 * (1.0 - expected);
    assert_close(rating(&store, "p1"), 1700.0 + delta);
    assert_close(rating(&store, "p2"), 1500.0 + delta);
    assert_close(rating(&store, "p3"), 1600.0 - delta);
    assert_close(rating(&store, "p4"), 1600.0 - delta);

    let m = store.get::<Match>("m1").unwrap().unwrap().data;
    let total: f64 = m.rating_updates.values().map(|u| u.delta).sum();
    assert_close(total, 0.0);
}

#[test]
fn rerunning_a_rated_match_changes_nothing() {
    let store = InMemoryDocumentStore::new();
    seed_four(&store);
    store.upsert(&doubles("m1", &[(21, 10)])).unwrap();

    assert!(stage().process(&store, "m1").unwrap().is_applied());
    let after_first: Vec<Player> = ["p1", "p2", "p3", "p4"]
        .iter()
        .map(|id| player(&store, id))
        .collect();

    for _ in 0..3 {
        assert_eq!(
            stage().process(&store, "m1").unwrap(),
            StageOutcome::Skipped(SkipReason::AlreadyProcessed)
        );
    }

    let after_reruns: Vec<Player> = ["p1", "p2", "p3", "p4"]
        .iter()
        .map(|id| player(&store, id))
        .collect();
    assert_eq!(after_first, after_reruns);
    assert_eq!(store.count::<RatingHistoryEntry>().unwrap(), 4);
}

#[test]
fn concurrent_attempt_loses_the_check_and_set() {
    let store = FlakyStore::new();
    seed_four(store.inner());
    store.inner().upsert(&doubles("m1", &[(21, 17)])).unwrap();

    // Another worker rates the match between our read and our commit.
    store.before_next_commit(|inner| {
        RatingStage::new(RatingConfig::default(), 1)
            .process(inner, "m1")
            .unwrap();
    });

    let outcome = stage().process(&store, "m1").unwrap();

    assert_eq!(outcome, StageOutcome::Skipped(SkipReason::AlreadyProcessed));
    assert_eq!(player(&store, "p1").rating.rated_matches, 1);
    assert_eq!(player(&store, "p3").losses, 1);
    assert_eq!(store.inner().count::<RatingHistoryEntry>().unwrap(), 4);
}

#[test]
fn parallel_matches_sharing_players_lose_no_updates() {
    let store = InMemoryDocumentStore::new();
    seed_four(&store);
    store.upsert(&doubles("m1", &[(21, 17)])).unwrap();
    store
        .upsert(&completed("m2", &["p1", "p3"], &["p2", "p4"], &[(15, 21)]))
        .unwrap();

    let handles: Vec<_> = ["m1", "m2"]
        .into_iter()
        .map(|id| {
            let store = store.clone();
            thread::spawn(move || {
                RatingStage::new(RatingConfig::default(), 50)
                    .process(&store, id)
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().is_applied());
    }

    for id in ["p1", "p2", "p3", "p4"] {
        let p = player(&store, id);
        assert_eq!(p.rating.rated_matches, 2, "{id}");
        assert_eq!(p.wins + p.losses, 2, "{id}");
        assert_eq!(p.recent_match_ids.len(), 2, "{id}");
    }
    assert_eq!(player(&store, "p1").wins, 1);
    assert_eq!(player(&store, "p4").losses, 1);
}

#[test]
fn best_win_only_moves_to_a_stronger_beaten_team() {
    let store = InMemoryDocumentStore::new();
    seed_rated(
        &store,
        &[
            ("p1", 1600.0),
            ("p2", 1600.0),
            ("a1", 1500.0),
            ("a2", 1500.0),
            ("b1", 1700.0),
            ("b2", 1700.0),
            ("c1", 1900.0),
            ("c2", 1900.0),
            ("d1", 1650.0),
            ("d2", 1650.0),
        ],
    );
    let schedule = [
        ("m1", ["a1", "a2"], (21, 12)),
        ("m2", ["b1", "b2"], (21, 19)),
        ("m3", ["c1", "c2"], (14, 21)),
        ("m4", ["d1", "d2"], (21, 18)),
    ];

    let mut best = Vec::new();
    for (id, opponents, score) in schedule {
        store
            .upsert(&completed(id, &["p1", "p2"], &opponents, &[score]))
            .unwrap();
        stage().process(&store, id).unwrap();
        best.push(player(&store, "p1").best_win.unwrap());
    }

    let ids: Vec<&str> = best.iter().map(|b| b.match_id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m2", "m2"]);
    assert_close(best[0].opponent_team_rating, 1500.0);
    assert_close(best[3].opponent_team_rating, 1700.0);
    assert!(best[3].rating_gained > 0.0);
    let p2 = player(&store, "p2");
    assert_eq!(p2.best_win.unwrap().opponent_names, "B1 & B2");
    assert_eq!(p2.current_streak, 1);
    assert_eq!((p2.wins, p2.losses), (3, 1));
}

#[test]
fn losing_streak_and_teammate_record_accumulate() {
    let store = InMemoryDocumentStore::new();
    seed_four(&store);
    for (id, sets) in [("m1", [(19, 21)]), ("m2", [(18, 21)]), ("m3", [(17, 21)])] {
        store.upsert(&doubles(id, &sets)).unwrap();
        stage().process(&store, id).unwrap();
    }

    let p1 = player(&store, "p1");
    assert_eq!(p1.current_streak, -3);
    assert_eq!(p1.recent_match_ids, vec!["m3", "m2", "m1"]);
    assert!(p1.rating.current.unwrap() < 1600.0);
    assert!(p1.rating.peak.unwrap() > p1.rating.current.unwrap());

    let with_p2 = &p1.teammate_stats["p2"];
    assert_eq!(with_p2.teammate_name, "Bo");
    assert_eq!((with_p2.played, with_p2.won, with_p2.lost), (3, 0, 3));
    assert_eq!(with_p2.points_scored, 54);
    assert_eq!(with_p2.points_allowed, 63);

    assert_eq!(p1.point_stats.lost_sets, 3);
    assert_eq!(p1.point_stats.lost_sets_differential, -9);
    assert_eq!(p1.point_stats.won_sets, 0);
    assert_eq!(player(&store, "p3").current_streak, 3);
}

#[test]
fn peak_never_drops_below_a_rating_already_held() {
    let store = InMemoryDocumentStore::new();
    seed_four(&store);
    let mut imported = Player::new("p5").with_display_name("Ed");
    imported.rating.current = Some(1800.0);
    store.upsert(&imported).unwrap();
    seed_rated(&store, &[("p6", 1800.0)]);

    store.upsert(&doubles("m1", &[(19, 21)])).unwrap();
    store
        .upsert(&completed("m2", &["p5", "p1"], &["p6", "p3"], &[(15, 21)]))
        .unwrap();
    stage().process(&store, "m1").unwrap();
    stage().process(&store, "m2").unwrap();

    let fresh = player(&store, "p2");
    assert!(fresh.rating.current.unwrap() < 1600.0);
    assert_eq!(fresh.rating.peak, Some(1600.0));
    assert!(fresh.rating.peak_at.is_none());

    let p5 = player(&store, "p5");
    assert!(p5.rating.current.unwrap() < 1800.0);
    assert_eq!(p5.rating.peak, Some(1800.0));
}
