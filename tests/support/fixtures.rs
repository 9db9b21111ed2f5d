//! Players, matches and pipelines for tests.

use std::time::Duration;

use chrono::Utc;
use rivalry::bus::InMemoryQueue;
use rivalry::model::{Match, MatchResult, Player, SetScore, Side, Teams};
use rivalry::{DocumentStore, InMemoryDocumentStore, Pipeline, PipelineConfig};

/// Store `(id, name)` players with no rating yet.
pub fn seed_players<S: DocumentStore>(store: &S, players: &[(&str, &str)]) {
    for (id, name) in players {
        store
            .upsert(&Player::new(*id).with_display_name(*name))
            .unwrap();
    }
}

/// Store `(id, rating)` players named after their id.
pub fn seed_rated<S: DocumentStore>(store: &S, players: &[(&str, f64)]) {
    for (id, rating) in players {
        store
            .upsert(&Player::new(*id).with_display_name(id.to_uppercase()).with_rating(*rating))
            .unwrap();
    }
}

/// The usual four: p1 & p2 against p3 & p4.
pub fn seed_four<S: DocumentStore>(store: &S) {
    seed_players(store, &[("p1", "Ana"), ("p2", "Bo"), ("p3", "Cy"), ("p4", "Di")]);
}

/// A completed match; the winner is the side that took more sets.
pub fn completed(id: &str, team_a: &[&str], team_b: &[&str], sets: &[(u32, u32)]) -> Match {
    let sets: Vec<SetScore> = sets.iter().map(|(a, b)| SetScore::new(*a, *b)).collect();
    let a_sets = sets.iter().filter(|s| s.winner == Side::TeamA).count();
    let winner = if a_sets * 2 > sets.len() {
        Side::TeamA
    } else {
        Side::TeamB
    };
    Match::scheduled(id, Teams::new(team_a.iter().copied(), team_b.iter().copied()))
        .with_title(format!("Match {id}"))
        .complete(MatchResult::single_game(winner, sets), Utc::now())
}

/// p1 & p2 against p3 & p4.
pub fn doubles(id: &str, sets: &[(u32, u32)]) -> Match {
    completed(id, &["p1", "p2"], &["p3", "p4"], sets)
}

pub fn config() -> PipelineConfig {
    PipelineConfig::default().with_poll_interval(Duration::from_millis(1))
}

/// A pipeline whose queue logs every send.
pub fn pipeline() -> Pipeline<InMemoryDocumentStore> {
    let config = config();
    let queue = InMemoryQueue::new()
        .with_max_deliveries(config.delivery.max_deliveries)
        .with_send_log();
    Pipeline::with_queue(InMemoryDocumentStore::new(), queue, config)
}

pub fn player<S: DocumentStore>(store: &S, id: &str) -> Player {
    store.get::<Player>(id).unwrap().unwrap().data
}

pub fn rating<S: DocumentStore>(store: &S, id: &str) -> f64 {
    player(store, id).rating.current.unwrap_or(1600.0)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
