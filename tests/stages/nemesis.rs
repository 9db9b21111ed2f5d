use rivalry::model::{HeadToHeadRecord, Player};
use rivalry::stage::{select_nemesis, NemesisStage, SkipReason, StageOutcome};
use rivalry::{DocumentStore, InMemoryDocumentStore, NemesisConfig};

use crate::support::fixtures::player;

fn h2h(owner: &str, opponent: &str, won: u32, lost: u32) -> HeadToHeadRecord {
    let mut record = HeadToHeadRecord::new(owner, opponent);
    record.opponent_name = opponent.to_uppercase();
    record.won = won;
    record.lost = lost;
    record.played = won + lost;
    record
}

fn pick(records: &[HeadToHeadRecord]) -> Option<String> {
    select_nemesis(records, &NemesisConfig::default()).map(|n| n.opponent_id)
}

#[test]
fn too_few_matches_never_qualify() {
    assert_eq!(pick(&[h2h("p1", "p3", 0, 2)]), None);
    assert_eq!(pick(&[h2h("p1", "p3", 0, 3)]).as_deref(), Some("p3"));
}

#[test]
fn an_even_record_is_not_a_nemesis() {
    assert_eq!(pick(&[h2h("p1", "p3", 3, 3)]), None);
    assert_eq!(pick(&[h2h("p1", "p3", 2, 4)]).as_deref(), Some("p3"));
    assert_eq!(pick(&[h2h("p1", "p3", 4, 2)]), None);
}

#[test]
fn most_losses_then_most_played_then_lowest_id() {
    assert_eq!(
        pick(&[h2h("p1", "p4", 0, 3), h2h("p1", "p3", 0, 3)]).as_deref(),
        Some("p3")
    );
    assert_eq!(
        pick(&[h2h("p1", "p3", 0, 3), h2h("p1", "p5", 1, 3)]).as_deref(),
        Some("p5")
    );
    assert_eq!(
        pick(&[h2h("p1", "p5", 1, 3), h2h("p1", "p6", 0, 4)]).as_deref(),
        Some("p6")
    );
}

#[test]
fn stage_writes_only_when_the_designation_changes() {
    let store = InMemoryDocumentStore::new();
    store.upsert(&Player::new("p1")).unwrap();
    store.upsert(&h2h("p1", "p3", 0, 2)).unwrap();
    store.upsert(&h2h("p1", "p4", 1, 2)).unwrap();
    store.upsert(&h2h("p2", "p3", 0, 5)).unwrap();
    let stage = NemesisStage::new(NemesisConfig::default(), 5);

    assert!(stage.process(&store, "p1").unwrap().is_applied());
    let nemesis = player(&store, "p1").nemesis.unwrap();
    assert_eq!(nemesis.opponent_id, "p4");
    assert_eq!(nemesis.opponent_name, "P4");
    assert_eq!((nemesis.matches_won, nemesis.matches_lost), (1, 2));

    assert_eq!(
        stage.process(&store, "p1").unwrap(),
        StageOutcome::Skipped(SkipReason::Unchanged)
    );
    let version = store.get::<Player>("p1").unwrap().unwrap().version;

    store.upsert(&h2h("p1", "p3", 0, 4)).unwrap();
    assert!(stage.process(&store, "p1").unwrap().is_applied());
    assert_eq!(player(&store, "p1").nemesis.unwrap().opponent_id, "p3");
    assert_eq!(
        store.get::<Player>("p1").unwrap().unwrap().version,
        version + 1
    );
}

#[test]
fn designation_clears_when_no_opponent_qualifies() {
    let store = InMemoryDocumentStore::new();
    store.upsert(&Player::new("p1")).unwrap();
    store.upsert(&h2h("p1", "p3", 0, 3)).unwrap();
    let stage = NemesisStage::new(NemesisConfig::default(), 5);
    stage.process(&store, "p1").unwrap();

    store.upsert(&h2h("p1", "p3", 3, 3)).unwrap();
    assert!(stage.process(&store, "p1").unwrap().is_applied());
    assert!(player(&store, "p1").nemesis.is_none());
}

#[test]
fn unknown_player_is_skipped() {
    let store = InMemoryDocumentStore::new();
    assert_eq!(
        NemesisStage::new(NemesisConfig::default(), 5)
            .process(&store, "ghost")
            .unwrap(),
        StageOutcome::Skipped(SkipReason::PlayerNotFound)
    );
}
