use std::thread;
use std::time::{Duration, Instant};

use rivalry::outbox::{OutboxStatus, OutboxStore};

use crate::support::fixtures::{doubles, pipeline, player, seed_four};

#[test]
fn background_workers_reach_the_same_result() {
    let pipeline = pipeline();
    seed_four(pipeline.store());
    let handle = pipeline.spawn();

    for (id, sets) in [("m1", [(19, 21)]), ("m2", [(18, 21)]), ("m3", [(17, 21)])] {
        pipeline.record_match(&doubles(id, &sets)).unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        // Nemesis updates produce no further messages, so once all 18 are
        // on the bus and the bus is idle nothing is left to do.
        let settled = pipeline.queue().sent().len() == 18 && pipeline.queue().is_idle();
        if settled || Instant::now() > deadline {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    let stats = handle.stop();

    assert_eq!(stats.rating.applied, 3);
    assert_eq!(stats.head_to_head.applied, 3);
    assert_eq!(stats.relayed, 18);
    assert_eq!(player(pipeline.store(), "p1").nemesis.unwrap().opponent_id, "p3");
    let outbox = pipeline.store().peek_outbox().unwrap();
    assert!(outbox.iter().all(|r| r.status == OutboxStatus::Published));
    assert_eq!(player(pipeline.store(), "p3").wins, 3);
}
