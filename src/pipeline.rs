//! Pipeline - wires the store, the outbox relay, the bus and the three stages.
//!
//! ```text
//! record_match ──▶ outbox ──relay──▶ "rating" ──▶ RatingStage
//!                                                   │ (commit + outbox)
//!                                   "head_to_head" ◀┘
//!                                          │
//!                                   HeadToHeadStage ──(commit + outbox)──▶ "nemesis" ──▶ NemesisStage
//! ```
//!
//! `run_until_idle` processes everything synchronously on the calling thread;
//! `spawn` starts one worker per stage plus a relay thread.

use std::sync::mpsc::{channel, Sender as StopSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bus::{InMemoryQueue, Listener, Sender};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::events::{queues, types, MatchCompleted};
use crate::model::Match;
use crate::outbox::{DrainResult, OutboxRelay, OutboxStore};
use crate::service::{ServiceStats, StageService, StageWorker};
use crate::stage::{HeadToHeadStage, NemesisStage, RatingStage};
use crate::store::{DocumentStore, Transaction, Versioned};

/// Counters from a pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub relayed: usize,
    pub rating: ServiceStats,
    pub head_to_head: ServiceStats,
    pub nemesis: ServiceStats,
}

impl PipelineStats {
    fn stage_mut(&mut self, queue: &str) -> Option<&mut ServiceStats> {
        match queue {
            queues::RATING => Some(&mut self.rating),
            queues::HEAD_TO_HEAD => Some(&mut self.head_to_head),
            queues::NEMESIS => Some(&mut self.nemesis),
            _ => None,
        }
    }
}

struct StageBinding<S> {
    queue: &'static str,
    service: Arc<StageService<S>>,
    budget: Duration,
}

/// The match outcome pipeline.
pub struct Pipeline<S, Q = InMemoryQueue> {
    store: S,
    queue: Q,
    relay: OutboxRelay,
    config: PipelineConfig,
    stages: Vec<StageBinding<S>>,
}

impl<S> Pipeline<S, InMemoryQueue>
where
    S: DocumentStore + OutboxStore + Clone + 'static,
{
    /// A pipeline over `store` with an in-memory bus.
    pub fn new(store: S, config: PipelineConfig) -> Self {
        let queue = InMemoryQueue::new().with_max_deliveries(config.delivery.max_deliveries);
        Self::with_queue(store, queue, config)
    }
}

impl<S, Q> Pipeline<S, Q>
where
    S: DocumentStore + OutboxStore + Clone + 'static,
    Q: Sender + Listener + Clone + 'static,
{
    pub fn with_queue(store: S, queue: Q, config: PipelineConfig) -> Self {
        let delivery = &config.delivery;
        let attempts = delivery.max_commit_attempts;
        let relay = OutboxRelay::from_config(delivery);

        let rating = RatingStage::new(config.rating.clone(), attempts);
        let head_to_head = HeadToHeadStage::new(&config.rating, attempts);
        let nemesis = NemesisStage::new(config.nemesis.clone(), attempts);

        let stages = vec![
            StageBinding {
                queue: queues::RATING,
                service: Arc::new(
                    StageService::new(store.clone())
                        .on(types::MATCH_COMPLETED, move |s, m| rating.handle_message(s, m)),
                ),
                budget: delivery.rating_budget(),
            },
            StageBinding {
                queue: queues::HEAD_TO_HEAD,
                service: Arc::new(
                    StageService::new(store.clone()).on(types::MATCH_RATING_PROCESSED, move |s, m| {
                        head_to_head.handle_message(s, m)
                    }),
                ),
                budget: delivery.head_to_head_budget(),
            },
            StageBinding {
                queue: queues::NEMESIS,
                service: Arc::new(
                    StageService::new(store.clone())
                        .on(types::HEAD_TO_HEAD_CHANGED, move |s, m| nemesis.handle_message(s, m)),
                ),
                budget: delivery.nemesis_budget(),
            },
        ];

        Self {
            relay,
            store,
            queue,
            config,
            stages,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Write a match on behalf of the scheduling surface.
    ///
    /// Completion markers already set on the stored match are kept. When the
    /// written match awaits rating, a `match.completed` message is committed
    /// to the outbox with it. Returns whether that message was staged.
    pub fn record_match(&self, m: &Match) -> Result<bool, PipelineError> {
        let existing = self.store.get::<Match>(&m.id)?;
        let mut doc = Versioned {
            data: m.clone(),
            version: existing.as_ref().map_or(0, |e| e.version),
        };

        if let Some(existing) = &existing {
            let stored = &existing.data;
            if stored.rating_processed && !doc.data.rating_processed {
                doc.data.rating_processed = true;
                doc.data.rating_processed_at = stored.rating_processed_at;
                doc.data.rating_updates = stored.rating_updates.clone();
            }
            if stored.h2h_processed && !doc.data.h2h_processed {
                doc.data.h2h_processed = true;
                doc.data.h2h_processed_at = stored.h2h_processed_at;
            }
        }

        let triggered = doc.data.awaits_rating();
        let mut tx = Transaction::new();
        tx.save(&doc)?;
        if triggered {
            let message = MatchCompleted {
                match_id: m.id.clone(),
            }
            .message()?;
            tx.send(queues::RATING, message);
        }
        self.store.commit(tx)?;

        debug!(match_id = %m.id, triggered, "match recorded");
        Ok(triggered)
    }

    /// Send `match.completed` for a match directly, bypassing the outbox.
    pub fn signal_match_completed(&self, match_id: &str) -> Result<(), PipelineError> {
        let message = MatchCompleted {
            match_id: match_id.to_string(),
        }
        .message()?;
        self.queue.send(queues::RATING, message)?;
        Ok(())
    }

    /// Forward every claimable outbox record to the bus.
    pub fn relay(&self) -> Result<DrainResult, PipelineError> {
        Ok(self.relay.drain_all(&self.store, &self.queue)?)
    }

    /// Relay and process on the calling thread until no stage has work left.
    pub fn run_until_idle(&self) -> Result<PipelineStats, PipelineError> {
        let mut stats = PipelineStats::default();

        loop {
            let relayed = self.relay()?;
            stats.relayed += relayed.completed;
            let mut progressed = relayed.claimed > 0;

            for binding in &self.stages {
                while let Some(delivery) = self.queue.listen(binding.queue, 0)? {
                    progressed = true;
                    let settlement =
                        binding
                            .service
                            .process(&self.queue, binding.queue, &delivery, binding.budget)?;
                    if let Some(stage) = stats.stage_mut(binding.queue) {
                        stage.record(&settlement);
                    }
                }
            }

            if !progressed {
                break;
            }
        }

        info!(
            relayed = stats.relayed,
            rated = stats.rating.applied,
            head_to_head = stats.head_to_head.applied,
            nemesis = stats.nemesis.applied,
            "pipeline idle"
        );
        Ok(stats)
    }

    /// Start one worker thread per stage and a relay thread.
    pub fn spawn(&self) -> PipelineHandle {
        let poll = self.config.delivery.poll_interval();

        let workers = self
            .stages
            .iter()
            .map(|binding| {
                (
                    binding.queue,
                    StageWorker::spawn(
                        Arc::clone(&binding.service),
                        binding.queue,
                        self.queue.clone(),
                        poll,
                        binding.budget,
                    ),
                )
            })
            .collect();

        let (stop_tx, stop_rx) = channel();
        let store = self.store.clone();
        let queue = self.queue.clone();
        let relay = self.relay.clone();
        let relay_thread = thread::spawn(move || {
            let mut relayed = 0;
            loop {
                match stop_rx.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }
                match relay.drain_all(&store, &queue) {
                    Ok(result) => relayed += result.completed,
                    Err(err) => warn!(error = %err, "outbox relay failed"),
                }
                thread::sleep(poll);
            }
            relayed
        });

        PipelineHandle {
            workers,
            relay_stop: stop_tx,
            relay_thread: Some(relay_thread),
        }
    }
}

/// Running pipeline threads.
pub struct PipelineHandle {
    workers: Vec<(&'static str, StageWorker)>,
    relay_stop: StopSender<()>,
    relay_thread: Option<JoinHandle<usize>>,
}

impl PipelineHandle {
    /// Stop every thread and collect their statistics.
    pub fn stop(mut self) -> PipelineStats {
        let mut stats = PipelineStats::default();

        let _ = self.relay_stop.send(());
        if let Some(handle) = self.relay_thread.take() {
            stats.relayed = handle.join().unwrap_or_default();
        }

        for (queue, worker) in std::mem::take(&mut self.workers) {
            let worker_stats = worker.stop();
            if let Some(stage) = stats.stage_mut(queue) {
                stage.merge(&worker_stats);
            }
        }
        stats
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        let _ = self.relay_stop.send(());
    }
}
