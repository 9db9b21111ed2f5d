//! Background thread for a stage service listening on a named queue.

use std::sync::mpsc::{channel, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::warn;

use crate::bus::Listener;

use super::stage_service::{Settlement, StageService};

/// Statistics from a stage worker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStats {
    /// Deliveries acked after the handler committed.
    pub applied: usize,
    /// Deliveries acked without a write (duplicates, not ready, malformed).
    pub skipped: usize,
    /// Deliveries nacked for redelivery.
    pub retried: usize,
    /// Deliveries dead-lettered.
    pub rejected: usize,
    /// Number of poll cycles completed.
    pub polls: usize,
}

impl ServiceStats {
    pub fn record(&mut self, settlement: &Settlement) {
        match settlement {
            Settlement::Acked(outcome) if outcome.is_applied() => self.applied += 1,
            Settlement::Acked(_) => self.skipped += 1,
            Settlement::Nacked(_) => self.retried += 1,
            Settlement::Rejected(_) => self.rejected += 1,
        }
    }

    /// Deliveries settled in any way.
    pub fn settled(&self) -> usize {
        self.applied + self.skipped + self.retried + self.rejected
    }

    pub fn merge(&mut self, other: &ServiceStats) {
        self.applied += other.applied;
        self.skipped += other.skipped;
        self.retried += other.retried;
        self.rejected += other.rejected;
        self.polls += other.polls;
    }
}

/// A background thread that listens on one queue and dispatches every
/// delivery to a `StageService`.
///
/// ## Example
///
/// ```ignore
/// let worker = StageWorker::spawn(service, queues::RATING, queue.clone(), poll, budget);
/// // ... send messages to the queue ...
/// let stats = worker.stop();
/// println!("Applied {} matches", stats.applied);
/// ```
pub struct StageWorker {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<ServiceStats>>,
}

impl StageWorker {
    pub fn spawn<S, L>(
        service: Arc<StageService<S>>,
        queue_name: impl Into<String>,
        listener: L,
        poll_interval: Duration,
        budget: Duration,
    ) -> Self
    where
        S: Send + Sync + 'static,
        L: Listener + 'static,
    {
        let queue_name = queue_name.into();
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = ServiceStats::default();

            loop {
                match stop_rx.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                stats.polls += 1;

                match listener.listen(&queue_name, poll_interval.as_millis() as u64) {
                    Ok(Some(delivery)) => {
                        match service.process(&listener, &queue_name, &delivery, budget) {
                            Ok(settlement) => stats.record(&settlement),
                            Err(err) => warn!(queue = %queue_name, error = %err, "could not settle delivery"),
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(queue = %queue_name, error = %err, "listen failed");
                        thread::sleep(poll_interval);
                    }
                }
            }

            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the worker to stop and wait for it to finish.
    pub fn stop(mut self) -> ServiceStats {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => ServiceStats::default(),
        }
    }

    /// Signal the worker to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for StageWorker {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
