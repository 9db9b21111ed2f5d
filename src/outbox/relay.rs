use std::time::Duration;

use tracing::{debug, warn};

use crate::bus::Sender;
use crate::config::DeliveryConfig;
use crate::store::StoreError;

use super::OutboxStore;

/// Result of a batch drain operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainResult {
    pub claimed: usize,
    pub completed: usize,
    pub released: usize,
    pub failed: usize,
    /// Published records deleted after the drain.
    pub purged: usize,
}

impl DrainResult {
    pub fn is_empty(&self) -> bool {
        self.claimed == 0
    }
}

/// Forwards committed outbox records to their queues.
///
/// A record that could not be sent is released for another attempt until it
/// has been claimed `max_attempts` times, then marked failed. A crash between
/// send and complete leaves the lease to expire and the record is sent again.
/// Published records are kept for `retention`, then purged by `drain_all`.
#[derive(Debug, Clone)]
pub struct OutboxRelay {
    worker_id: String,
    batch_size: usize,
    lease: Duration,
    max_attempts: u32,
    retention: Duration,
}

impl Default for OutboxRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboxRelay {
    pub fn new() -> Self {
        Self {
            worker_id: format!("relay-{}", std::process::id()),
            batch_size: 64,
            lease: Duration::from_secs(30),
            max_attempts: 5,
            retention: Duration::ZERO,
        }
    }

    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self::new()
            .with_batch_size(config.batch_size)
            .with_lease(config.lease())
            .with_max_attempts(config.max_attempts)
            .with_retention(config.outbox_retention())
    }

    /// Set the worker ID (used for lease tracking).
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    /// Set the batch size (max records claimed per drain).
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Set the maximum number of attempts before failing a record.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// Keep published records this long before purging them.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Claim one batch and forward it.
    pub fn drain<O, S>(&self, store: &O, sender: &S) -> Result<DrainResult, StoreError>
    where
        O: OutboxStore + ?Sized,
        S: Sender + ?Sized,
    {
        let records = store.claim_outbox(&self.worker_id, self.batch_size, self.lease)?;
        let mut result = DrainResult {
            claimed: records.len(),
            ..Default::default()
        };

        for record in records {
            match sender.send(&record.queue, record.message.clone()) {
                Ok(()) => {
                    store.complete_outbox(&[record.id])?;
                    result.completed += 1;
                    debug!(
                        outbox_id = record.id,
                        queue = %record.queue,
                        event_type = %record.message.event_type,
                        "relayed outbox record"
                    );
                }
                Err(err) => {
                    let error = err.to_string();
                    if record.attempts >= self.max_attempts {
                        store.fail_outbox(&[record.id], Some(&error))?;
                        result.failed += 1;
                        warn!(outbox_id = record.id, attempts = record.attempts, %error, "outbox record failed");
                    } else {
                        store.release_outbox(&[record.id], Some(&error))?;
                        result.released += 1;
                    }
                }
            }
        }

        Ok(result)
    }

    /// Drain until nothing is claimable, then purge published records past retention.
    pub fn drain_all<O, S>(&self, store: &O, sender: &S) -> Result<DrainResult, StoreError>
    where
        O: OutboxStore + ?Sized,
        S: Sender + ?Sized,
    {
        let mut total = DrainResult::default();
        loop {
            let batch = self.drain(store, sender)?;
            total.claimed += batch.claimed;
            total.completed += batch.completed;
            total.released += batch.released;
            total.failed += batch.failed;
            // Released records are claimable again immediately; stop once a batch made no progress.
            if batch.is_empty() || (batch.completed == 0 && batch.failed == 0) {
                break;
            }
        }

        total.purged = store.purge_published(self.retention)?;
        if total.purged > 0 {
            debug!(purged = total.purged, "purged published outbox records");
        }
        Ok(total)
    }
}
