use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::bus::Message;
use crate::store::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    InFlight,
    Published,
    Failed,
}

/// A message committed alongside documents, awaiting relay to its queue.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboxRecord {
    pub id: u64,
    pub queue: String,
    pub message: Message,
    pub occurred_at: DateTime<Utc>,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub locked_by: Option<String>,
    pub locked_until: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl OutboxRecord {
    pub fn pending(id: u64, queue: String, message: Message, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id,
            queue,
            message,
            occurred_at,
            status: OutboxStatus::Pending,
            attempts: 0,
            locked_by: None,
            locked_until: None,
            published_at: None,
            failed_at: None,
            last_error: None,
        }
    }
}

/// Storage side of the outbox.
///
/// Claiming marks records in flight under a lease; a claim whose lease
/// expires becomes claimable again.
pub trait OutboxStore: Send + Sync {
    /// All records in id order, whatever their status.
    fn peek_outbox(&self) -> Result<Vec<OutboxRecord>, StoreError>;

    /// Claim up to `max` pending (or lease-expired) records for `worker_id`.
    fn claim_outbox(
        &self,
        worker_id: &str,
        max: usize,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, StoreError>;

    fn complete_outbox(&self, ids: &[u64]) -> Result<(), StoreError>;

    /// Return claimed records to pending.
    fn release_outbox(&self, ids: &[u64], error: Option<&str>) -> Result<(), StoreError>;

    /// Give up on claimed records.
    fn fail_outbox(&self, ids: &[u64], error: Option<&str>) -> Result<(), StoreError>;

    /// Delete records published at least `older_than` ago. Returns how many were removed.
    fn purge_published(&self, older_than: Duration) -> Result<usize, StoreError>;
}

impl<T: OutboxStore> OutboxStore for std::sync::Arc<T> {
    fn peek_outbox(&self) -> Result<Vec<OutboxRecord>, StoreError> {
        (**self).peek_outbox()
    }

    fn claim_outbox(
        &self,
        worker_id: &str,
        max: usize,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        (**self).claim_outbox(worker_id, max, lease)
    }

    fn complete_outbox(&self, ids: &[u64]) -> Result<(), StoreError> {
        (**self).complete_outbox(ids)
    }

    fn release_outbox(&self, ids: &[u64], error: Option<&str>) -> Result<(), StoreError> {
        (**self).release_outbox(ids, error)
    }

    fn fail_outbox(&self, ids: &[u64], error: Option<&str>) -> Result<(), StoreError> {
        (**self).fail_outbox(ids, error)
    }

    fn purge_published(&self, older_than: Duration) -> Result<usize, StoreError> {
        (**self).purge_published(older_than)
    }
}
