//! InMemoryDocumentStore - BTreeMap-backed document store for tests, replays and development.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;

use crate::outbox::{OutboxRecord, OutboxStatus, OutboxStore};

use super::{make_key, CommitReceipt, Document, DocumentStore, StoreError, Transaction, Versioned};

/// Internal stored representation of a document.
struct StoredDocument {
    bytes: Vec<u8>,
    version: u64,
}

#[derive(Default)]
struct State {
    documents: BTreeMap<String, StoredDocument>,
    outbox: Vec<OutboxRecord>,
    outbox_seq: u64,
}

/// In-memory document store.
///
/// Storage key is `"COLLECTION:id"`. Documents and the outbox live behind a
/// single lock so a commit is atomic with respect to every reader.
/// Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))
    }

    /// Number of documents stored in the collection of `D`.
    pub fn count<D: Document>(&self) -> Result<usize, StoreError> {
        let state = self.read()?;
        Ok(prefixed(&state, &make_key(D::COLLECTION, "")).count())
    }
}

fn decode<D: Document>(stored: &StoredDocument) -> Result<Versioned<D>, StoreError> {
    let data = serde_json::from_slice(&stored.bytes).map_err(|e| StoreError::Serde(e.to_string()))?;
    Ok(Versioned {
        data,
        version: stored.version,
    })
}

fn prefixed<'a>(state: &'a State, prefix: &'a str) -> impl Iterator<Item = &'a StoredDocument> + 'a {
    state
        .documents
        .range(prefix.to_string()..)
        .take_while(move |(key, _)| key.starts_with(prefix))
        .map(|(_, stored)| stored)
}

impl DocumentStore for InMemoryDocumentStore {
    fn get<D: Document>(&self, id: &str) -> Result<Option<Versioned<D>>, StoreError> {
        let key = make_key(D::COLLECTION, id);
        let state = self.read()?;
        state.documents.get(&key).map(decode).transpose()
    }

    fn find<D: Document>(
        &self,
        predicate: &dyn Fn(&D) -> bool,
    ) -> Result<Vec<Versioned<D>>, StoreError> {
        let state = self.read()?;
        let mut results = Vec::new();
        for stored in prefixed(&state, &make_key(D::COLLECTION, "")) {
            let versioned = decode::<D>(stored)?;
            if predicate(&versioned.data) {
                results.push(versioned);
            }
        }
        Ok(results)
    }

    fn scan<D: Document>(&self, id_prefix: &str) -> Result<Vec<Versioned<D>>, StoreError> {
        let state = self.read()?;
        prefixed(&state, &make_key(D::COLLECTION, id_prefix))
            .map(decode)
            .collect()
    }

    fn commit(&self, tx: Transaction) -> Result<CommitReceipt, StoreError> {
        let mut state = self.write()?;

        for staged in &tx.writes {
            let actual = state.documents.get(&staged.key).map(|s| s.version);
            if !staged.expect.holds(actual) {
                return Err(StoreError::Conflict {
                    key: staged.key.clone(),
                    expected: staged.expect,
                    actual,
                });
            }
        }

        let receipt = CommitReceipt {
            documents: tx.writes.len(),
            messages: tx.messages.len(),
        };

        for staged in tx.writes {
            let version = state
                .documents
                .get(&staged.key)
                .map(|s| s.version + 1)
                .unwrap_or(1);
            state.documents.insert(
                staged.key,
                StoredDocument {
                    bytes: staged.bytes,
                    version,
                },
            );
        }

        let now = Utc::now();
        for staged in tx.messages {
            state.outbox_seq += 1;
            let id = state.outbox_seq;
            state
                .outbox
                .push(OutboxRecord::pending(id, staged.queue, staged.message, now));
        }

        Ok(receipt)
    }
}

impl OutboxStore for InMemoryDocumentStore {
    fn peek_outbox(&self) -> Result<Vec<OutboxRecord>, StoreError> {
        Ok(self.read()?.outbox.clone())
    }

    fn claim_outbox(
        &self,
        worker_id: &str,
        max: usize,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let mut state = self.write()?;
        let now = Utc::now();
        let lease = chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::zero());
        let mut claimed = Vec::new();

        for record in state.outbox.iter_mut() {
            if claimed.len() >= max {
                break;
            }

            let expired = record.locked_until.map(|until| until <= now).unwrap_or(true);
            let available = record.status == OutboxStatus::Pending
                || (record.status == OutboxStatus::InFlight && expired);
            if !available {
                continue;
            }

            record.status = OutboxStatus::InFlight;
            record.attempts = record.attempts.saturating_add(1);
            record.locked_by = Some(worker_id.to_string());
            record.locked_until = Some(now + lease);
            claimed.push(record.clone());
        }

        Ok(claimed)
    }

    fn complete_outbox(&self, ids: &[u64]) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let now = Utc::now();
        for record in state.outbox.iter_mut().filter(|r| ids.contains(&r.id)) {
            record.status = OutboxStatus::Published;
            record.published_at = Some(now);
            record.locked_by = None;
            record.locked_until = None;
            record.last_error = None;
        }
        Ok(())
    }

    fn release_outbox(&self, ids: &[u64], error: Option<&str>) -> Result<(), StoreError> {
        let mut state = self.write()?;
        for record in state.outbox.iter_mut().filter(|r| ids.contains(&r.id)) {
            record.status = OutboxStatus::Pending;
            record.locked_by = None;
            record.locked_until = None;
            record.last_error = error.map(str::to_string);
        }
        Ok(())
    }

    fn fail_outbox(&self, ids: &[u64], error: Option<&str>) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let now = Utc::now();
        for record in state.outbox.iter_mut().filter(|r| ids.contains(&r.id)) {
            record.status = OutboxStatus::Failed;
            record.failed_at = Some(now);
            record.locked_by = None;
            record.locked_until = None;
            record.last_error = error.map(str::to_string);
        }
        Ok(())
    }

    fn purge_published(&self, older_than: Duration) -> Result<usize, StoreError> {
        let Ok(older_than) = chrono::Duration::from_std(older_than) else {
            return Ok(0);
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(older_than) else {
            return Ok(0);
        };

        let mut state = self.write()?;
        let before = state.outbox.len();
        state.outbox.retain(|record| {
            record.status != OutboxStatus::Published
                || record.published_at.map_or(true, |at| at > cutoff)
        });
        Ok(before - state.outbox.len())
    }
}
