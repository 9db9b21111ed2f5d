//! Transaction - chain document writes and outbox messages into one atomic commit.
//!
//! ## Example
//!
//! ```ignore
//! let mut tx = Transaction::new();
//! tx.save(&match_doc)?
//!     .save(&player)?
//!     .create(&history_entry)?
//!     .send(queues::HEAD_TO_HEAD, message);
//! store.commit(tx)?;
//! ```

use crate::bus::Message;

use super::{make_key, Document, Expect, StoreError, Versioned};

/// A staged document write (type-erased).
#[derive(Debug, Clone)]
pub(crate) struct StagedWrite {
    /// Storage key: "COLLECTION:id"
    pub key: String,
    /// JSON-serialized bytes
    pub bytes: Vec<u8>,
    pub expect: Expect,
}

/// A staged outbox message addressed to a named queue.
#[derive(Debug, Clone)]
pub(crate) struct StagedMessage {
    pub queue: String,
    pub message: Message,
}

/// Builder for a set of writes that must be applied all-or-nothing.
#[derive(Debug, Default)]
pub struct Transaction {
    pub(crate) writes: Vec<StagedWrite>,
    pub(crate) messages: Vec<StagedMessage>,
}

/// What a successful commit applied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    pub documents: usize,
    pub messages: usize,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a write guarded by an explicit precondition.
    ///
    /// Staging the same document twice keeps the first precondition and the last contents.
    pub fn put<D: Document>(&mut self, doc: &D, expect: Expect) -> Result<&mut Self, StoreError> {
        let key = make_key(D::COLLECTION, &doc.id());
        let bytes = serde_json::to_vec(doc).map_err(|e| StoreError::Serde(e.to_string()))?;

        match self.writes.iter_mut().find(|w| w.key == key) {
            Some(staged) => staged.bytes = bytes,
            None => self.writes.push(StagedWrite { key, bytes, expect }),
        }
        Ok(self)
    }

    /// Stage a write of a document read from the store: it must still be at the version read
    /// (or still be absent for fresh documents).
    pub fn save<D: Document>(&mut self, doc: &Versioned<D>) -> Result<&mut Self, StoreError> {
        self.put(&doc.data, doc.expectation())
    }

    /// Stage the creation of a document that must not exist yet.
    pub fn create<D: Document>(&mut self, doc: &D) -> Result<&mut Self, StoreError> {
        self.put(doc, Expect::Absent)
    }

    /// Stage an unconditional write.
    pub fn upsert<D: Document>(&mut self, doc: &D) -> Result<&mut Self, StoreError> {
        self.put(doc, Expect::Any)
    }

    /// Stage an outbox message, delivered to `queue` once the commit succeeds.
    pub fn send(&mut self, queue: impl Into<String>, message: Message) -> &mut Self {
        self.messages.push(StagedMessage {
            queue: queue.into(),
            message,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.messages.is_empty()
    }

    /// Number of staged document writes.
    pub fn document_count(&self) -> usize {
        self.writes.len()
    }

    /// Number of staged outbox messages.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}
