//! Document store - versioned documents with atomic, conditional commits.
//!
//! Every stage of the pipeline reads documents together with their version
//! and writes them back through a [`Transaction`]. A commit checks every
//! staged precondition and applies every staged write and outbox message
//! under one lock, or applies nothing at all.
//!
//! ## Example
//!
//! ```ignore
//! use rivalry::store::{DocumentStore, InMemoryDocumentStore, Transaction};
//!
//! let store = InMemoryDocumentStore::new();
//! let mut player = store.get::<Player>("p1")?.expect("seeded");
//! player.data.wins += 1;
//!
//! let mut tx = Transaction::new();
//! tx.save(&player)?;
//! store.commit(tx)?;
//! ```

mod in_memory;
mod transaction;

use std::borrow::Cow;
use std::fmt;

use serde::{de::DeserializeOwned, Serialize};

pub use in_memory::InMemoryDocumentStore;
pub use transaction::{CommitReceipt, Transaction};

/// Trait for types persisted in the document store.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Collection name (a table in SQL, a collection in a document database).
    const COLLECTION: &'static str;

    /// Unique identifier of this document within its collection.
    fn id(&self) -> Cow<'_, str>;
}

/// A document together with the version it was read at.
///
/// Version `0` means the document has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub data: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    /// Wrap a document that does not exist in the store yet.
    pub fn fresh(data: T) -> Self {
        Self { data, version: 0 }
    }

    pub fn is_fresh(&self) -> bool {
        self.version == 0
    }

    /// The precondition a write of this document must satisfy.
    pub fn expectation(&self) -> Expect {
        if self.is_fresh() {
            Expect::Absent
        } else {
            Expect::Version(self.version)
        }
    }
}

/// Precondition checked at commit time for a staged write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// No precondition.
    Any,
    /// The document must not exist.
    Absent,
    /// The document must exist at exactly this version.
    Version(u64),
}

impl Expect {
    pub(crate) fn holds(&self, actual: Option<u64>) -> bool {
        match (self, actual) {
            (Expect::Any, _) => true,
            (Expect::Absent, None) => true,
            (Expect::Version(expected), Some(actual)) => *expected == actual,
            _ => false,
        }
    }
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expect::Any => write!(f, "any"),
            Expect::Absent => write!(f, "absent"),
            Expect::Version(v) => write!(f, "version {}", v),
        }
    }
}

/// Error type for document store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A staged precondition did not hold; nothing was written.
    #[error("write conflict on {key} (expected {expected}, found {})", display_version(.actual))]
    Conflict {
        key: String,
        expected: Expect,
        actual: Option<u64>,
    },
    /// The store could not be reached; nothing was written.
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document serialization error: {0}")]
    Serde(String),
    #[error("document storage error: {0}")]
    Storage(String),
}

impl StoreError {
    /// Whether retrying the whole unit of work may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Unavailable(_))
    }
}

fn display_version(actual: &Option<u64>) -> String {
    match actual {
        Some(v) => format!("version {}", v),
        None => "absent".to_string(),
    }
}

pub(crate) fn make_key(collection: &str, id: &str) -> String {
    format!("{}:{}", collection, id)
}

/// Abstract storage for documents.
///
/// Reads return [`Versioned`] documents; all writes go through [`DocumentStore::commit`].
pub trait DocumentStore: Send + Sync {
    /// Get a document by ID. Returns None if not found.
    fn get<D: Document>(&self, id: &str) -> Result<Option<Versioned<D>>, StoreError>;

    /// Find documents of one collection matching a predicate, ordered by ID.
    fn find<D: Document>(
        &self,
        predicate: &dyn Fn(&D) -> bool,
    ) -> Result<Vec<Versioned<D>>, StoreError>;

    /// Documents of one collection whose ID starts with `id_prefix`, ordered by ID.
    ///
    /// Only matching documents are decoded.
    fn scan<D: Document>(&self, id_prefix: &str) -> Result<Vec<Versioned<D>>, StoreError>;

    /// Atomically check every precondition and apply every write and outbox message.
    fn commit(&self, tx: Transaction) -> Result<CommitReceipt, StoreError>;

    /// Write a single document without a precondition.
    fn upsert<D: Document>(&self, doc: &D) -> Result<(), StoreError> {
        let mut tx = Transaction::new();
        tx.upsert(doc)?;
        self.commit(tx).map(|_| ())
    }
}

impl<S: DocumentStore> DocumentStore for std::sync::Arc<S> {
    fn get<D: Document>(&self, id: &str) -> Result<Option<Versioned<D>>, StoreError> {
        (**self).get(id)
    }

    fn find<D: Document>(
        &self,
        predicate: &dyn Fn(&D) -> bool,
    ) -> Result<Vec<Versioned<D>>, StoreError> {
        (**self).find(predicate)
    }

    fn scan<D: Document>(&self, id_prefix: &str) -> Result<Vec<Versioned<D>>, StoreError> {
        (**self).scan(id_prefix)
    }

    fn commit(&self, tx: Transaction) -> Result<CommitReceipt, StoreError> {
        (**self).commit(tx)
    }
}
