//! A document store that fails or races on demand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rivalry::outbox::{OutboxRecord, OutboxStore};
use rivalry::store::{CommitReceipt, Document, DocumentStore, StoreError, Transaction, Versioned};
use rivalry::InMemoryDocumentStore;

type Hook = Box<dyn FnOnce(&InMemoryDocumentStore) + Send>;

/// Wraps an [`InMemoryDocumentStore`] and injects failures into `commit`.
///
/// Reads and outbox operations always pass through.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: InMemoryDocumentStore,
    failing_commits: Arc<AtomicUsize>,
    attempted_commits: Arc<AtomicUsize>,
    before_commit: Arc<Mutex<Option<Hook>>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryDocumentStore {
        &self.inner
    }

    /// The next `n` commits fail with `StoreError::Unavailable` and apply nothing.
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Run `hook` against the underlying store right before the next commit,
    /// as a concurrent writer would.
    pub fn before_next_commit<F>(&self, hook: F)
    where
        F: FnOnce(&InMemoryDocumentStore) + Send + 'static,
    {
        *self.before_commit.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn attempted_commits(&self) -> usize {
        self.attempted_commits.load(Ordering::SeqCst)
    }
}

impl DocumentStore for FlakyStore {
    fn get<D: Document>(&self, id: &str) -> Result<Option<Versioned<D>>, StoreError> {
        self.inner.get(id)
    }

    fn find<D: Document>(
        &self,
        predicate: &dyn Fn(&D) -> bool,
    ) -> Result<Vec<Versioned<D>>, StoreError> {
        self.inner.find(predicate)
    }

    fn scan<D: Document>(&self, id_prefix: &str) -> Result<Vec<Versioned<D>>, StoreError> {
        self.inner.scan(id_prefix)
    }

    fn commit(&self, tx: Transaction) -> Result<CommitReceipt, StoreError> {
        self.attempted_commits.fetch_add(1, Ordering::SeqCst);

        let hook = self.before_commit.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(&self.inner);
        }

        let failing = self
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StoreError::Unavailable("injected failure".into()));
        }

        self.inner.commit(tx)
    }
}

impl OutboxStore for FlakyStore {
    fn peek_outbox(&self) -> Result<Vec<OutboxRecord>, StoreError> {
        self.inner.peek_outbox()
    }

    fn claim_outbox(
        &self,
        worker_id: &str,
        max: usize,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        self.inner.claim_outbox(worker_id, max, lease)
    }

    fn complete_outbox(&self, ids: &[u64]) -> Result<(), StoreError> {
        self.inner.complete_outbox(ids)
    }

    fn release_outbox(&self, ids: &[u64], error: Option<&str>) -> Result<(), StoreError> {
        self.inner.release_outbox(ids, error)
    }

    fn fail_outbox(&self, ids: &[u64], error: Option<&str>) -> Result<(), StoreError> {
        self.inner.fail_outbox(ids, error)
    }

    fn purge_published(&self, older_than: Duration) -> Result<usize, StoreError> {
        self.inner.purge_published(older_than)
    }
}
