//! Transactional outbox.
//!
//! Messages staged on a [`Transaction`](crate::store::Transaction) are stored
//! as [`OutboxRecord`]s in the same commit as the documents they describe.
//! An [`OutboxRelay`] later claims them under a lease and forwards them to the bus.

mod record;
mod relay;

pub use record::{OutboxRecord, OutboxStatus, OutboxStore};
pub use relay::{DrainResult, OutboxRelay};
