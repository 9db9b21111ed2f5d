//! Service Bus - point-to-point messaging between pipeline stages.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐ match.completed ┌──────────────┐ match.rating_processed ┌──────────────┐
//! │   outbox /   │ ──────────────▶ │    rating    │ ─────────────────────▶ │ head_to_head │
//! │   signal     │     "rating"    │    stage     │     "head_to_head"     │    stage     │
//! └──────────────┘                 └──────────────┘                        └──────┬───────┘
//!                                                                                 │ head_to_head.changed
//!                                                                                 ▼ "nemesis"
//!                                                                          ┌──────────────┐
//!                                                                          │   nemesis    │
//!                                                                          │    stage     │
//!                                                                          └──────────────┘
//! ```
//!
//! Every queue has at-least-once semantics: a [`Delivery`] stays in flight
//! until it is acked, nacked (redelivered at the tail) or rejected (dead-lettered).

mod in_memory_queue;
mod listener;
mod message;
mod sender;

pub use in_memory_queue::{DeadLetter, InMemoryQueue};
pub use listener::{Delivery, Listener};
pub use message::Message;
pub use sender::Sender;

/// Error type for queue operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue state poisoned")]
    Poisoned,
    #[error("delivery {tag} is not in flight on queue {queue}")]
    NotInFlight { queue: String, tag: u64 },
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}
