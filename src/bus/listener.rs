//! Listener trait for point-to-point messaging with explicit acknowledgement.

use super::{Message, QueueError};

/// A message handed to a listener, in flight until it is settled.
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    /// Identifies this delivery for ack/nack/reject.
    pub tag: u64,
    /// 1 on first delivery, incremented on each redelivery.
    pub attempt: u32,
    pub message: Message,
}

/// Trait for listening on a named queue.
///
/// Listeners compete on the same queue; each delivery goes to exactly one of them.
/// Unsettled deliveries are never lost.
pub trait Listener: Send + Sync {
    /// Wait for the next delivery, blocking until one is available or the timeout expires.
    fn listen(&self, queue: &str, timeout_ms: u64) -> Result<Option<Delivery>, QueueError>;

    /// The delivery was handled; remove it for good.
    fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), QueueError>;

    /// Handling failed transiently; redeliver it (dead-lettered once out of attempts).
    fn nack(&self, queue: &str, delivery: &Delivery, reason: &str) -> Result<(), QueueError>;

    /// Handling can never succeed; dead-letter it.
    fn reject(&self, queue: &str, delivery: &Delivery, reason: &str) -> Result<(), QueueError>;
}

impl<T: Listener> Listener for std::sync::Arc<T> {
    fn listen(&self, queue: &str, timeout_ms: u64) -> Result<Option<Delivery>, QueueError> {
        (**self).listen(queue, timeout_ms)
    }

    fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), QueueError> {
        (**self).ack(queue, delivery)
    }

    fn nack(&self, queue: &str, delivery: &Delivery, reason: &str) -> Result<(), QueueError> {
        (**self).nack(queue, delivery, reason)
    }

    fn reject(&self, queue: &str, delivery: &Delivery, reason: &str) -> Result<(), QueueError> {
        (**self).reject(queue, delivery, reason)
    }
}
