//! Sender trait for point-to-point messaging.

use super::{Message, QueueError};

/// Trait for sending messages to a named queue.
///
/// Each message is consumed by exactly one listener on that queue.
pub trait Sender: Send + Sync {
    fn send(&self, queue: &str, message: Message) -> Result<(), QueueError>;
}

impl<T: Sender> Sender for std::sync::Arc<T> {
    fn send(&self, queue: &str, message: Message) -> Result<(), QueueError> {
        (**self).send(queue, message)
    }
}
