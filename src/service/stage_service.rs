use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::bus::{Delivery, Listener, Message, QueueError};
use crate::stage::StageOutcome;

use super::error::StageError;

type Handler<S> = Box<dyn Fn(&S, &Message) -> Result<StageOutcome, StageError> + Send + Sync>;

/// How a delivery was settled with its queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Acked(StageOutcome),
    /// Returned to the queue for redelivery.
    Nacked(StageError),
    /// Dead-lettered.
    Rejected(StageError),
}

/// A registry of stage handlers keyed by message type.
///
/// The type parameter `S` is the store type. Handlers receive `&S`.
pub struct StageService<S> {
    store: S,
    handlers: HashMap<String, Handler<S>>,
}

impl<S: Send + Sync + 'static> StageService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for a message type.
    pub fn on<F>(mut self, event_type: &str, handler: F) -> Self
    where
        F: Fn(&S, &Message) -> Result<StageOutcome, StageError> + Send + Sync + 'static,
    {
        self.handlers.insert(event_type.to_string(), Box::new(handler));
        self
    }

    /// Dispatch a message to its handler by `event_type`.
    pub fn handle(&self, message: &Message) -> Result<StageOutcome, StageError> {
        let handler = self
            .handlers
            .get(&message.event_type)
            .ok_or_else(|| StageError::UnknownMessage(message.event_type.clone()))?;
        handler(&self.store, message)
    }

    /// Handle a delivery and settle it with the queue it came from.
    ///
    /// A handler running past `budget` still completes; the overrun is logged.
    pub fn process<L: Listener + ?Sized>(
        &self,
        listener: &L,
        queue: &str,
        delivery: &Delivery,
        budget: Duration,
    ) -> Result<Settlement, QueueError> {
        let started = Instant::now();
        let result = self.handle(&delivery.message);
        let elapsed = started.elapsed();
        if elapsed > budget {
            warn!(
                queue,
                message_id = %delivery.message.id,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = budget.as_millis() as u64,
                "handler exceeded its time budget"
            );
        }

        match result {
            Ok(outcome) => {
                listener.ack(queue, delivery)?;
                Ok(Settlement::Acked(outcome))
            }
            Err(err) if err.is_transient() => {
                warn!(
                    queue,
                    message_id = %delivery.message.id,
                    attempt = delivery.attempt,
                    error = %err,
                    "transient failure, message will be redelivered"
                );
                listener.nack(queue, delivery, &err.to_string())?;
                Ok(Settlement::Nacked(err))
            }
            Err(err) => {
                error!(
                    queue,
                    message_id = %delivery.message.id,
                    error = %err,
                    "message cannot be processed, dead-lettering"
                );
                listener.reject(queue, delivery, &err.to_string())?;
                Ok(Settlement::Rejected(err))
            }
        }
    }

    /// List registered message types.
    pub fn event_types(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
