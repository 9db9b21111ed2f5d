//! In-memory queue for tests, replays and single-process deployments.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{Delivery, Listener, Message, QueueError, Sender};

/// A message that ran out of delivery attempts or was rejected.
#[derive(Clone, Debug, PartialEq)]
pub struct DeadLetter {
    pub queue: String,
    pub message: Message,
    pub attempts: u32,
    pub reason: String,
}

struct Waiting {
    message: Message,
    /// Deliveries made so far.
    attempts: u32,
}

#[derive(Default)]
struct NamedQueue {
    pending: VecDeque<Waiting>,
    in_flight: BTreeMap<u64, Delivery>,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, NamedQueue>,
    dead_letters: Vec<DeadLetter>,
    sent: Vec<(String, Message)>,
    next_tag: u64,
}

/// In-memory queue implementing [`Sender`] and [`Listener`].
///
/// Features:
/// - Thread-safe (share across threads via `Clone`)
/// - Named queues with competing listeners
/// - Nacked deliveries go back to the tail of their queue
/// - Deliveries past `max_deliveries` are dead-lettered
/// - Optional send log for inspection (`with_send_log`)
///
/// ## Example
///
/// ```
/// use rivalry::bus::{InMemoryQueue, Listener, Message, Sender};
///
/// let queue = InMemoryQueue::new();
/// queue.send("rating", Message::new("m1", "match.completed", Vec::new())).unwrap();
///
/// let delivery = queue.listen("rating", 10).unwrap().unwrap();
/// assert_eq!(delivery.attempt, 1);
/// queue.ack("rating", &delivery).unwrap();
/// assert!(queue.is_idle());
/// ```
#[derive(Clone)]
pub struct InMemoryQueue {
    shared: Arc<(Mutex<State>, Condvar)>,
    max_deliveries: u32,
    log_sends: bool,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            shared: Arc::new((Mutex::new(State::default()), Condvar::new())),
            max_deliveries: 5,
            log_sends: false,
        }
    }

    /// Set how many times a message is delivered before it is dead-lettered.
    pub fn with_max_deliveries(mut self, max: u32) -> Self {
        self.max_deliveries = max.max(1);
        self
    }

    /// Keep a copy of every sent message for [`InMemoryQueue::sent`].
    ///
    /// The log is never trimmed; leave it off outside tests and replays.
    pub fn with_send_log(mut self) -> Self {
        self.log_sends = true;
        self
    }

    pub fn max_deliveries(&self) -> u32 {
        self.max_deliveries
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, QueueError> {
        self.shared.0.lock().map_err(|_| QueueError::Poisoned)
    }

    fn settle(&self, queue: &str, delivery: &Delivery) -> Result<(MutexGuard<'_, State>, Delivery), QueueError> {
        let mut state = self.lock()?;
        let settled = state
            .queues
            .get_mut(queue)
            .and_then(|q| q.in_flight.remove(&delivery.tag))
            .ok_or_else(|| QueueError::NotInFlight {
                queue: queue.to_string(),
                tag: delivery.tag,
            })?;
        Ok((state, settled))
    }

    /// Messages waiting on a queue.
    pub fn pending_len(&self, queue: &str) -> usize {
        self.lock()
            .map(|s| s.queues.get(queue).map(|q| q.pending.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Deliveries handed out on a queue but not settled yet.
    pub fn in_flight_len(&self, queue: &str) -> usize {
        self.lock()
            .map(|s| s.queues.get(queue).map(|q| q.in_flight.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// True when no queue has pending or in-flight messages.
    pub fn is_idle(&self) -> bool {
        self.lock()
            .map(|s| {
                s.queues
                    .values()
                    .all(|q| q.pending.is_empty() && q.in_flight.is_empty())
            })
            .unwrap_or(false)
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().map(|s| s.dead_letters.clone()).unwrap_or_default()
    }

    /// Every message sent since the log was enabled, with its queue, in send order.
    ///
    /// Empty unless built with [`InMemoryQueue::with_send_log`].
    pub fn sent(&self) -> Vec<(String, Message)> {
        self.lock().map(|s| s.sent.clone()).unwrap_or_default()
    }

    /// Event types of every message sent to one queue, in send order.
    pub fn event_types(&self, queue: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(q, _)| q == queue)
            .map(|(_, m)| m.event_type)
            .collect()
    }
}

impl Sender for InMemoryQueue {
    fn send(&self, queue: &str, message: Message) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        if self.log_sends {
            state.sent.push((queue.to_string(), message.clone()));
        }
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .pending
            .push_back(Waiting { message, attempts: 0 });
        drop(state);
        self.shared.1.notify_all();
        Ok(())
    }
}

impl Listener for InMemoryQueue {
    fn listen(&self, queue: &str, timeout_ms: u64) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut state = self.lock()?;

        loop {
            let next = state
                .queues
                .get_mut(queue)
                .and_then(|q| q.pending.pop_front());

            if let Some(waiting) = next {
                state.next_tag += 1;
                let delivery = Delivery {
                    tag: state.next_tag,
                    attempt: waiting.attempts + 1,
                    message: waiting.message,
                };
                state
                    .queues
                    .entry(queue.to_string())
                    .or_default()
                    .in_flight
                    .insert(delivery.tag, delivery.clone());
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let (guard, _) = self
                .shared
                .1
                .wait_timeout(state, deadline - now)
                .map_err(|_| QueueError::Poisoned)?;
            state = guard;
        }
    }

    fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), QueueError> {
        self.settle(queue, delivery).map(|_| ())
    }

    fn nack(&self, queue: &str, delivery: &Delivery, reason: &str) -> Result<(), QueueError> {
        let (mut state, settled) = self.settle(queue, delivery)?;

        if settled.attempt >= self.max_deliveries {
            state.dead_letters.push(DeadLetter {
                queue: queue.to_string(),
                message: settled.message,
                attempts: settled.attempt,
                reason: reason.to_string(),
            });
            return Ok(());
        }

        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .pending
            .push_back(Waiting {
                message: settled.message,
                attempts: settled.attempt,
            });
        drop(state);
        self.shared.1.notify_all();
        Ok(())
    }

    fn reject(&self, queue: &str, delivery: &Delivery, reason: &str) -> Result<(), QueueError> {
        let (mut state, settled) = self.settle(queue, delivery)?;
        state.dead_letters.push(DeadLetter {
            queue: queue.to_string(),
            message: settled.message,
            attempts: settled.attempt,
            reason: reason.to_string(),
        });
        Ok(())
    }
}
