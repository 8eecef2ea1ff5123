//! In-process durable queue with manual acknowledgement
//!
//! [`MemoryQueue`] models the broker contract the withdrawal worker relies on:
//! messages stay in the queue until acknowledged, a negative acknowledgement
//! with requeue puts the message back at the tail with an incremented attempt
//! counter, and a negative acknowledgement without requeue moves it to the
//! dead-letter list. When the broker connection drops, unsettled deliveries
//! go back to the head of the queue, so a consumer whose ack or nack was lost
//! sees the message again after reconnecting. [`MemoryConnector`] hands out
//! the queue and can be told to refuse connections.

use crate::core::traits::{Delivery, DeliveryTag, QueueConnector, WithdrawalQueue};
use crate::types::LedgerError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::pin::pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Message {
    message_id: String,
    payload: Vec<u8>,
    attempt: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Message>,
    unacked: HashMap<DeliveryTag, Message>,
    dead_letters: Vec<Message>,
    acked: usize,
    next_tag: DeliveryTag,
    closed: bool,
    offline: bool,
}

impl QueueState {
    fn requeue_unacked(&mut self) {
        let mut unsettled: Vec<(DeliveryTag, Message)> = self.unacked.drain().collect();
        unsettled.sort_by_key(|(tag, _)| *tag);
        for (_, message) in unsettled.into_iter().rev() {
            self.ready.push_front(message);
        }
    }

    fn check_online(&self) -> Result<(), LedgerError> {
        if self.offline {
            Err(LedgerError::queue_unavailable("broker connection lost"))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
pub struct MemoryQueue {
    name: String,
    state: Mutex<QueueState>,
    changed: Notify,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            changed: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop accepting publishes; consumers drain what is left and then see `None`
    pub fn close(&self) {
        self.state().closed = true;
        self.changed.notify_waiters();
    }

    /// Simulate a lost broker connection (every call fails while offline)
    ///
    /// Going offline closes every consumer channel: deliveries that were not
    /// settled return to the head of the queue, oldest first, and keep their
    /// attempt counter. Their old delivery tags become invalid.
    pub fn set_offline(&self, offline: bool) {
        {
            let mut state = self.state();
            state.offline = offline;
            if offline {
                state.requeue_unacked();
            }
        }
        self.changed.notify_waiters();
    }

    /// Messages waiting for delivery or acknowledgement
    pub fn pending(&self) -> usize {
        let state = self.state();
        state.ready.len() + state.unacked.len()
    }

    pub fn acked(&self) -> usize {
        self.state().acked
    }

    /// Payloads rejected without requeue, oldest first
    pub fn dead_letters(&self) -> Vec<Vec<u8>> {
        self.state()
            .dead_letters
            .iter()
            .map(|message| message.payload.clone())
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        // A poisoned lock only means another thread panicked mid-update of plain data
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_unacked(&self, tag: DeliveryTag) -> Result<(MutexGuard<'_, QueueState>, Message), LedgerError> {
        let mut state = self.state();
        state.check_online()?;
        let message = state
            .unacked
            .remove(&tag)
            .ok_or_else(|| LedgerError::queue_unavailable(format!("unknown delivery tag {}", tag)))?;
        Ok((state, message))
    }
}

#[async_trait]
impl WithdrawalQueue for MemoryQueue {
    async fn publish(&self, payload: Vec<u8>) -> Result<String, LedgerError> {
        let message_id = Uuid::new_v4().to_string();
        {
            let mut state = self.state();
            state.check_online()?;
            if state.closed {
                return Err(LedgerError::queue_unavailable(format!(
                    "queue '{}' is closed",
                    self.name
                )));
            }
            state.ready.push_back(Message {
                message_id: message_id.clone(),
                payload,
                attempt: 0,
            });
        }
        self.changed.notify_waiters();
        Ok(message_id)
    }

    async fn next_delivery(&self) -> Result<Option<Delivery>, LedgerError> {
        loop {
            let mut changed = pin!(self.changed.notified());
            changed.as_mut().enable();

            {
                let mut state = self.state();
                state.check_online()?;

                if let Some(mut message) = state.ready.pop_front() {
                    message.attempt += 1;
                    state.next_tag += 1;
                    let tag = state.next_tag;
                    let delivery = Delivery {
                        tag,
                        message_id: message.message_id.clone(),
                        payload: message.payload.clone(),
                        attempt: message.attempt,
                    };
                    state.unacked.insert(tag, message);
                    return Ok(Some(delivery));
                }

                if state.closed && state.unacked.is_empty() {
                    return Ok(None);
                }
            }

            changed.await;
        }
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), LedgerError> {
        {
            let (mut state, _message) = self.take_unacked(tag)?;
            state.acked += 1;
        }
        self.changed.notify_waiters();
        Ok(())
    }

    async fn nack(&self, tag: DeliveryTag, requeue: bool) -> Result<(), LedgerError> {
        {
            let (mut state, message) = self.take_unacked(tag)?;
            if requeue {
                state.ready.push_back(message);
            } else {
                state.dead_letters.push(message);
            }
        }
        self.changed.notify_waiters();
        Ok(())
    }
}

/// Connector handing out a shared [`MemoryQueue`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    queue: Arc<MemoryQueue>,
    failing_connects: Arc<AtomicU32>,
    attempts: Arc<AtomicU32>,
}

impl MemoryConnector {
    pub fn new(queue: Arc<MemoryQueue>) -> Self {
        Self {
            queue,
            failing_connects: Arc::new(AtomicU32::new(0)),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Refuse the next `count` connection attempts
    pub fn fail_next_connects(&self, count: u32) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Connection attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueConnector for MemoryConnector {
    type Queue = MemoryQueue;

    async fn connect(&self) -> Result<Arc<MemoryQueue>, LedgerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(LedgerError::queue_unavailable("connection refused"));
        }
        self.queue.state().check_online()?;

        Ok(Arc::clone(&self.queue))
    }
}
