//! Background consumer applying queued withdrawals
//!
//! Every delivery goes through one of four outcomes:
//!
//! | Outcome       | Cause                                     | Broker action        |
//! |---------------|-------------------------------------------|----------------------|
//! | Processed     | withdrawal applied (or replayed)          | ack                  |
//! | Rejected      | malformed payload, unknown account, funds | ack                  |
//! | Requeued      | store or other transient failure          | nack, requeue        |
//! | DeadLettered  | transient failure past the redelivery cap | nack, no requeue     |
//!
//! Rejected messages are consumed because they can never succeed on retry.
//! Requests carrying a `request_id` are applied at most once: a redelivery of
//! a request that was already committed replays the recorded entry.

use super::connection::QueueConnection;
use crate::config::WorkerConfig;
use crate::core::traits::{Cache, Delivery, LedgerStore, QueueConnector, WithdrawalQueue};
use crate::core::BalanceMutator;
use crate::io::wire::decode_withdrawal;
use crate::types::{LedgerEntry, LedgerError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of handling one delivery
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Processed { entry: LedgerEntry, replayed: bool },
    Rejected(LedgerError),
    Requeued(LedgerError),
    DeadLettered(LedgerError),
}

/// Per-worker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub replayed: usize,
    pub rejected: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
}

impl WorkerStats {
    fn record(&mut self, disposition: &Disposition) {
        match disposition {
            Disposition::Processed { replayed: true, .. } => self.replayed += 1,
            Disposition::Processed { .. } => self.processed += 1,
            Disposition::Rejected(_) => self.rejected += 1,
            Disposition::Requeued(_) => self.requeued += 1,
            Disposition::DeadLettered(_) => self.dead_lettered += 1,
        }
    }

    /// Sum counters across worker instances
    pub fn merge(mut self, other: WorkerStats) -> Self {
        self.processed += other.processed;
        self.replayed += other.replayed;
        self.rejected += other.rejected;
        self.requeued += other.requeued;
        self.dead_lettered += other.dead_lettered;
        self
    }
}

pub struct WithdrawalWorker<S, C, K: QueueConnector> {
    mutator: Arc<BalanceMutator<S, C>>,
    connection: QueueConnection<K>,
    config: WorkerConfig,
    stats: WorkerStats,
}

impl<S, C, K> WithdrawalWorker<S, C, K>
where
    S: LedgerStore,
    C: Cache,
    K: QueueConnector,
{
    /// Create a worker instance
    ///
    /// # Arguments
    ///
    /// * `mutator` - The balance writer applying the withdrawals
    /// * `connection` - This worker's own connection to the queue
    /// * `config` - Queue name and redelivery cap
    ///
    /// # Returns
    ///
    /// An idle worker; nothing is consumed until [`WithdrawalWorker::run`]
    pub fn new(
        mutator: Arc<BalanceMutator<S, C>>,
        connection: QueueConnection<K>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            mutator,
            connection,
            config,
            stats: WorkerStats::default(),
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Decode and apply one delivery, classifying the result
    pub async fn handle(&self, delivery: &Delivery) -> Disposition {
        let request = match decode_withdrawal(&delivery.payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(message_id = %delivery.message_id, error = %e, "Discarding malformed withdrawal message");
                return Disposition::Rejected(e);
            }
        };

        let result = self
            .mutator
            .apply_withdrawal(request.sender_id, request.amount, request.request_id)
            .await;

        match result {
            Ok(committed) => Disposition::Processed {
                entry: committed.entry,
                replayed: committed.replayed,
            },
            Err(e) if !e.is_transient() => {
                info!(
                    message_id = %delivery.message_id,
                    sender = request.sender_id,
                    amount = %request.amount,
                    error = %e,
                    "Withdrawal rejected"
                );
                Disposition::Rejected(e)
            }
            Err(e) if delivery.attempt > self.config.max_redeliveries => {
                error!(
                    message_id = %delivery.message_id,
                    attempt = delivery.attempt,
                    error = %e,
                    "Withdrawal still failing after redelivery cap, dead-lettering"
                );
                Disposition::DeadLettered(e)
            }
            Err(e) => {
                warn!(
                    message_id = %delivery.message_id,
                    attempt = delivery.attempt,
                    error = %e,
                    "Withdrawal failed transiently, requeueing"
                );
                Disposition::Requeued(e)
            }
        }
    }

    /// Acknowledge a handled delivery according to its disposition
    pub async fn settle<Q: WithdrawalQueue + ?Sized>(
        queue: &Q,
        delivery: &Delivery,
        disposition: &Disposition,
    ) -> Result<(), LedgerError> {
        match disposition {
            Disposition::Processed { .. } | Disposition::Rejected(_) => queue.ack(delivery.tag).await,
            Disposition::Requeued(_) => queue.nack(delivery.tag, true).await,
            Disposition::DeadLettered(_) => queue.nack(delivery.tag, false).await,
        }
    }

    /// Consume until cancelled or until the queue is closed and drained
    ///
    /// One delivery is in flight at a time. Queue errors mark the connection
    /// lost; the next iteration reconnects through the backoff policy.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Token that stops the loop between deliveries
    ///
    /// # Returns
    ///
    /// The counters of every delivery this worker handled
    ///
    /// # Errors
    ///
    /// * `LedgerError::QueueUnavailable` - the connection could not be (re)established
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<WorkerStats, LedgerError> {
        info!(queue = %self.config.queue_name, "Withdrawal worker started");

        loop {
            let queue = tokio::select! {
                _ = shutdown.cancelled() => break,
                queue = self.connection.ready() => queue?,
            };

            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = queue.next_delivery() => next,
            };

            let delivery = match next {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    debug!(queue = %self.config.queue_name, "Queue drained");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to receive from queue");
                    self.connection.mark_lost();
                    continue;
                }
            };

            let disposition = self.handle(&delivery).await;
            self.stats.record(&disposition);

            if let Err(e) = Self::settle(queue.as_ref(), &delivery, &disposition).await {
                // A dropped connection returns the unsettled message to the queue
                warn!(message_id = %delivery.message_id, error = %e, "Failed to settle delivery");
                self.connection.mark_lost();
            }
        }

        info!(
            processed = self.stats.processed,
            replayed = self.stats.replayed,
            rejected = self.stats.rejected,
            requeued = self.stats.requeued,
            dead_lettered = self.stats.dead_lettered,
            "Withdrawal worker stopped"
        );
        Ok(self.stats)
    }
}
