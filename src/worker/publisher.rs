//! Withdrawal submission
//!
//! The API layer does not debit anything on a withdrawal request; it validates
//! the request, tags it with a fresh request id and publishes it to the queue.
//! The request id doubles as idempotency key for the worker.

use crate::core::traits::WithdrawalQueue;
use crate::io::wire::{encode_withdrawal, WithdrawalRequest};
use crate::types::{validate_amount, AccountId, IdempotencyKey, LedgerError};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Acknowledgement returned to the submitter
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub request_id: IdempotencyKey,
    pub message_id: String,
}

pub struct WithdrawalPublisher<Q> {
    queue: Arc<Q>,
}

impl<Q: WithdrawalQueue> WithdrawalPublisher<Q> {
    /// Create a publisher on the withdrawal queue
    ///
    /// # Arguments
    ///
    /// * `queue` - Durable queue the worker consumes
    pub fn new(queue: Arc<Q>) -> Self {
        Self { queue }
    }

    /// Validate and publish a withdrawal request
    ///
    /// # Errors
    ///
    /// * `LedgerError::AccountNotFound` - sender id 0
    /// * `LedgerError::InvalidAmount` - amount not in range or not scale 2
    /// * `LedgerError::QueueUnavailable` - the message could not be published
    pub async fn enqueue_withdrawal(
        &self,
        sender_id: AccountId,
        amount: Decimal,
    ) -> Result<Accepted, LedgerError> {
        if sender_id == 0 {
            return Err(LedgerError::account_not_found(sender_id));
        }
        let amount = validate_amount(amount)?;

        let request = WithdrawalRequest {
            sender_id,
            amount,
            request_id: Some(IdempotencyKey::new(Uuid::new_v4().to_string())),
        };
        let payload = encode_withdrawal(&request)?;

        let message_id = self.queue.publish(payload).await.map_err(|e| {
            error!(sender = sender_id, error = %e, "Failed to publish withdrawal request");
            e
        })?;

        let request_id = request
            .request_id
            .ok_or_else(|| LedgerError::malformed("request id missing"))?;
        info!(sender = sender_id, amount = %amount, request_id = %request_id, "Withdrawal request submitted");
        Ok(Accepted {
            request_id,
            message_id,
        })
    }
}
