//! Interfaces to the external collaborators of the money-movement core
//!
//! The core never talks to a concrete database, cache or broker. Components
//! are generic over these traits and receive their handles at construction.
//! In-memory implementations live in [`crate::core::memory`].

use super::unit::{AtomicScope, Committed, Outcome, UnitOfWork};
use crate::types::{Account, AccountId, LedgerEntry, LedgerError, NewAccount};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Transactional access to account balances and the append-only ledger
///
/// Implementations must serialize concurrent units of work that touch the
/// same account (row locking or equivalent isolation).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Look up a single account
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError>;

    /// Persist a validated new account and assign its id
    async fn create_account(&self, account: NewAccount) -> Result<Account, LedgerError>;

    /// All accounts ordered by name
    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError>;

    /// Run `unit` against the locked accounts in `scope` with all-or-nothing effect
    ///
    /// Accounts in the scope that do not exist are simply absent from the
    /// [`UnitOfWork`]. When the closure returns an error nothing is written.
    async fn run_atomic<F>(&self, scope: AtomicScope, unit: F) -> Result<Committed, LedgerError>
    where
        F: FnOnce(&mut UnitOfWork) -> Result<Outcome, LedgerError> + Send;

    /// Every ledger entry ordered by id
    async fn list_ledger_entries(&self) -> Result<Vec<LedgerEntry>, LedgerError>;
}

/// Key/value cache with expiry
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), LedgerError>;

    async fn delete(&self, key: &str) -> Result<(), LedgerError>;
}

/// Broker-assigned handle used to acknowledge a delivery
pub type DeliveryTag = u64;

/// One delivery of a queued message
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub message_id: String,
    pub payload: Vec<u8>,
    /// 1 on first delivery, incremented on every redelivery
    pub attempt: u32,
}

/// Durable, at-least-once queue of withdrawal requests with manual acknowledgement
#[async_trait]
pub trait WithdrawalQueue: Send + Sync {
    /// Publish a persistent message, returning its message id
    async fn publish(&self, payload: Vec<u8>) -> Result<String, LedgerError>;

    /// Wait for the next delivery
    ///
    /// Returns `None` once the queue is closed and nothing is left to deliver.
    async fn next_delivery(&self) -> Result<Option<Delivery>, LedgerError>;

    async fn ack(&self, tag: DeliveryTag) -> Result<(), LedgerError>;

    /// Negatively acknowledge; `requeue = false` dead-letters the message
    async fn nack(&self, tag: DeliveryTag, requeue: bool) -> Result<(), LedgerError>;
}

/// Opens connections to the queue broker
#[async_trait]
pub trait QueueConnector: Send + Sync {
    type Queue: WithdrawalQueue + 'static;

    async fn connect(&self) -> Result<Arc<Self::Queue>, LedgerError>;
}
