//! Core business logic module
//!
//! This module contains the money-movement components:
//! - `traits` - Interfaces to the ledger store, cache and queue
//! - `unit` - Unit of work run inside the store's atomic scope
//! - `mutation` - Balance-mutation primitive (the only balance writer)
//! - `transfer` - Synchronous transfer entry point
//! - `accounts` - Account opening and listing
//! - `query` - Cache-aside transaction listings
//! - `deadline` - Timeouts for store and cache calls
//! - `memory` - In-memory implementations of the interfaces

pub mod accounts;
pub mod deadline;
pub mod memory;
pub mod mutation;
pub mod query;
pub mod traits;
pub mod transfer;
pub mod unit;

pub use accounts::AccountService;
pub use mutation::BalanceMutator;
pub use query::TransactionQueryService;
pub use traits::{Cache, Delivery, DeliveryTag, LedgerStore, QueueConnector, WithdrawalQueue};
pub use transfer::TransferEngine;
pub use unit::{AtomicScope, Committed, Outcome, UnitOfWork};
