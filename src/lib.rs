//! Rust Ledger Engine Library
//! # Overview
//!
//! The money-movement core of a small account service: synchronous transfers
//! between accounts, asynchronous withdrawals delivered through a durable
//! queue, and cache-aside transaction listings.
//!
//! # Architecture
//!
//! - [`types`] - Accounts, ledger entries, filters and the error taxonomy
//! - [`core`] - Business logic components:
//!   - [`core::mutation`] - Balance-mutation primitive, the only balance writer
//!   - [`core::transfer`] - Synchronous transfer entry point
//!   - [`core::query`] - Cache-aside transaction listings
//!   - [`core::traits`] - Ledger store, cache and queue interfaces
//!   - [`core::memory`] - In-memory implementations of those interfaces
//! - [`worker`] - Withdrawal publisher, queue connection and consumer
//! - [`io`] - CSV inputs, the balance report and the withdrawal wire format
//! - [`config`], [`logging`], [`cli`] - Ambient setup for the binary
//! - [`runner`] - One batch session wiring everything together
//!
//! # Guarantees
//!
//! - Balances never go negative; a debit that would overdraw fails with
//!   [`LedgerError::InsufficientFunds`] and changes nothing.
//! - A transfer debits, credits and records its entry in one atomic unit.
//! - Concurrent mutations of the same account are serialized by the store.
//! - A withdrawal carrying a request id is applied at most once, however
//!   often the queue redelivers it.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod runner;
pub mod types;
pub mod worker;

pub use config::ServiceConfig;
pub use core::{AccountService, BalanceMutator, TransactionQueryService, TransferEngine};
pub use io::write_accounts_csv;
pub use types::{
    Account, AccountId, EntryKind, IdempotencyKey, LedgerEntry, LedgerError, NewAccount,
    TransactionFilter,
};
pub use worker::{WithdrawalPublisher, WithdrawalWorker};
