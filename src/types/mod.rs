//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account-related types
//! - `ledger`: Ledger entries, amounts and listing filters
//! - `error`: Error types for the ledger engine

pub mod account;
pub mod error;
pub mod ledger;

pub use account::{Account, NewAccount};
pub use error::{ErrorClass, LedgerError};
pub use ledger::{
    validate_amount, AccountId, EntryId, EntryKind, IdempotencyKey, LedgerEntry, NewLedgerEntry,
    TransactionFilter, MAX_AMOUNT, MIN_AMOUNT,
};
