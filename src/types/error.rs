//! Error types for the ledger engine
//!
//! This module defines every error the money-movement core can report.
//! Errors carry enough context for logs and fall into three classes that
//! decide how a caller reacts to them.
//!
//! # Error Classes
//!
//! - **Domain**: business-rule failures (unknown account, insufficient funds,
//!   invalid amount). Never retried.
//! - **Malformed**: a queued message that cannot be decoded. Never retried.
//! - **Transient**: store, cache or queue unavailable (including timeouts).
//!   Retried where the protocol allows it, otherwise surfaced as "try again".

use super::ledger::AccountId;
use rust_decimal::Decimal;
use thiserror::Error;

/// How a caller should react to a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Business-rule rejection; retrying cannot succeed
    Domain,
    /// Undecodable input; retrying cannot succeed
    Malformed,
    /// Infrastructure failure; retrying may succeed
    Transient,
}

/// Main error type for the ledger engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Account id did not resolve to an existing account
    #[error("Account {account} not found")]
    AccountNotFound {
        /// The unresolved account id
        account: AccountId,
    },

    /// Sender balance is lower than the requested amount
    ///
    /// Balances are left unchanged.
    #[error("Insufficient funds for account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    /// Amount is not positive, out of range, or has more than two decimals
    #[error("Invalid amount '{amount}'")]
    InvalidAmount { amount: Decimal },

    /// Account creation request failed validation
    #[error("Invalid account: {reason}")]
    InvalidAccount { reason: String },

    /// Transfer where sender and receiver are the same account
    #[error("Sender and receiver are the same account {account}")]
    SameAccount { account: AccountId },

    /// Queued payload could not be decoded into a withdrawal request
    #[error("Malformed message: {reason}")]
    MalformedMessage { reason: String },

    /// Ledger store failed, timed out or rolled back
    #[error("Ledger store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// Cache failed or timed out
    #[error("Cache unavailable: {reason}")]
    CacheUnavailable { reason: String },

    /// Queue broker failed or could not be reached
    #[error("Queue unavailable: {reason}")]
    QueueUnavailable { reason: String },
}

impl From<serde_json::Error> for LedgerError {
    fn from(error: serde_json::Error) -> Self {
        LedgerError::MalformedMessage {
            reason: error.to_string(),
        }
    }
}

impl LedgerError {
    /// Classify the error for retry decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::AccountNotFound { .. }
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::InvalidAmount { .. }
            | LedgerError::InvalidAccount { .. }
            | LedgerError::SameAccount { .. } => ErrorClass::Domain,
            LedgerError::MalformedMessage { .. } => ErrorClass::Malformed,
            LedgerError::StoreUnavailable { .. }
            | LedgerError::CacheUnavailable { .. }
            | LedgerError::QueueUnavailable { .. } => ErrorClass::Transient,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Message shown to the user of a synchronous operation
    ///
    /// Domain errors explain the rejection; transient errors ask to retry
    /// without leaking infrastructure details.
    pub fn user_message(&self) -> String {
        match self {
            LedgerError::AccountNotFound { .. } => "User not found".to_string(),
            LedgerError::InsufficientFunds { .. } => "Insufficient balance".to_string(),
            LedgerError::StoreUnavailable { .. }
            | LedgerError::CacheUnavailable { .. }
            | LedgerError::QueueUnavailable { .. } => {
                "Unable to complete the operation, please try again later".to_string()
            }
            other => other.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::AccountNotFound { account }
    }

    pub fn insufficient_funds(account: AccountId, balance: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account,
            balance,
            requested,
        }
    }

    pub fn invalid_amount(amount: Decimal) -> Self {
        LedgerError::InvalidAmount { amount }
    }

    pub fn invalid_account(reason: impl Into<String>) -> Self {
        LedgerError::InvalidAccount {
            reason: reason.into(),
        }
    }

    pub fn same_account(account: AccountId) -> Self {
        LedgerError::SameAccount { account }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        LedgerError::MalformedMessage {
            reason: reason.into(),
        }
    }

    pub fn store_unavailable(reason: impl Into<String>) -> Self {
        LedgerError::StoreUnavailable {
            reason: reason.into(),
        }
    }

    pub fn cache_unavailable(reason: impl Into<String>) -> Self {
        LedgerError::CacheUnavailable {
            reason: reason.into(),
        }
    }

    pub fn queue_unavailable(reason: impl Into<String>) -> Self {
        LedgerError::QueueUnavailable {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal::Decimal;

    #[rstest]
    #[case::account_not_found(
        LedgerError::AccountNotFound { account: 9999 },
        "Account 9999 not found"
    )]
    #[case::insufficient_funds(
        LedgerError::InsufficientFunds { account: 1, balance: Decimal::new(100000, 2), requested: Decimal::new(200000, 2) },
        "Insufficient funds for account 1: balance 1000.00, requested 2000.00"
    )]
    #[case::invalid_amount(
        LedgerError::InvalidAmount { amount: Decimal::new(-5, 0) },
        "Invalid amount '-5'"
    )]
    #[case::same_account(
        LedgerError::SameAccount { account: 3 },
        "Sender and receiver are the same account 3"
    )]
    #[case::malformed(
        LedgerError::MalformedMessage { reason: "missing field `amount`".to_string() },
        "Malformed message: missing field `amount`"
    )]
    #[case::store_unavailable(
        LedgerError::StoreUnavailable { reason: "timed out".to_string() },
        "Ledger store unavailable: timed out"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::account_not_found(LedgerError::account_not_found(1), ErrorClass::Domain)]
    #[case::insufficient_funds(
        LedgerError::insufficient_funds(1, Decimal::ZERO, Decimal::ONE),
        ErrorClass::Domain
    )]
    #[case::invalid_amount(LedgerError::invalid_amount(Decimal::ZERO), ErrorClass::Domain)]
    #[case::malformed(LedgerError::malformed("bad json"), ErrorClass::Malformed)]
    #[case::store(LedgerError::store_unavailable("down"), ErrorClass::Transient)]
    #[case::cache(LedgerError::cache_unavailable("down"), ErrorClass::Transient)]
    #[case::queue(LedgerError::queue_unavailable("down"), ErrorClass::Transient)]
    fn test_classification(#[case] error: LedgerError, #[case] expected: ErrorClass) {
        assert_eq!(error.class(), expected);
    }

    #[test]
    fn test_user_message_hides_transient_details() {
        let error = LedgerError::store_unavailable("connection reset by peer");
        assert!(!error.user_message().contains("connection reset"));
        assert_eq!(
            LedgerError::account_not_found(2).user_message(),
            "User not found"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: LedgerError = json_error.into();
        assert!(matches!(error, LedgerError::MalformedMessage { .. }));
    }
}
