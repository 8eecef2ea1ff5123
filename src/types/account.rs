//! Account-related types for the ledger engine
//!
//! This module defines the Account structure together with the validation
//! rules applied when a new account is opened.

use super::error::LedgerError;
use super::ledger::{AccountId, MAX_AMOUNT};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shortest accepted display name
pub const MIN_NAME_LEN: usize = 3;

/// Longest accepted display name
pub const MAX_NAME_LEN: usize = 100;

/// Account state
///
/// Balances are fixed-point decimals with exactly two fractional digits and
/// never go negative through the balance-mutation primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier (>= 1)
    pub id: AccountId,

    /// Display name of the account holder
    pub name: String,

    /// Current balance, scale 2
    pub balance: Decimal,

    /// When the account was opened
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create an account record with the given opening balance
    pub fn new(id: AccountId, name: impl Into<String>, balance: Decimal) -> Self {
        Account {
            id,
            name: name.into(),
            balance,
            created_at: Utc::now(),
        }
    }
}

/// Request to open a new account
///
/// Validated with [`NewAccount::validate`] before it reaches a store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewAccount {
    pub name: String,
    #[serde(default)]
    pub balance: Decimal,
}

impl NewAccount {
    pub fn new(name: impl Into<String>, balance: Decimal) -> Self {
        Self {
            name: name.into(),
            balance,
        }
    }

    /// Check the name length and opening balance, rescaling the balance to 2 places
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAccount` - name too short/long, balance negative,
    ///   above the maximum, or with more than two fractional digits
    pub fn validate(self) -> Result<Self, LedgerError> {
        let name = self.name.trim().to_string();
        let len = name.chars().count();
        if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
            return Err(LedgerError::invalid_account(format!(
                "name must be between {} and {} characters",
                MIN_NAME_LEN, MAX_NAME_LEN
            )));
        }

        if self.balance.is_sign_negative() && !self.balance.is_zero() {
            return Err(LedgerError::invalid_account("opening balance must not be negative"));
        }
        if self.balance > MAX_AMOUNT {
            return Err(LedgerError::invalid_account(format!(
                "opening balance must not exceed {}",
                MAX_AMOUNT
            )));
        }
        if self.balance.normalize().scale() > 2 {
            return Err(LedgerError::invalid_account(
                "opening balance must have at most 2 decimal places",
            ));
        }

        let mut balance = self.balance;
        balance.rescale(2);
        Ok(Self { name, balance })
    }
}
