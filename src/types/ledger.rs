//! Ledger entry types for the ledger engine
//!
//! This module defines the append-only ledger record produced by every balance
//! mutation, the staged form used inside an atomic unit, amount validation and
//! the typed filters used by transaction listings.

use super::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier
///
/// Valid identifiers start at 1.
pub type AccountId = u64;

/// Ledger entry identifier, assigned by the store at commit time
pub type EntryId = u64;

/// Smallest amount a mutation may move (0.01)
pub const MIN_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest amount a mutation may move, and the largest opening balance
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 0);

/// Kind of balance mutation recorded by a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Double-entry move between two accounts
    Transfer,

    /// Single-entry debit leaving the system
    Withdrawal,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Transfer => f.write_str("transfer"),
            EntryKind::Withdrawal => f.write_str("withdrawal"),
        }
    }
}

/// Client-supplied key making a withdrawal request idempotent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable record of a committed balance mutation
///
/// `receiver_id` is present only for transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub sender_id: AccountId,
    pub receiver_id: Option<AccountId>,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Whether `account` sent or received this entry
    pub fn involves(&self, account: AccountId) -> bool {
        self.sender_id == account || self.receiver_id == Some(account)
    }
}

/// Ledger entry staged inside an atomic unit, not yet committed
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub kind: EntryKind,
    pub sender_id: AccountId,
    pub receiver_id: Option<AccountId>,
    pub amount: Decimal,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl NewLedgerEntry {
    pub fn transfer(sender_id: AccountId, receiver_id: AccountId, amount: Decimal) -> Self {
        Self {
            kind: EntryKind::Transfer,
            sender_id,
            receiver_id: Some(receiver_id),
            amount,
            idempotency_key: None,
        }
    }

    pub fn withdrawal(
        sender_id: AccountId,
        amount: Decimal,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Self {
        Self {
            kind: EntryKind::Withdrawal,
            sender_id,
            receiver_id: None,
            amount,
            idempotency_key,
        }
    }

    /// Turn the staged entry into a committed one
    pub fn commit(self, id: EntryId, created_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id,
            kind: self.kind,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            amount: self.amount,
            created_at,
        }
    }
}

/// Validate a mutation amount and rescale it to exactly two fractional digits
///
/// # Errors
///
/// * `LedgerError::InvalidAmount` - amount below 0.01, above [`MAX_AMOUNT`], or
///   carrying more than two significant fractional digits
pub fn validate_amount(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount < MIN_AMOUNT || amount > MAX_AMOUNT || amount.normalize().scale() > 2 {
        return Err(LedgerError::invalid_amount(amount));
    }

    let mut amount = amount;
    amount.rescale(2);
    Ok(amount)
}

/// Typed selection over the complete transaction listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFilter {
    /// Every ledger entry
    All,

    /// Entries where `account` is sender or receiver, optionally of one kind
    ForAccount {
        account: AccountId,
        kind: Option<EntryKind>,
    },

    /// Transfers between the two accounts, in either direction
    Between(AccountId, AccountId),
}

impl TransactionFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        match *self {
            TransactionFilter::All => true,
            TransactionFilter::ForAccount { account, kind } => {
                entry.involves(account) && kind.map_or(true, |kind| entry.kind == kind)
            }
            TransactionFilter::Between(a, b) => {
                entry.kind == EntryKind::Transfer
                    && ((entry.sender_id == a && entry.receiver_id == Some(b))
                        || (entry.sender_id == b && entry.receiver_id == Some(a)))
            }
        }
    }

    /// Keep the entries selected by this filter, preserving order
    pub fn apply<'a, I>(&self, entries: I) -> Vec<LedgerEntry>
    where
        I: IntoIterator<Item = &'a LedgerEntry>,
    {
        entries
            .into_iter()
            .filter(|entry| self.matches(entry))
            .cloned()
            .collect()
    }
}
