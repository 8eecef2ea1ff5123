//! Unit of work executed inside a store's atomic scope
//!
//! The store locks and loads the scoped accounts, hands them to the
//! balance-mutation closure as a [`UnitOfWork`], and commits the staged
//! balances together with the returned ledger entry, or nothing at all.

use crate::types::{Account, AccountId, IdempotencyKey, LedgerEntry, LedgerError, NewLedgerEntry};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Accounts (and optional idempotency key) a unit of work needs locked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicScope {
    accounts: Vec<AccountId>,
    idempotency_key: Option<IdempotencyKey>,
}

impl AtomicScope {
    /// Scope over the given accounts, kept sorted so locks are taken in a fixed order
    pub fn accounts(ids: &[AccountId]) -> Self {
        let mut accounts = ids.to_vec();
        accounts.sort_unstable();
        accounts.dedup();
        Self {
            accounts,
            idempotency_key: None,
        }
    }

    pub fn with_key(mut self, key: Option<IdempotencyKey>) -> Self {
        self.idempotency_key = key;
        self
    }

    pub fn account_ids(&self) -> &[AccountId] {
        &self.accounts
    }

    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }
}

/// What a unit of work asks the store to commit
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Write the staged balances and append this entry
    Append(NewLedgerEntry),

    /// The request was already applied; write nothing and return this entry
    Replay(LedgerEntry),
}

/// Result of a committed unit of work
#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    pub entry: LedgerEntry,
    /// True when the entry was recorded by an earlier delivery of the same request
    pub replayed: bool,
}

/// Locked snapshot of the scoped accounts, mutated in place before commit
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    accounts: BTreeMap<AccountId, Account>,
    prior: Option<LedgerEntry>,
}

impl UnitOfWork {
    pub fn new(accounts: impl IntoIterator<Item = Account>, prior: Option<LedgerEntry>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|account| (account.id, account))
                .collect(),
            prior,
        }
    }

    /// # Errors
    ///
    /// * `LedgerError::AccountNotFound` - the account is not part of the locked scope
    pub fn account(&self, id: AccountId) -> Result<&Account, LedgerError> {
        self.accounts
            .get(&id)
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    /// Entry already recorded under the scope's idempotency key
    pub fn prior_entry(&self) -> Option<&LedgerEntry> {
        self.prior.as_ref()
    }

    /// Decrease a balance, refusing to go below zero
    ///
    /// # Errors
    ///
    /// * `LedgerError::AccountNotFound` - the account is not in scope
    /// * `LedgerError::InsufficientFunds` - the balance is lower than `amount`
    pub fn debit(&mut self, id: AccountId, amount: Decimal) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;

        if account.balance < amount {
            return Err(LedgerError::insufficient_funds(id, account.balance, amount));
        }

        account.balance = account
            .balance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::invalid_amount(amount))?;
        Ok(())
    }

    /// Increase a balance
    pub fn credit(&mut self, id: AccountId, amount: Decimal) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;

        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::invalid_amount(amount))?;
        Ok(())
    }

    /// Staged account states, to be written back on commit
    pub fn into_accounts(self) -> Vec<Account> {
        self.accounts.into_values().collect()
    }
}
