//! Balance-mutation primitive shared by transfers and withdrawals
//!
//! [`BalanceMutator`] is the only writer of account balances. Each operation
//! validates the amount, then runs one atomic unit against the
//! [`LedgerStore`]: load the scoped accounts under lock, check the sender
//! balance, debit (and credit for transfers), stage the ledger entry, commit.
//!
//! # Cache Consistency
//!
//! With [`CachePolicy::InvalidateOnWrite`] (the default) the transaction
//! listing key is deleted right after the unit commits, outside the atomic
//! unit. A reader that loaded the listing from the store before the commit
//! can still write that older listing back after the delete, and a failed
//! delete leaves the old value in place. In both cases the listing is stale
//! for at most one TTL; without such a race the next read misses the cache
//! and sees the new entry. [`CachePolicy::TtlOnly`] skips the delete and
//! accepts that staleness window on every write.

use super::deadline::{cache_call, store_call};
use super::traits::{Cache, LedgerStore};
use super::unit::{AtomicScope, Committed, Outcome};
use crate::config::{CachePolicy, CacheSettings, Timeouts};
use crate::types::{
    validate_amount, AccountId, IdempotencyKey, LedgerEntry, LedgerError, NewLedgerEntry,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct BalanceMutator<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    cache_settings: CacheSettings,
    timeouts: Timeouts,
}

impl<S: LedgerStore, C: Cache> BalanceMutator<S, C> {
    /// Create a mutator over the given store and listing cache
    ///
    /// # Arguments
    ///
    /// * `store` - Ledger store that runs the atomic units
    /// * `cache` - Cache holding the transaction listing
    /// * `cache_settings` - Listing key, TTL and invalidation policy
    /// * `timeouts` - Deadlines for every store and cache call
    ///
    /// # Returns
    ///
    /// A `BalanceMutator` that can be shared behind an `Arc` by the transfer
    /// engine and any number of withdrawal workers
    pub fn new(store: Arc<S>, cache: Arc<C>, cache_settings: CacheSettings, timeouts: Timeouts) -> Self {
        Self {
            store,
            cache,
            cache_settings,
            timeouts,
        }
    }

    /// Move `amount` from `sender` to `receiver` and record a transfer entry
    ///
    /// # Arguments
    ///
    /// * `sender` - Account debited
    /// * `receiver` - Account credited
    /// * `amount` - Positive amount with at most two fractional digits
    ///
    /// # Returns
    ///
    /// The committed `Transfer` ledger entry
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - amount not in range or not scale 2
    /// * `LedgerError::SameAccount` - sender and receiver are identical
    /// * `LedgerError::AccountNotFound` - either account does not exist
    /// * `LedgerError::InsufficientFunds` - sender balance below `amount`
    /// * `LedgerError::StoreUnavailable` - store failure or timeout
    pub async fn apply_transfer(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Decimal,
    ) -> Result<LedgerEntry, LedgerError> {
        let amount = validate_amount(amount)?;
        if sender == receiver {
            return Err(LedgerError::same_account(sender));
        }

        let scope = AtomicScope::accounts(&[sender, receiver]);
        let committed = store_call(
            self.timeouts.store,
            self.store.run_atomic(scope, move |unit| {
                unit.account(sender)?;
                unit.account(receiver)?;
                unit.debit(sender, amount)?;
                unit.credit(receiver, amount)?;
                Ok(Outcome::Append(NewLedgerEntry::transfer(sender, receiver, amount)))
            }),
        )
        .await?;

        self.after_commit(&committed).await;
        Ok(committed.entry)
    }

    /// Debit `amount` from `sender` and record a withdrawal entry
    ///
    /// When `key` is given and an entry was already recorded under it, that
    /// entry is returned with `replayed = true` and no balance changes.
    ///
    /// # Arguments
    ///
    /// * `sender` - Account debited
    /// * `amount` - Positive amount with at most two fractional digits
    /// * `key` - Idempotency key of the request, if it carries one
    ///
    /// # Returns
    ///
    /// The committed (or replayed) `Withdrawal` entry
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - amount not in range or not scale 2
    /// * `LedgerError::AccountNotFound` - sender does not exist
    /// * `LedgerError::InsufficientFunds` - sender balance below `amount`
    /// * `LedgerError::StoreUnavailable` - store failure or timeout
    pub async fn apply_withdrawal(
        &self,
        sender: AccountId,
        amount: Decimal,
        key: Option<IdempotencyKey>,
    ) -> Result<Committed, LedgerError> {
        let amount = validate_amount(amount)?;

        let scope = AtomicScope::accounts(&[sender]).with_key(key.clone());
        let committed = store_call(
            self.timeouts.store,
            self.store.run_atomic(scope, move |unit| {
                if let Some(prior) = unit.prior_entry() {
                    return Ok(Outcome::Replay(prior.clone()));
                }
                unit.debit(sender, amount)?;
                Ok(Outcome::Append(NewLedgerEntry::withdrawal(sender, amount, key)))
            }),
        )
        .await?;

        self.after_commit(&committed).await;
        Ok(committed)
    }

    async fn after_commit(&self, committed: &Committed) {
        let entry = &committed.entry;
        if committed.replayed {
            info!(entry_id = entry.id, sender = entry.sender_id, "Request already applied, replaying entry");
            return;
        }

        info!(
            entry_id = entry.id,
            kind = %entry.kind,
            sender = entry.sender_id,
            receiver = ?entry.receiver_id,
            amount = %entry.amount,
            "Ledger entry committed"
        );

        if self.cache_settings.policy == CachePolicy::TtlOnly {
            return;
        }
        match cache_call(self.timeouts.cache, self.cache.delete(&self.cache_settings.key)).await {
            Ok(()) => debug!(key = %self.cache_settings.key, "Transaction listing invalidated"),
            Err(e) => warn!(
                key = %self.cache_settings.key,
                error = %e,
                "Failed to invalidate transaction listing, stale for at most one TTL"
            ),
        }
    }
}
