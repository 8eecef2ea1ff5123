//! Thread-safe in-memory ledger store
//!
//! This module provides [`MemoryLedgerStore`], a [`LedgerStore`] backed by
//! concurrent data structures. It backs the command-line session and the test
//! suite, and stands in for the relational store of a deployment.
//!
//! # Design
//!
//! Account state lives in a `DashMap`, keyed by account id, with one
//! `tokio::sync::Mutex` per account playing the role of a row lock. A unit of
//! work acquires the locks of every account in its scope in ascending id
//! order, so two units touching the same accounts are serialized and no lock
//! cycle can form. The ledger itself is an append-only `Vec` behind a
//! `RwLock`; entry ids are positions in that vector (starting at 1).
//!
//! # Fault Injection
//!
//! Tests can make the next reads or commits fail, or slow every call down,
//! to exercise timeout and rollback paths.

use crate::core::traits::LedgerStore;
use crate::core::unit::{AtomicScope, Committed, Outcome, UnitOfWork};
use crate::types::{
    Account, AccountId, EntryId, IdempotencyKey, LedgerEntry, LedgerError, NewAccount,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

/// Injected failures, consumed one per call
#[derive(Debug, Default)]
struct Faults {
    failing_reads: AtomicU32,
    failing_commits: AtomicU32,
    latency_ms: AtomicU64,
}

impl Faults {
    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn latency(&self) -> Option<Duration> {
        match self.latency_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Thread-safe ledger store kept entirely in memory
#[derive(Debug)]
pub struct MemoryLedgerStore {
    /// Committed account state by id
    accounts: DashMap<AccountId, Account>,

    /// Per-account locks, created together with the account
    locks: DashMap<AccountId, Arc<Mutex<()>>>,

    /// Append-only ledger; entry `n` sits at index `n - 1`
    entries: RwLock<Vec<LedgerEntry>>,

    /// Idempotency keys recorded with the entry they produced
    keys: DashMap<IdempotencyKey, EntryId>,

    next_account_id: AtomicU64,

    faults: Faults,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            locks: DashMap::new(),
            entries: RwLock::new(Vec::new()),
            keys: DashMap::new(),
            next_account_id: AtomicU64::new(1),
            faults: Faults::default(),
        }
    }

    /// Make the next `count` read calls fail with `StoreUnavailable`
    pub fn fail_next_reads(&self, count: u32) {
        self.faults.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` commits fail after the unit of work has run
    ///
    /// This simulates a fault between staging the debit and making it durable.
    pub fn fail_next_commits(&self, count: u32) {
        self.faults.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Delay every call by `latency` (zero disables the delay, huge values saturate)
    pub fn set_latency(&self, latency: Duration) {
        self.faults
            .latency_ms
            .store(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    /// Sum of all balances
    pub fn total_balance(&self) -> rust_decimal::Decimal {
        self.accounts.iter().map(|entry| entry.value().balance).sum()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.faults.latency() {
            tokio::time::sleep(latency).await;
        }
    }

    async fn read_guard(&self) -> Result<(), LedgerError> {
        self.simulate_latency().await;
        if Faults::take(&self.faults.failing_reads) {
            return Err(LedgerError::store_unavailable("simulated read failure"));
        }
        Ok(())
    }

    /// Lock the existing accounts of a scope in ascending id order
    async fn lock_scope(&self, scope: &AtomicScope) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(scope.account_ids().len());
        for id in scope.account_ids() {
            let lock = match self.locks.get(id) {
                Some(lock) => Arc::clone(lock.value()),
                None => continue,
            };
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    async fn entry_for_key(&self, key: &IdempotencyKey) -> Option<LedgerEntry> {
        let id = self.keys.get(key).map(|entry| *entry.value())?;
        let entries = self.entries.read().await;
        entries.get((id - 1) as usize).cloned()
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        self.read_guard().await?;
        Ok(self.accounts.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, LedgerError> {
        let account = account.validate()?;
        self.simulate_latency().await;

        let id = self.next_account_id.fetch_add(1, Ordering::SeqCst);
        let account = Account::new(id, account.name, account.balance);
        self.locks.insert(id, Arc::new(Mutex::new(())));
        self.accounts.insert(id, account.clone());

        debug!(account = id, name = %account.name, "Account created");
        Ok(account)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.read_guard().await?;
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn run_atomic<F>(&self, scope: AtomicScope, unit: F) -> Result<Committed, LedgerError>
    where
        F: FnOnce(&mut UnitOfWork) -> Result<Outcome, LedgerError> + Send,
    {
        self.simulate_latency().await;

        // Held until the end of the function, after the write-back
        let _guards = self.lock_scope(&scope).await;

        let accounts: Vec<Account> = scope
            .account_ids()
            .iter()
            .filter_map(|id| self.accounts.get(id).map(|entry| entry.value().clone()))
            .collect();
        let prior = match scope.idempotency_key() {
            Some(key) => self.entry_for_key(key).await,
            None => None,
        };

        let mut work = UnitOfWork::new(accounts, prior);
        let staged = match unit(&mut work)? {
            Outcome::Replay(entry) => {
                return Ok(Committed {
                    entry,
                    replayed: true,
                })
            }
            Outcome::Append(staged) => staged,
        };

        if Faults::take(&self.faults.failing_commits) {
            return Err(LedgerError::store_unavailable("simulated commit failure"));
        }

        let mut entries = self.entries.write().await;
        let id = entries.len() as EntryId + 1;
        let key = staged.idempotency_key.clone();
        let entry = staged.commit(id, Utc::now());

        for account in work.into_accounts() {
            self.accounts.insert(account.id, account);
        }
        entries.push(entry.clone());
        if let Some(key) = key {
            self.keys.insert(key, id);
        }

        Ok(Committed {
            entry,
            replayed: false,
        })
    }

    async fn list_ledger_entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.read_guard().await?;
        Ok(self.entries.read().await.clone())
    }
}
