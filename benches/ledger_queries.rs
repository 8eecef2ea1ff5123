//! Benchmark suite for transaction listings
//!
//! Compares filtering the full listing in memory with a cache-aside read
//! through [`TransactionQueryService`], using the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Listings are generated in memory: transfers round-robin across 100
//! accounts with a withdrawal every tenth entry.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_ledger_engine::config::{CacheSettings, Timeouts};
use rust_ledger_engine::core::memory::{MemoryCache, MemoryLedgerStore};
use rust_ledger_engine::core::LedgerStore;
use rust_ledger_engine::types::NewLedgerEntry;
use rust_ledger_engine::{EntryKind, LedgerEntry, NewAccount, TransactionFilter, TransactionQueryService};
use std::sync::Arc;

const ACCOUNTS: u64 = 100;

fn main() {
    divan::main();
}

fn listing(len: u64) -> Vec<LedgerEntry> {
    (1..=len)
        .map(|id| {
            let sender = id % ACCOUNTS + 1;
            let staged = if id % 10 == 0 {
                NewLedgerEntry::withdrawal(sender, Decimal::new(100, 2), None)
            } else {
                NewLedgerEntry::transfer(sender, (id * 7) % ACCOUNTS + 1, Decimal::new(250, 2))
            };
            staged.commit(id, Utc::now())
        })
        .collect()
}

/// Filter a listing for one account's withdrawals
#[divan::bench(args = [1_000, 100_000])]
fn filter_account_withdrawals(bencher: divan::Bencher, len: u64) {
    let entries = listing(len);
    let filter = TransactionFilter::ForAccount {
        account: 42,
        kind: Some(EntryKind::Withdrawal),
    };
    bencher.bench_local(|| filter.apply(divan::black_box(&entries)));
}

/// Filter a listing for the transfers between two accounts
#[divan::bench(args = [1_000, 100_000])]
fn filter_between(bencher: divan::Bencher, len: u64) {
    let entries = listing(len);
    let filter = TransactionFilter::Between(8, 57);
    bencher.bench_local(|| filter.apply(divan::black_box(&entries)));
}

/// Cache-aside listing read after a warm-up fill, 1,000 entries
#[divan::bench]
fn cached_listing(bencher: divan::Bencher) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("Failed to build runtime");

    let service = runtime.block_on(async {
        let store = Arc::new(MemoryLedgerStore::new());
        for i in 0..ACCOUNTS {
            store
                .create_account(NewAccount::new(format!("Account {}", i + 1), Decimal::new(1_000_000, 2)))
                .await
                .expect("Failed to open account");
        }
        let cache = Arc::new(MemoryCache::new());
        let mutator = rust_ledger_engine::BalanceMutator::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            CacheSettings::default(),
            Timeouts::default(),
        );
        for id in 1..=1_000u64 {
            let sender = id % ACCOUNTS + 1;
            let receiver = (id * 7) % ACCOUNTS + 1;
            if sender != receiver {
                let _ = mutator.apply_transfer(sender, receiver, Decimal::new(1, 2)).await;
            }
        }
        let service = TransactionQueryService::new(store, cache, CacheSettings::default(), Timeouts::default());
        service.all_transactions().await.expect("Failed to warm cache");
        service
    });

    bencher.bench_local(|| {
        runtime
            .block_on(service.account_transactions(42, None))
            .expect("Listing failed")
    });
}
