//! End-to-end integration tests
//!
//! Two groups of tests live here:
//!
//! - Session fixtures: each directory under `tests/fixtures/` holds
//!   `accounts.csv`, optionally `transfers.csv` and `withdrawals.jsonl`, and
//!   the `expected.csv` balance report. The session runs with one and with
//!   several withdrawal workers and must produce the expected report.
//! - Ledger properties: conservation, non-negativity, atomicity, idempotent
//!   rejection and cache fallback, driven through the public components with
//!   the in-memory store, cache and queue.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_ledger_engine::config::{BackoffPolicy, CacheSettings, ServiceConfig, Timeouts, WorkerConfig};
    use rust_ledger_engine::core::memory::{
        MemoryCache, MemoryConnector, MemoryLedgerStore, MemoryQueue,
    };
    use rust_ledger_engine::core::{LedgerStore, WithdrawalQueue};
    use rust_ledger_engine::runner::{run_session, SessionInputs};
    use rust_ledger_engine::worker::{Disposition, QueueConnection};
    use rust_ledger_engine::{
        AccountId, BalanceMutator, EntryKind, LedgerError, NewAccount, TransactionQueryService,
        TransferEngine, WithdrawalPublisher, WithdrawalWorker,
    };
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn fixture_file(dir: &Path, name: &str) -> Option<PathBuf> {
        let path = dir.join(name);
        path.exists().then_some(path)
    }

    /// Run the session for `tests/fixtures/{fixture_name}` and compare with expected.csv
    async fn run_test_fixture(fixture_name: &str, workers: usize) {
        let fixture_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(fixture_name);
        let inputs = SessionInputs {
            accounts: fixture_dir.join("accounts.csv"),
            transfers: fixture_file(&fixture_dir, "transfers.csv"),
            withdrawals: fixture_file(&fixture_dir, "withdrawals.jsonl"),
        };
        assert!(
            inputs.accounts.exists(),
            "Accounts file not found: {}",
            inputs.accounts.display()
        );

        let mut config = ServiceConfig::default();
        config.worker.instances = workers;

        let mut output = Vec::new();
        run_session(&inputs, &config, &mut output)
            .await
            .unwrap_or_else(|e| panic!("Session failed: {}", e));
        let actual_output = String::from_utf8(output).unwrap();

        let expected_path = fixture_dir.join("expected.csv");
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path.display(), e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (workers: {})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, workers, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("insufficient_funds")]
    #[case("unknown_account")]
    #[case("malformed_data")]
    #[case("precision")]
    #[case("between_accounts")]
    #[tokio::test]
    async fn test_fixtures(#[case] fixture: &str, #[values(1, 4)] workers: usize) {
        run_test_fixture(fixture, workers).await;
    }

    #[tokio::test]
    async fn test_duplicate_request_ids_apply_once() {
        run_test_fixture("duplicate_requests", 1).await;
    }

    struct Ledger {
        store: Arc<MemoryLedgerStore>,
        cache: Arc<MemoryCache>,
        mutator: Arc<BalanceMutator<MemoryLedgerStore, MemoryCache>>,
    }

    impl Ledger {
        async fn with_accounts(balances: &[i64]) -> Self {
            let store = Arc::new(MemoryLedgerStore::new());
            for (i, cents) in balances.iter().enumerate() {
                store
                    .create_account(NewAccount::new(format!("Account {}", i + 1), Decimal::new(*cents, 2)))
                    .await
                    .unwrap();
            }
            let cache = Arc::new(MemoryCache::new());
            let mutator = Arc::new(BalanceMutator::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                CacheSettings::default(),
                Timeouts::default(),
            ));
            Self {
                store,
                cache,
                mutator,
            }
        }

        fn transfers(&self) -> TransferEngine<MemoryLedgerStore, MemoryCache> {
            TransferEngine::new(Arc::clone(&self.mutator))
        }

        fn queries(&self) -> TransactionQueryService<MemoryLedgerStore, MemoryCache> {
            TransactionQueryService::new(
                Arc::clone(&self.store),
                Arc::clone(&self.cache),
                CacheSettings::default(),
                Timeouts::default(),
            )
        }

        async fn balance(&self, id: AccountId) -> Decimal {
            self.store.get_account(id).await.unwrap().unwrap().balance
        }
    }

    #[tokio::test]
    async fn test_transfer_scenario() {
        let ledger = Ledger::with_accounts(&[100000, 50000]).await;

        let entry = ledger
            .transfers()
            .transfer(1, 2, Decimal::new(10000, 2))
            .await
            .unwrap();

        assert_eq!(ledger.balance(1).await, Decimal::new(90000, 2));
        assert_eq!(ledger.balance(2).await, Decimal::new(60000, 2));
        assert_eq!(entry.kind, EntryKind::Transfer);
        assert_eq!(entry.amount, Decimal::new(10000, 2));
        assert_eq!(ledger.queries().all_transactions().await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn test_conservation_under_concurrent_transfers() {
        let ledger = Ledger::with_accounts(&[100000, 100000, 100000, 100000]).await;
        let engine = Arc::new(ledger.transfers());
        let before = ledger.store.total_balance();

        let tasks: Vec<_> = (0..200u64)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let sender = i % 4 + 1;
                let receiver = (i * 7 + 1) % 4 + 1;
                let amount = Decimal::new((i as i64 % 50 + 1) * 137, 2);
                tokio::spawn(async move { engine.transfer(sender, receiver, amount).await })
            })
            .collect();
        for task in tasks {
            let _ = task.await.unwrap();
        }

        assert_eq!(ledger.store.total_balance(), before);
        for id in 1..=4 {
            assert!(ledger.balance(id).await >= Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn test_concurrent_withdrawals_never_overdraw() {
        let ledger = Ledger::with_accounts(&[10000]).await;

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let mutator = Arc::clone(&ledger.mutator);
                tokio::spawn(async move {
                    mutator
                        .apply_withdrawal(1, Decimal::new(3000, 2), None)
                        .await
                })
            })
            .collect();
        let mut applied = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => applied += 1,
                Err(e) => assert!(matches!(e, LedgerError::InsufficientFunds { .. })),
            }
        }

        assert_eq!(applied, 3);
        assert_eq!(ledger.balance(1).await, Decimal::new(1000, 2));
    }

    #[tokio::test]
    async fn test_failed_commit_has_no_partial_effect() {
        let ledger = Ledger::with_accounts(&[100000, 50000]).await;
        ledger.store.fail_next_commits(1);

        let result = ledger.transfers().transfer(1, 2, Decimal::new(10000, 2)).await;

        assert!(matches!(result, Err(LedgerError::StoreUnavailable { .. })));
        assert_eq!(ledger.balance(1).await, Decimal::new(100000, 2));
        assert_eq!(ledger.balance(2).await, Decimal::new(50000, 2));
        assert!(ledger.queries().all_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_published_withdrawal_is_processed_by_worker() {
        let ledger = Ledger::with_accounts(&[100000]).await;
        let queue = Arc::new(MemoryQueue::new("withdrawals"));
        let publisher = WithdrawalPublisher::new(Arc::clone(&queue));

        let accepted = publisher
            .enqueue_withdrawal(1, Decimal::new(20000, 2))
            .await
            .unwrap();
        assert!(!accepted.request_id.as_str().is_empty());
        queue.close();

        let connection = QueueConnection::new(
            MemoryConnector::new(Arc::clone(&queue)),
            BackoffPolicy::default(),
        );
        let mut worker = WithdrawalWorker::new(
            Arc::clone(&ledger.mutator),
            connection,
            WorkerConfig::default(),
        );
        let stats = worker.run(CancellationToken::new()).await.unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(ledger.balance(1).await, Decimal::new(80000, 2));
        let withdrawals = ledger
            .queries()
            .account_transactions(1, Some(EntryKind::Withdrawal))
            .await
            .unwrap();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].receiver_id, None);
    }

    #[tokio::test]
    async fn test_redelivered_domain_failure_is_rejected_again() {
        let ledger = Ledger::with_accounts(&[100000]).await;
        let queue = Arc::new(MemoryQueue::new("withdrawals"));
        let connection = QueueConnection::new(
            MemoryConnector::new(Arc::clone(&queue)),
            BackoffPolicy::default(),
        );
        let worker = WithdrawalWorker::new(
            Arc::clone(&ledger.mutator),
            connection,
            WorkerConfig::default(),
        );
        let payload = br#"{"sender_id": 1, "amount": "2000.00", "request_id": "r-1"}"#.to_vec();

        for _ in 0..3 {
            queue.publish(payload.clone()).await.unwrap();
            let delivery = queue.next_delivery().await.unwrap().unwrap();
            let disposition = worker.handle(&delivery).await;
            assert!(matches!(
                disposition,
                Disposition::Rejected(LedgerError::InsufficientFunds { .. })
            ));
            queue.ack(delivery.tag).await.unwrap();
        }

        assert_eq!(ledger.balance(1).await, Decimal::new(100000, 2));
        assert!(ledger.queries().all_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_falls_back_to_store_without_cache() {
        let ledger = Ledger::with_accounts(&[100000, 50000, 20000]).await;
        let engine = ledger.transfers();
        let first = engine.transfer(1, 2, Decimal::new(10000, 2)).await.unwrap();
        let second = engine.transfer(2, 3, Decimal::new(3000, 2)).await.unwrap();
        ledger.cache.set_online(false);

        let queries = ledger.queries();

        assert_eq!(
            queries.all_transactions().await.unwrap(),
            vec![first.clone(), second.clone()]
        );
        assert_eq!(queries.transactions_between(2, 1).await.unwrap(), vec![first]);
        assert_eq!(
            queries.account_transactions(3, None).await.unwrap(),
            vec![second]
        );
    }

    #[tokio::test]
    async fn test_between_returns_only_matching_transfers() {
        let ledger = Ledger::with_accounts(&[100000, 50000, 20000]).await;
        let engine = ledger.transfers();
        let first = engine.transfer(1, 2, Decimal::new(10000, 2)).await.unwrap();
        engine.transfer(2, 3, Decimal::new(3000, 2)).await.unwrap();
        ledger
            .mutator
            .apply_withdrawal(1, Decimal::new(500, 2), None)
            .await
            .unwrap();

        let between = ledger.queries().transactions_between(1, 2).await.unwrap();

        assert_eq!(between, vec![first]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_surfaces_as_unavailable() {
        let ledger = Ledger::with_accounts(&[100000, 50000]).await;
        ledger.store.set_latency(Duration::from_secs(30));

        let result = ledger.transfers().transfer(1, 2, Decimal::new(100, 2)).await;

        assert!(matches!(result, Err(LedgerError::StoreUnavailable { .. })));
        assert_eq!(
            result.unwrap_err().user_message(),
            "Unable to complete the operation, please try again later"
        );
    }
}
