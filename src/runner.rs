//! Batch session driving the whole engine from input files
//!
//! ```text
//! accounts.csv ──> AccountService::open_account
//! transfers.csv ─> TransferEngine::transfer          (synchronous path)
//! withdrawals ───> MemoryQueue ──> WithdrawalWorker × N  (asynchronous path)
//!                                        │
//!                                        └──> BalanceMutator ──> MemoryLedgerStore
//! final balances ─> CSV on the output writer
//! ```
//!
//! The withdrawal queue is closed after the last line is published, so the
//! workers stop once it is drained. Rows that fail to parse and operations
//! rejected for business reasons are logged and counted; only infrastructure
//! failures abort the session.

use crate::cli::CliArgs;
use crate::config::ServiceConfig;
use crate::core::memory::{MemoryCache, MemoryConnector, MemoryLedgerStore, MemoryQueue};
use crate::core::{
    AccountService, BalanceMutator, TransactionQueryService, TransferEngine, WithdrawalQueue,
};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::{
    convert_account_record, convert_transfer_record, write_accounts_csv, AccountRecord,
    TransferRecord,
};
use crate::worker::{QueueConnection, WithdrawalWorker, WorkerStats};
use futures::future::try_join_all;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Input files of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInputs {
    pub accounts: PathBuf,
    pub transfers: Option<PathBuf>,
    pub withdrawals: Option<PathBuf>,
}

impl From<&CliArgs> for SessionInputs {
    fn from(args: &CliArgs) -> Self {
        Self {
            accounts: args.accounts.clone(),
            transfers: args.transfers.clone(),
            withdrawals: args.withdrawals.clone(),
        }
    }
}

/// What happened during a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub accounts_opened: usize,
    pub accounts_rejected: usize,
    pub transfers_applied: usize,
    pub transfers_rejected: usize,
    pub withdrawals_published: usize,
    pub workers: WorkerStats,
    pub ledger_entries: usize,
}

/// Run a complete session and write the final balances to `output`
///
/// # Errors
///
/// Returns a message when an input file cannot be read, the store or the
/// queue fails, or the output cannot be written.
pub async fn run_session(
    inputs: &SessionInputs,
    config: &ServiceConfig,
    output: &mut dyn Write,
) -> Result<SessionReport, String> {
    let store = Arc::new(MemoryLedgerStore::new());
    let cache = Arc::new(MemoryCache::new());
    let queue = Arc::new(MemoryQueue::new(config.worker.queue_name.clone()));
    let mutator = Arc::new(BalanceMutator::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        config.cache.clone(),
        config.timeouts,
    ));
    let accounts = AccountService::new(Arc::clone(&store), config.timeouts);
    let mut report = SessionReport::default();

    let mut reader = open_csv(&inputs.accounts).await?;
    let requests = reader
        .read_all::<AccountRecord, _, _>(convert_account_record)
        .await;
    for request in requests {
        match accounts.open_account(request).await {
            Ok(_) => report.accounts_opened += 1,
            Err(e) if e.is_transient() => return Err(format!("Failed to open account: {}", e)),
            Err(e) => {
                warn!(error = %e, "Account rejected");
                report.accounts_rejected += 1;
            }
        }
    }

    if let Some(path) = &inputs.transfers {
        let engine = TransferEngine::new(Arc::clone(&mutator));
        let mut reader = open_csv(path).await?;
        let transfers = reader
            .read_all::<TransferRecord, _, _>(convert_transfer_record)
            .await;
        for transfer in transfers {
            match engine
                .transfer(transfer.sender_id, transfer.receiver_id, transfer.amount)
                .await
            {
                Ok(_) => report.transfers_applied += 1,
                Err(e) if e.is_transient() => return Err(format!("Transfer failed: {}", e)),
                Err(_) => report.transfers_rejected += 1,
            }
        }
    }

    if let Some(path) = &inputs.withdrawals {
        report.withdrawals_published = publish_lines(queue.as_ref(), path).await?;
    }
    queue.close();

    let shutdown = CancellationToken::new();
    let handles = (0..config.worker.instances).map(|_| {
        let connection = QueueConnection::new(
            MemoryConnector::new(Arc::clone(&queue)),
            config.worker.backoff,
        );
        let mut worker = WithdrawalWorker::new(Arc::clone(&mutator), connection, config.worker.clone());
        let shutdown = shutdown.clone();
        tokio::spawn(async move { worker.run(shutdown).await })
    });
    let results = try_join_all(handles)
        .await
        .map_err(|e| format!("Withdrawal worker panicked: {}", e))?;
    for result in results {
        let stats = result.map_err(|e| format!("Withdrawal worker failed: {}", e))?;
        report.workers = report.workers.merge(stats);
    }

    let listing = TransactionQueryService::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        config.cache.clone(),
        config.timeouts,
    );
    report.ledger_entries = listing
        .all_transactions()
        .await
        .map_err(|e| format!("Failed to list transactions: {}", e))?
        .len();

    let balances = accounts
        .list_accounts()
        .await
        .map_err(|e| format!("Failed to list accounts: {}", e))?;
    write_accounts_csv(&balances, output)?;

    info!(
        accounts = report.accounts_opened,
        transfers = report.transfers_applied,
        withdrawals = report.workers.processed,
        entries = report.ledger_entries,
        "Session complete"
    );
    Ok(report)
}

async fn open_csv(
    path: &Path,
) -> Result<AsyncReader<tokio_util::compat::Compat<tokio::fs::File>>, String> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;
    Ok(AsyncReader::new(file.compat()))
}

/// Publish every non-blank line of `path` as one message, verbatim
async fn publish_lines<Q: WithdrawalQueue>(queue: &Q, path: &Path) -> Result<usize, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read file '{}': {}", path.display(), e))?;

    let mut published = 0;
    for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
        queue
            .publish(line.as_bytes().to_vec())
            .await
            .map_err(|e| format!("Failed to publish withdrawal: {}", e))?;
        published += 1;
    }
    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    async fn run(inputs: &SessionInputs, config: &ServiceConfig) -> (SessionReport, String) {
        let mut output = Vec::new();
        let report = run_session(inputs, config, &mut output).await.unwrap();
        (report, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn test_accounts_only() {
        let dir = TempDir::new().unwrap();
        let inputs = SessionInputs {
            accounts: write(&dir, "accounts.csv", "name,balance\nAlice,1000.00\nBob,500\n"),
            transfers: None,
            withdrawals: None,
        };

        let (report, output) = run(&inputs, &ServiceConfig::default()).await;

        assert_eq!(report.accounts_opened, 2);
        assert_eq!(report.ledger_entries, 0);
        assert_eq!(output, "id,name,balance\n1,Alice,1000.00\n2,Bob,500.00\n");
    }

    #[tokio::test]
    async fn test_full_session() {
        let dir = TempDir::new().unwrap();
        let inputs = SessionInputs {
            accounts: write(&dir, "accounts.csv", "name,balance\nAlice,1000.00\nBob,500.00\nCarol,0\n"),
            transfers: Some(write(
                &dir,
                "transfers.csv",
                "sender_id,receiver_id,amount\n1,2,100.00\n2,3,30.00\n3,1,999.00\n",
            )),
            withdrawals: Some(write(
                &dir,
                "withdrawals.jsonl",
                concat!(
                    "{\"sender_id\": 1, \"amount\": \"200.00\"}\n",
                    "\n",
                    "{\"sender_id\": 2, \"amount\": \"5000.00\"}\n",
                    "{\"sender_id\": 9999, \"amount\": \"1.00\"}\n",
                    "{\"sender_id\": 3}\n",
                ),
            )),
        };
        let mut config = ServiceConfig::default();
        config.worker.instances = 3;

        let (report, output) = run(&inputs, &config).await;

        assert_eq!(report.transfers_applied, 2);
        assert_eq!(report.transfers_rejected, 1);
        assert_eq!(report.withdrawals_published, 4);
        assert_eq!(report.workers.processed, 1);
        assert_eq!(report.workers.rejected, 3);
        assert_eq!(report.ledger_entries, 3);
        assert_eq!(
            output,
            "id,name,balance\n1,Alice,700.00\n2,Bob,570.00\n3,Carol,30.00\n"
        );
    }

    #[tokio::test]
    async fn test_invalid_account_rows_are_counted() {
        let dir = TempDir::new().unwrap();
        let inputs = SessionInputs {
            accounts: write(&dir, "accounts.csv", "name,balance\nAl,10.00\nAlice,-5\nBob,1.00\n"),
            transfers: None,
            withdrawals: None,
        };

        let (report, output) = run(&inputs, &ServiceConfig::default()).await;

        assert_eq!(report.accounts_opened, 1);
        assert_eq!(report.accounts_rejected, 2);
        assert_eq!(output, "id,name,balance\n1,Bob,1.00\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let inputs = SessionInputs {
            accounts: dir.path().join("missing.csv"),
            transfers: None,
            withdrawals: None,
        };
        let mut output = Vec::new();

        let result = run_session(&inputs, &ServiceConfig::default(), &mut output).await;

        assert!(result.unwrap_err().contains("missing.csv"));
    }
}
