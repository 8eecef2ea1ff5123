//! Ledger Engine CLI
//!
//! Runs one session of the money-movement core against in-memory
//! collaborators.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --accounts accounts.csv > balances.csv
//! cargo run -- --accounts accounts.csv --transfers transfers.csv > balances.csv
//! cargo run -- --accounts accounts.csv --withdrawals withdrawals.jsonl --workers 4 > balances.csv
//! RUST_LOG=debug cargo run -- --accounts accounts.csv --log-json > balances.csv
//! ```
//!
//! Final balances are written to stdout as CSV, logs to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (unreadable input, queue unreachable after all retries, etc.)

use rust_ledger_engine::runner::{run_session, SessionInputs};
use rust_ledger_engine::{cli, logging};
use std::process;
use tracing::error;

fn main() {
    let args = cli::parse_args();

    // Logging first: building the config warns about values it replaces
    if let Err(e) = logging::init_logging(&args.logging_config()) {
        eprintln!("Error: failed to initialise logging: {}", e);
        process::exit(1);
    }
    let config = args.to_service_config();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.runtime_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create tokio runtime");
            process::exit(1);
        }
    };

    let inputs = SessionInputs::from(&args);
    let mut output = std::io::stdout();
    if let Err(e) = runtime.block_on(run_session(&inputs, &config, &mut output)) {
        error!(error = %e, "Session failed");
        process::exit(1);
    }
}
