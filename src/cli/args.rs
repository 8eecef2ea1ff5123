use crate::config::{
    BackoffPolicy, CachePolicy, CacheSettings, LoggingConfig, ServiceConfig, Timeouts,
    WorkerConfig,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Apply transfers and queued withdrawals to a set of accounts
#[derive(Parser, Debug)]
#[command(name = "ledger-engine")]
#[command(about = "Apply transfers and queued withdrawals to a set of accounts", long_about = None)]
pub struct CliArgs {
    /// CSV file with `name,balance` rows used to open the accounts
    #[arg(long = "accounts", value_name = "FILE")]
    pub accounts: PathBuf,

    /// CSV file with `sender_id,receiver_id,amount` rows applied synchronously
    #[arg(long = "transfers", value_name = "FILE")]
    pub transfers: Option<PathBuf>,

    /// File with one JSON withdrawal message per line, published to the queue
    #[arg(long = "withdrawals", value_name = "FILE")]
    pub withdrawals: Option<PathBuf>,

    /// Worker instances consuming the withdrawal queue
    #[arg(long = "workers", value_name = "COUNT", env = "LEDGER_WORKERS")]
    pub workers: Option<usize>,

    #[arg(long = "queue", value_name = "NAME", env = "LEDGER_QUEUE")]
    pub queue_name: Option<String>,

    /// Time-to-live of the cached transaction listing
    #[arg(long = "cache-ttl-secs", value_name = "SECS", env = "LEDGER_CACHE_TTL_SECS")]
    pub cache_ttl_secs: Option<u64>,

    #[arg(
        long = "cache-policy",
        value_name = "POLICY",
        default_value = "invalidate-on-write",
        env = "LEDGER_CACHE_POLICY"
    )]
    pub cache_policy: CachePolicyArg,

    #[arg(long = "store-timeout-ms", value_name = "MS", env = "LEDGER_STORE_TIMEOUT_MS")]
    pub store_timeout_ms: Option<u64>,

    #[arg(long = "cache-timeout-ms", value_name = "MS", env = "LEDGER_CACHE_TIMEOUT_MS")]
    pub cache_timeout_ms: Option<u64>,

    /// Queue connection attempts before giving up
    #[arg(long = "reconnect-attempts", value_name = "COUNT", env = "LEDGER_RECONNECT_ATTEMPTS")]
    pub reconnect_attempts: Option<u32>,

    /// Redeliveries after transient failures before a message is dead-lettered
    #[arg(long = "max-redeliveries", value_name = "COUNT", env = "LEDGER_MAX_REDELIVERIES")]
    pub max_redeliveries: Option<u32>,

    /// Tokio worker threads (default: CPU cores)
    #[arg(long = "threads", value_name = "COUNT")]
    pub threads: Option<usize>,

    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", env = "LEDGER_LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long = "log-json")]
    pub log_json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CachePolicyArg {
    InvalidateOnWrite,
    TtlOnly,
}

impl From<CachePolicyArg> for CachePolicy {
    fn from(arg: CachePolicyArg) -> Self {
        match arg {
            CachePolicyArg::InvalidateOnWrite => CachePolicy::InvalidateOnWrite,
            CachePolicyArg::TtlOnly => CachePolicy::TtlOnly,
        }
    }
}

impl CliArgs {
    /// Log settings, available before the rest of the configuration is built
    ///
    /// The binary initialises logging from this first so that warnings raised
    /// while building the service configuration are not lost.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            json: self.log_json,
        }
    }

    /// Build the service configuration, using defaults for anything not given
    ///
    /// Zero values fall back to defaults with a warning, see
    /// [`ServiceConfig::sanitized`].
    pub fn to_service_config(&self) -> ServiceConfig {
        let default = ServiceConfig::default();

        let timeouts = Timeouts {
            store: self
                .store_timeout_ms
                .map_or(default.timeouts.store, Duration::from_millis),
            cache: self
                .cache_timeout_ms
                .map_or(default.timeouts.cache, Duration::from_millis),
        };
        let cache = CacheSettings {
            ttl: self
                .cache_ttl_secs
                .map_or(default.cache.ttl, Duration::from_secs),
            policy: self.cache_policy.into(),
            ..default.cache
        };
        let worker = WorkerConfig {
            queue_name: self
                .queue_name
                .clone()
                .unwrap_or(default.worker.queue_name),
            instances: self.workers.unwrap_or(default.worker.instances),
            max_redeliveries: self
                .max_redeliveries
                .unwrap_or(default.worker.max_redeliveries),
            backoff: BackoffPolicy {
                max_attempts: self
                    .reconnect_attempts
                    .unwrap_or(default.worker.backoff.max_attempts),
                ..default.worker.backoff
            },
        };

        ServiceConfig {
            timeouts,
            cache,
            worker,
            logging: self.logging_config(),
            runtime_threads: self.threads.unwrap_or(default.runtime_threads),
        }
        .sanitized()
    }
}
