//! Runtime configuration for the ledger engine
//!
//! Every component receives its settings explicitly at construction time.
//! Values come from the command line (with environment fallbacks, see
//! [`crate::cli`]) and fall back to the defaults below when a zero or
//! otherwise unusable value is supplied.

use std::time::Duration;
use tracing::warn;

/// Cache key holding the complete transaction listing
pub const TRANSACTIONS_CACHE_KEY: &str = "transactions:all";

/// How the transaction listing cache reacts to balance mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Delete the listing key right after each committed mutation
    #[default]
    InvalidateOnWrite,

    /// Leave the listing alone; readers tolerate up to one TTL of staleness
    TtlOnly,
}

/// Deadlines applied to every store and cache call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub store: Duration,
    pub cache: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            store: Duration::from_secs(5),
            cache: Duration::from_millis(500),
        }
    }
}

/// Transaction listing cache settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub key: String,
    pub ttl: Duration,
    pub policy: CachePolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            key: TRANSACTIONS_CACHE_KEY.to_string(),
            ttl: Duration::from_secs(60),
            policy: CachePolicy::default(),
        }
    }
}

/// Bounded exponential backoff used while (re)connecting to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Withdrawal worker settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Queue carrying withdrawal requests
    pub queue_name: String,
    /// Worker instances consuming the queue concurrently
    pub instances: usize,
    /// Redeliveries allowed after transient failures before a message is dead-lettered
    pub max_redeliveries: u32,
    pub backoff: BackoffPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_name: "withdrawals".to_string(),
            instances: 1,
            max_redeliveries: 5,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub timeouts: Timeouts,
    pub cache: CacheSettings,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
    /// Tokio worker threads
    pub runtime_threads: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            cache: CacheSettings::default(),
            worker: WorkerConfig::default(),
            logging: LoggingConfig::default(),
            runtime_threads: num_cpus::get(),
        }
    }
}

impl ServiceConfig {
    /// Replace zero values with their defaults, warning about each replacement
    pub fn sanitized(mut self) -> Self {
        let default = Self::default();

        if self.runtime_threads == 0 {
            warn!(
                default = default.runtime_threads,
                "Invalid runtime_threads (0), using default"
            );
            self.runtime_threads = default.runtime_threads;
        }
        if self.worker.instances == 0 {
            warn!(
                default = default.worker.instances,
                "Invalid worker instances (0), using default"
            );
            self.worker.instances = default.worker.instances;
        }
        if self.worker.backoff.max_attempts == 0 {
            warn!(
                default = default.worker.backoff.max_attempts,
                "Invalid reconnect attempts (0), using default"
            );
            self.worker.backoff.max_attempts = default.worker.backoff.max_attempts;
        }
        if self.timeouts.store.is_zero() {
            warn!(default = ?default.timeouts.store, "Invalid store timeout (0), using default");
            self.timeouts.store = default.timeouts.store;
        }
        if self.timeouts.cache.is_zero() {
            warn!(default = ?default.timeouts.cache, "Invalid cache timeout (0), using default");
            self.timeouts.cache = default.timeouts.cache;
        }
        if self.cache.ttl.is_zero() {
            warn!(default = ?default.cache.ttl, "Invalid cache TTL (0), using default");
            self.cache.ttl = default.cache.ttl;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first(1, 500)]
    #[case::second(2, 1000)]
    #[case::third(3, 2000)]
    #[case::capped(6, 10_000)]
    #[case::far_out(40, 10_000)]
    fn test_backoff_delay(#[case] attempt: u32, #[case] expected_ms: u64) {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(attempt), Duration::from_millis(expected_ms));
    }

    #[test]
    fn test_sanitized_replaces_zero_values() {
        let mut config = ServiceConfig::default();
        config.runtime_threads = 0;
        config.worker.instances = 0;
        config.timeouts.store = Duration::ZERO;
        config.cache.ttl = Duration::ZERO;

        let config = config.sanitized();
        let default = ServiceConfig::default();

        assert_eq!(config.runtime_threads, default.runtime_threads);
        assert_eq!(config.worker.instances, 1);
        assert_eq!(config.timeouts.store, default.timeouts.store);
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.cache.key, TRANSACTIONS_CACHE_KEY);
        assert_eq!(config.cache.policy, CachePolicy::InvalidateOnWrite);
        assert_eq!(config.worker.max_redeliveries, 5);
    }
}
