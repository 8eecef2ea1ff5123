//! Deadlines for store and cache calls
//!
//! An elapsed deadline is reported as the matching "unavailable" error so the
//! caller treats it as retryable, never as a silent success.

use crate::types::LedgerError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

pub async fn store_call<T, F>(limit: Duration, call: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    timeout(limit, call).await.unwrap_or_else(|_| {
        Err(LedgerError::store_unavailable(format!(
            "timed out after {:?}",
            limit
        )))
    })
}

pub async fn cache_call<T, F>(limit: Duration, call: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    timeout(limit, call).await.unwrap_or_else(|_| {
        Err(LedgerError::cache_unavailable(format!(
            "timed out after {:?}",
            limit
        )))
    })
}
