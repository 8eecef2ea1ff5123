//! In-memory key/value cache with per-key expiry
//!
//! [`MemoryCache`] implements [`Cache`] on top of a `DashMap`. Expired values
//! are dropped lazily on read. The cache can be switched offline to exercise
//! the fallback paths of its callers.

use crate::core::traits::Cache;
use crate::types::LedgerError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CachedValue {
    bytes: Vec<u8>,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct MemoryCache {
    values: DashMap<String, CachedValue>,
    online: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            online: AtomicBool::new(true),
        }
    }

    /// Take the cache offline (every call fails) or bring it back
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Whether a live (unexpired) value is stored under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.values
            .get(key)
            .map(|value| value.expires_at > Instant::now())
            .unwrap_or(false)
    }

    /// Drop the value under `key` unless it was replaced by a live one meanwhile
    fn evict_if_expired(&self, key: &str, now: Instant) {
        self.values.remove_if(key, |_, value| value.expires_at <= now);
    }

    fn check_online(&self) -> Result<(), LedgerError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::cache_unavailable("cache offline"))
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        self.check_online()?;

        let now = Instant::now();
        let value = self.values.get(key).map(|value| value.value().clone());
        match value {
            Some(value) if value.expires_at > now => Ok(Some(value.bytes)),
            Some(_) => {
                self.evict_if_expired(key, now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), LedgerError> {
        self.check_online()?;
        self.values.insert(
            key.to_string(),
            CachedValue {
                bytes: value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), LedgerError> {
        self.check_online()?;
        self.values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();

        cache
            .set("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_expires_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.contains("k"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.contains("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_spares_value_set_after_expiry_was_seen() {
        let cache = MemoryCache::new();
        cache
            .set("k", b"old".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        let seen_expired_at = Instant::now();

        // Another caller refreshes the key before the eviction runs
        cache
            .set("k", b"new".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        cache.evict_if_expired("k", seen_expired_at);

        assert_eq!(cache.get("k").await.unwrap(), Some(b"new".to_vec()));

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.evict_if_expired("k", Instant::now());
        assert!(!cache.values.contains_key("k"));
    }

    #[tokio::test]
    async fn test_offline_cache_fails_every_call() {
        let cache = MemoryCache::new();
        cache.set_online(false);

        assert!(matches!(
            cache.get("k").await,
            Err(LedgerError::CacheUnavailable { .. })
        ));
        assert!(cache
            .set("k", Vec::new(), Duration::from_secs(1))
            .await
            .is_err());
        assert!(cache.delete("k").await.is_err());

        cache.set_online(true);
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
