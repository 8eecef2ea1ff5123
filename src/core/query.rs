//! Cache-aside transaction listings
//!
//! [`TransactionQueryService`] serves every listing from one cached value: the
//! complete ledger, JSON-encoded under the configured key. A hit is filtered
//! in memory; a miss reads the ledger from the store, repopulates the cache
//! with the configured TTL, then filters.
//!
//! The cache is an optimization only. Read errors, timeouts and undecodable
//! cached bytes fall back to the store, and a failed repopulation is logged
//! and ignored. Store failures are propagated to the caller.

use super::deadline::{cache_call, store_call};
use super::traits::{Cache, LedgerStore};
use crate::config::{CacheSettings, Timeouts};
use crate::types::{AccountId, EntryKind, LedgerEntry, LedgerError, TransactionFilter};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct TransactionQueryService<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    settings: CacheSettings,
    timeouts: Timeouts,
}

impl<S: LedgerStore, C: Cache> TransactionQueryService<S, C> {
    /// Create a query service reading through the listing cache
    ///
    /// # Arguments
    ///
    /// * `store` - Source of truth for the ledger
    /// * `cache` - Cache holding the complete listing
    /// * `settings` - Listing key and TTL used when repopulating
    /// * `timeouts` - Deadlines for every store and cache call
    ///
    /// # Returns
    ///
    /// A new `TransactionQueryService`
    pub fn new(store: Arc<S>, cache: Arc<C>, settings: CacheSettings, timeouts: Timeouts) -> Self {
        Self {
            store,
            cache,
            settings,
            timeouts,
        }
    }

    /// Entries selected by `filter`, ordered by entry id
    ///
    /// # Errors
    ///
    /// * `LedgerError::StoreUnavailable` - the listing was not cached and the
    ///   store failed or timed out
    pub async fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let listing = self.full_listing().await?;
        Ok(filter.apply(&listing))
    }

    pub async fn all_transactions(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.list_transactions(TransactionFilter::All).await
    }

    /// Entries sent or received by `account`, optionally of one kind
    pub async fn account_transactions(
        &self,
        account: AccountId,
        kind: Option<EntryKind>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.list_transactions(TransactionFilter::ForAccount { account, kind })
            .await
    }

    /// Transfers between two accounts in either direction
    pub async fn transactions_between(
        &self,
        first: AccountId,
        second: AccountId,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.list_transactions(TransactionFilter::Between(first, second))
            .await
    }

    async fn full_listing(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let cache_reachable = match self.cached_listing().await {
            Ok(Some(listing)) => {
                debug!(key = %self.settings.key, entries = listing.len(), "Transaction listing cache hit");
                return Ok(listing);
            }
            Ok(None) => {
                debug!(key = %self.settings.key, "Transaction listing cache miss");
                true
            }
            Err(e) => {
                warn!(key = %self.settings.key, error = %e, "Cache read failed, reading from store");
                false
            }
        };

        let listing = store_call(self.timeouts.store, self.store.list_ledger_entries()).await?;

        if cache_reachable {
            self.populate(&listing).await;
        }
        Ok(listing)
    }

    async fn cached_listing(&self) -> Result<Option<Vec<LedgerEntry>>, LedgerError> {
        let bytes = cache_call(self.timeouts.cache, self.cache.get(&self.settings.key)).await?;
        bytes
            .map(|bytes| {
                serde_json::from_slice(&bytes).map_err(|e| {
                    LedgerError::cache_unavailable(format!("undecodable cached listing: {}", e))
                })
            })
            .transpose()
    }

    async fn populate(&self, listing: &[LedgerEntry]) {
        let bytes = match serde_json::to_vec(listing) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to encode transaction listing");
                return;
            }
        };

        let result = cache_call(
            self.timeouts.cache,
            self.cache.set(&self.settings.key, bytes, self.settings.ttl),
        )
        .await;
        if let Err(e) = result {
            warn!(key = %self.settings.key, error = %e, "Failed to populate transaction listing cache");
        }
    }
}
