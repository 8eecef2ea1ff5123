//! Account administration
//!
//! Opening accounts and listing them. Balances are only ever changed
//! afterwards through [`crate::core::BalanceMutator`].

use super::deadline::store_call;
use super::traits::LedgerStore;
use crate::config::Timeouts;
use crate::types::{Account, AccountId, LedgerError, NewAccount};
use std::sync::Arc;
use tracing::info;

pub struct AccountService<S> {
    store: Arc<S>,
    timeouts: Timeouts,
}

impl<S: LedgerStore> AccountService<S> {
    /// Create an account service
    ///
    /// # Arguments
    ///
    /// * `store` - Ledger store holding the accounts
    /// * `timeouts` - Deadline applied to every store call
    pub fn new(store: Arc<S>, timeouts: Timeouts) -> Self {
        Self { store, timeouts }
    }

    /// Validate and persist a new account
    ///
    /// # Arguments
    ///
    /// * `request` - Name and opening balance
    ///
    /// # Returns
    ///
    /// The stored account with its assigned id
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAccount` - name or opening balance rejected
    /// * `LedgerError::StoreUnavailable` - store failure or timeout
    pub async fn open_account(&self, request: NewAccount) -> Result<Account, LedgerError> {
        let request = request.validate()?;
        let account = store_call(self.timeouts.store, self.store.create_account(request)).await?;
        info!(account = account.id, name = %account.name, balance = %account.balance, "Account opened");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        store_call(self.timeouts.store, self.store.get_account(id))
            .await?
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    /// All accounts ordered by name
    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        store_call(self.timeouts.store, self.store.list_accounts()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::MemoryLedgerStore;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_open_and_fetch_account() {
        let service = AccountService::new(Arc::new(MemoryLedgerStore::new()), Timeouts::default());

        let opened = service
            .open_account(NewAccount::new("Carol", Decimal::new(25, 0)))
            .await
            .unwrap();
        let fetched = service.get_account(opened.id).await.unwrap();

        assert_eq!(fetched, opened);
        assert_eq!(fetched.balance.to_string(), "25.00");
    }

    #[tokio::test]
    async fn test_get_unknown_account() {
        let service = AccountService::new(Arc::new(MemoryLedgerStore::new()), Timeouts::default());
        assert_eq!(
            service.get_account(9999).await,
            Err(LedgerError::account_not_found(9999))
        );
    }
}
