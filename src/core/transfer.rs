//! Synchronous transfer entry point
//!
//! [`TransferEngine`] is what the API layer calls for a transfer. It delegates
//! the balance mutation to the shared [`BalanceMutator`] and logs rejections
//! by class: domain errors are expected traffic, transient errors are not.

use super::mutation::BalanceMutator;
use super::traits::{Cache, LedgerStore};
use crate::types::{AccountId, ErrorClass, LedgerEntry, LedgerError};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};

pub struct TransferEngine<S, C> {
    mutator: Arc<BalanceMutator<S, C>>,
}

impl<S: LedgerStore, C: Cache> TransferEngine<S, C> {
    /// Create a transfer engine on top of the shared balance mutator
    ///
    /// # Arguments
    ///
    /// * `mutator` - The balance writer, shared with the withdrawal workers
    pub fn new(mutator: Arc<BalanceMutator<S, C>>) -> Self {
        Self { mutator }
    }

    /// Transfer `amount` from `sender` to `receiver`
    ///
    /// Returns the committed ledger entry. See
    /// [`BalanceMutator::apply_transfer`] for the error conditions.
    pub async fn transfer(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Decimal,
    ) -> Result<LedgerEntry, LedgerError> {
        match self.mutator.apply_transfer(sender, receiver, amount).await {
            Ok(entry) => Ok(entry),
            Err(e) => {
                match e.class() {
                    ErrorClass::Transient => {
                        error!(sender, receiver, amount = %amount, error = %e, "Transfer failed")
                    }
                    ErrorClass::Domain | ErrorClass::Malformed => {
                        info!(sender, receiver, amount = %amount, reason = %e, "Transfer rejected")
                    }
                }
                Err(e)
            }
        }
    }
}
