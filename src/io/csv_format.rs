//! CSV format handling for session inputs and the balance report
//!
//! This module centralizes all CSV format concerns, providing:
//! - Record structures for account seeds and transfer requests
//! - Conversion from CSV records to domain types
//! - Account balance output serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{Account, AccountId, NewAccount};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Account seed row: `name,balance`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountRecord {
    pub name: String,
    pub balance: Option<String>,
}

/// Transfer request row: `sender_id,receiver_id,amount`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TransferRecord {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: String,
}

/// Parsed transfer request
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Decimal,
}

fn parse_decimal(value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|_| format!("Invalid amount '{}'", value))
}

/// Convert an account seed row; a missing balance opens the account at zero
pub fn convert_account_record(record: AccountRecord) -> Result<NewAccount, String> {
    let balance = match record.balance {
        Some(balance) if !balance.trim().is_empty() => parse_decimal(&balance)?,
        _ => Decimal::ZERO,
    };
    Ok(NewAccount::new(record.name, balance))
}

/// Convert a transfer row; range checks happen in the balance-mutation primitive
pub fn convert_transfer_record(record: TransferRecord) -> Result<TransferRequest, String> {
    Ok(TransferRequest {
        sender_id: record.sender_id,
        receiver_id: record.receiver_id,
        amount: parse_decimal(&record.amount)?,
    })
}

/// Write account balances in CSV format
///
/// Writes accounts with columns: id, name, balance. Accounts are sorted by id
/// for deterministic output and balances always carry two decimals.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["id", "name", "balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.id);

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.id.to_string(),
                account.name.clone(),
                format!("{:.2}", account.balance),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
