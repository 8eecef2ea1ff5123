//! I/O module
//!
//! Handles wire payloads and session files.
//!
//! # Components
//!
//! - `wire` - JSON encoding of queued withdrawal requests
//! - `csv_format` - CSV record conversion and balance report output
//! - `async_reader` - Asynchronous CSV reader with batch reading interface

pub mod async_reader;
pub mod csv_format;
pub mod wire;

pub use async_reader::AsyncReader;
pub use csv_format::{write_accounts_csv, TransferRequest};
pub use wire::{decode_withdrawal, encode_withdrawal, WithdrawalRequest};
