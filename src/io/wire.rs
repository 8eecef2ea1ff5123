//! Wire format of queued withdrawal requests
//!
//! A withdrawal travels through the queue as a JSON object:
//!
//! ```json
//! {"sender_id": 1, "amount": "200.00", "request_id": "5f0e..."}
//! ```
//!
//! `amount` is a decimal string with at most two fractional digits.
//! `request_id` is optional and, when present, makes the request idempotent.
//! Anything else (invalid JSON, missing or wrong-typed fields, ids below 1,
//! amounts out of range) is a `MalformedMessage`.

use crate::types::{validate_amount, AccountId, IdempotencyKey, LedgerError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// JSON shape of a withdrawal message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireWithdrawal {
    pub sender_id: AccountId,
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Decoded, validated withdrawal request
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalRequest {
    pub sender_id: AccountId,
    /// Scale 2, within the accepted range
    pub amount: Decimal,
    pub request_id: Option<IdempotencyKey>,
}

/// Convert the JSON shape into a validated request
pub fn convert_wire_withdrawal(wire: WireWithdrawal) -> Result<WithdrawalRequest, LedgerError> {
    if wire.sender_id == 0 {
        return Err(LedgerError::malformed("sender_id must be at least 1"));
    }

    let amount = Decimal::from_str(wire.amount.trim())
        .map_err(|_| LedgerError::malformed(format!("invalid amount '{}'", wire.amount)))?;
    let amount = validate_amount(amount)
        .map_err(|_| LedgerError::malformed(format!("amount '{}' out of range", wire.amount)))?;

    let request_id = match wire.request_id {
        Some(id) if id.trim().is_empty() => {
            return Err(LedgerError::malformed("request_id must not be empty"))
        }
        Some(id) => Some(IdempotencyKey::new(id)),
        None => None,
    };

    Ok(WithdrawalRequest {
        sender_id: wire.sender_id,
        amount,
        request_id,
    })
}

/// Decode a queued payload
///
/// # Errors
///
/// * `LedgerError::MalformedMessage` - the payload can never be processed
pub fn decode_withdrawal(payload: &[u8]) -> Result<WithdrawalRequest, LedgerError> {
    let wire: WireWithdrawal = serde_json::from_slice(payload)?;
    convert_wire_withdrawal(wire)
}

/// Encode a request for publishing
pub fn encode_withdrawal(request: &WithdrawalRequest) -> Result<Vec<u8>, LedgerError> {
    let wire = WireWithdrawal {
        sender_id: request.sender_id,
        amount: request.amount.to_string(),
        request_id: request
            .request_id
            .as_ref()
            .map(|key| key.as_str().to_string()),
    };
    Ok(serde_json::to_vec(&wire)?)
}
