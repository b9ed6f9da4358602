use crate::models::TransactionRecord;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid transaction field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ValidationError {
    fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField { field, reason: reason.into() }
    }
}

fn is_prefixed_hex(value: &str, hex_len: Option<usize>) -> bool {
    let Some(digits) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) else {
        return false;
    };
    if let Some(len) = hex_len {
        if digits.len() != len {
            return false;
        }
    }
    digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// 32-byte `0x`-prefixed hash.
pub fn is_hash(value: &str) -> bool {
    is_prefixed_hex(value, Some(64))
}

/// 20-byte `0x`-prefixed address. Checksum casing is not enforced.
pub fn is_address(value: &str) -> bool {
    is_prefixed_hex(value, Some(40))
}

/// Checks a freshly normalized record before it is persisted. A malformed
/// node response must never reach the store.
pub fn validate_transaction_record(record: &TransactionRecord) -> Result<(), ValidationError> {
    if !is_hash(&record.hash) {
        return Err(ValidationError::field("transactionHash", format!("not a 32-byte hex hash: {:?}", record.hash)));
    }

    if record.status != 0 && record.status != 1 {
        return Err(ValidationError::field("transactionStatus", format!("expected 0 or 1, got {}", record.status)));
    }

    if !record.block_hash.is_empty() && !is_hash(&record.block_hash) {
        return Err(ValidationError::field("blockHash", format!("not a 32-byte hex hash: {:?}", record.block_hash)));
    }

    if record.block_number < 0 {
        return Err(ValidationError::field("blockNumber", "must be non-negative"));
    }

    if !is_address(&record.from) {
        return Err(ValidationError::field("from", format!("not an address: {:?}", record.from)));
    }

    if let Some(to) = &record.to {
        if !is_address(to) {
            return Err(ValidationError::field("to", format!("not an address: {:?}", to)));
        }
    }

    if let Some(contract) = &record.contract_address {
        if !is_address(contract) {
            return Err(ValidationError::field("contractAddress", format!("not an address: {:?}", contract)));
        }
    }

    if record.logs_count < 0 {
        return Err(ValidationError::field("logsCount", "must be non-negative"));
    }

    if !is_prefixed_hex(&record.input, None) || record.input.len() % 2 != 0 {
        return Err(ValidationError::field("input", "not an even-length 0x-prefixed hex string"));
    }

    if record.value.is_empty() || !record.value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::field("value", format!("not a decimal integer: {:?}", record.value)));
    }

    Ok(())
}

/// Path segment carrying an RLP hex blob, e.g. `GET /eth/{rlphex}`.
pub fn validate_rlp_hex(rlphex: &str) -> Result<(), ValidationError> {
    if rlphex.trim().is_empty() {
        return Err(ValidationError::MissingParameter("rlphex".to_string()));
    }

    if !rlphex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidParameter("Invalid RLP hex string".to_string()));
    }

    Ok(())
}

/// Turns the raw `transactionHashes` query values into a hash list.
///
/// A single value is parsed as a JSON array of strings when possible and
/// otherwise taken as one literal hash. Repeated keys are used verbatim.
pub fn parse_transaction_hashes(values: Vec<String>) -> Result<Vec<String>, ValidationError> {
    match values.len() {
        0 => Err(ValidationError::MissingParameter("transactionHashes".to_string())),
        1 => {
            let raw = values.into_iter().next().unwrap_or_default();
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(serde_json::Value::Array(items)) if items.iter().all(|i| i.is_string()) => Ok(items
                    .into_iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect()),
                _ => Ok(vec![raw]),
            }
        }
        _ => Ok(values),
    }
}
