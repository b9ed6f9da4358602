use crate::models::TransactionRecord;
use crate::validation::{validate_transaction_record, ValidationError};
use alloy_primitives::U256;
use serde::Deserialize;
use serde_json::Value;

/// Transaction object as returned by `eth_getTransactionByHash`.
/// Quantities are kept as the node's hex strings until normalization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub hash: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    /// Older Parity/OpenEthereum nodes send the payload as `data`, some
    /// alongside `input`.
    #[serde(default)]
    pub data: Option<String>,
    pub value: String,
}

impl RawTransaction {
    /// Call data, preferring `input` over `data`. Empty when neither is set.
    pub fn call_data(&self) -> &str {
        self.input.as_deref().or(self.data.as_deref()).unwrap_or_default()
    }
}

/// Receipt object as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    /// Absent on pre-Byzantium receipts.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub logs: Vec<Value>,
}

fn parse_quantity(field: &'static str, raw: &str) -> Result<u64, ValidationError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ValidationError::InvalidField { field, reason: format!("not a hex quantity: {:?}", raw) })?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ValidationError::InvalidField { field, reason: format!("{:?}: {}", raw, e) })
}

/// Converts node data into a canonical record and validates it.
///
/// Missing status, block hash and block number default to `0`, `""` and
/// `0`. `value` goes through a 256-bit integer so no precision is lost.
pub fn normalize_transaction(tx: &RawTransaction, receipt: &RawReceipt) -> Result<TransactionRecord, ValidationError> {
    let status = match &receipt.status {
        Some(raw) => i32::try_from(parse_quantity("transactionStatus", raw)?).map_err(|_| {
            ValidationError::InvalidField { field: "transactionStatus", reason: format!("out of range: {}", raw) }
        })?,
        None => 0,
    };

    let block_number = match &tx.block_number {
        Some(raw) => i64::try_from(parse_quantity("blockNumber", raw)?).map_err(|_| {
            ValidationError::InvalidField { field: "blockNumber", reason: format!("out of range: {}", raw) }
        })?,
        None => 0,
    };

    let value = tx
        .value
        .parse::<U256>()
        .map_err(|e| ValidationError::InvalidField { field: "value", reason: format!("{:?}: {}", tx.value, e) })?;

    let record = TransactionRecord {
        hash: tx.hash.clone(),
        status,
        block_hash: tx.block_hash.clone().unwrap_or_default(),
        block_number,
        from: tx.from.clone(),
        to: tx.to.clone(),
        contract_address: receipt.contract_address.clone(),
        logs_count: receipt.logs.len() as i64,
        input: tx.call_data().to_string(),
        value: value.to_string(),
    };

    validate_transaction_record(&record)?;
    Ok(record)
}
