// Canonical transaction record as persisted and served over the API.
// User rows as stored by the credential collaborator.
// API request/response bodies.

use serde::{Deserialize, Serialize};

/// Validated transaction + receipt data. Write-once, keyed by `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(rename = "transactionHash")]
    pub hash: String,
    #[serde(rename = "transactionStatus")]
    pub status: i32,
    pub block_hash: String,
    pub block_number: i64,
    pub from: String,
    /// `None` for contract creation.
    pub to: Option<String>,
    pub contract_address: Option<String>,
    pub logs_count: i64,
    pub input: String,
    /// Base-10 rendering of a 256-bit unsigned integer.
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthenticateResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionRecord>,
}
