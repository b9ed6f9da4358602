use crate::blockchain::models::{RawReceipt, RawTransaction};
use crate::config::Config;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed RPC response: {0}")]
    Decode(String),

    #[error("Empty result for {0}")]
    EmptyResult(String),
}

impl ClientError {
    /// Network-level failures worth retrying. Node-reported errors and
    /// malformed payloads will not improve on a second attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

/// Read access to an Ethereum node. A `None` result means the node does not
/// know the hash (yet); an `Err` means the call itself failed.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_transaction(&self, hash: &str) -> Result<Option<RawTransaction>, ClientError>;

    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<RawReceipt>, ClientError>;

    async fn block_number(&self) -> Result<u64, ClientError>;
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// JSON-RPC 2.0 client for a single node endpoint.
pub struct EthRpcClient {
    http: reqwest::Client,
    url: String,
    max_retries: usize,
    limiter: Option<DefaultDirectRateLimiter>,
    next_id: AtomicU64,
}

impl EthRpcClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let timeout = Duration::from_secs(config.rpc_timeout_secs);
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        let limiter = config
            .rpc_rate_limit
            .and_then(NonZeroU32::new)
            .map(|per_sec| RateLimiter::direct(Quota::per_second(per_sec)));

        info!(
            "Initializing Ethereum client with RPC endpoint: {}, timeout: {:?}, rate limit: {:?}/s",
            config.eth_node_url, timeout, config.rpc_rate_limit
        );

        Ok(Self {
            http,
            url: config.eth_node_url.clone(),
            max_retries: config.rpc_max_retries,
            limiter,
            next_id: AtomicU64::new(1),
        })
    }

    async fn send(&self, method: &str, params: &Value) -> Result<Option<Value>, ClientError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(ClientError::Rpc { code: err.code, message: err.message });
        }

        Ok(response.result.filter(|v| !v.is_null()))
    }

    /// Issues `method` with retries on transient failures and decodes a
    /// nullable result.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, ClientError> {
        let result = (|| async { self.send(method, &params).await })
            .retry(ExponentialBuilder::default().with_max_times(self.max_retries))
            .when(|e: &ClientError| e.is_transient())
            .notify(|e: &ClientError, delay: Duration| {
                warn!("{} failed ({}), retrying in {:?}", method, e, delay);
            })
            .await?;

        match result {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ClientError::Decode(format!("{}: {}", method, e))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ChainClient for EthRpcClient {
    async fn get_transaction(&self, hash: &str) -> Result<Option<RawTransaction>, ClientError> {
        debug!("eth_getTransactionByHash {}", hash);
        self.call("eth_getTransactionByHash", json!([hash])).await
    }

    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<RawReceipt>, ClientError> {
        debug!("eth_getTransactionReceipt {}", hash);
        self.call("eth_getTransactionReceipt", json!([hash])).await
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        let raw: Option<String> = self.call("eth_blockNumber", json!([])).await?;
        let raw = raw.ok_or_else(|| ClientError::EmptyResult("eth_blockNumber".to_string()))?;
        let digits = raw.trim_start_matches("0x");
        u64::from_str_radix(digits, 16).map_err(|e| ClientError::Decode(format!("eth_blockNumber {:?}: {}", raw, e)))
    }
}
