//! Shared fixtures: in-memory database, scripted chain client, sample data.

mod tracking_tests;

use crate::{
    auth::JwtService,
    blockchain::{
        client::{ChainClient, ClientError},
        models::{RawReceipt, RawTransaction},
        TransactionResolver,
    },
    config::Config,
    db::{self, migration::run_migrations},
    models::TransactionRecord,
    tracking::TransactionTracker,
};
use async_trait::async_trait;
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

pub const TEST_SECRET: &str = "test-secret-key";

/// Deterministic, well-formed 32-byte hash.
pub fn hash(n: u64) -> String {
    format!("0x{:064x}", n)
}

pub fn address(n: u64) -> String {
    format!("0x{:040x}", n)
}

/// Single-connection in-memory database so every query sees the same data.
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid sqlite url")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory database");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

/// Creates a user without going through Argon2.
pub async fn create_test_user(pool: &SqlitePool, username: &str) -> i64 {
    db::user::create_user(pool, username, "not-a-real-hash")
        .await
        .expect("Failed to create user")
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        api_prefix: "lime".to_string(),
        eth_node_url: "http://127.0.0.1:0".to_string(),
        rpc_timeout_secs: 1,
        rpc_max_retries: 0,
        rpc_rate_limit: None,
        fetch_concurrency: None,
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiry: Duration::from_secs(3600),
        user_lock_idle: Duration::from_secs(60),
        seed_users: false,
    }
}

/// A record as it would be stored after a successful fetch.
pub fn sample_record(n: u64) -> TransactionRecord {
    TransactionRecord {
        hash: hash(n),
        status: 1,
        block_hash: hash(1_000 + n),
        block_number: 17_000_000 + n as i64,
        from: address(1),
        to: Some(address(2)),
        contract_address: None,
        logs_count: 1,
        input: "0x".to_string(),
        value: (n as u128 * 1_000_000_000_000_000_000u128).to_string(),
    }
}

pub fn raw_transaction(n: u64) -> RawTransaction {
    serde_json::from_value(json!({
        "hash": hash(n),
        "from": address(1),
        "to": address(2),
        "blockHash": hash(1_000 + n),
        "blockNumber": format!("0x{:x}", 17_000_000 + n),
        "input": "0x",
        "value": format!("0x{:x}", n as u128 * 1_000_000_000_000_000_000u128),
    }))
    .expect("valid raw transaction")
}

pub fn raw_receipt() -> RawReceipt {
    serde_json::from_value(json!({
        "status": "0x1",
        "contractAddress": null,
        "logs": [{ "address": address(3) }],
    }))
    .expect("valid raw receipt")
}

/// Scripted node. Unknown hashes return `None`; hashes marked failing
/// return an RPC error.
#[derive(Default)]
pub struct MockChainClient {
    transactions: HashMap<String, RawTransaction>,
    receipts: HashMap<String, RawReceipt>,
    failing: HashSet<String>,
    barrier: Option<Arc<Barrier>>,
    fail_block_number: bool,
    calls: Mutex<HashMap<String, usize>>,
    pub total_calls: AtomicUsize,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction(mut self, n: u64) -> Self {
        self.transactions.insert(hash(n), raw_transaction(n));
        self.receipts.insert(hash(n), raw_receipt());
        self
    }

    pub fn with_raw(mut self, hash: &str, tx: RawTransaction, receipt: Option<RawReceipt>) -> Self {
        self.transactions.insert(hash.to_string(), tx);
        if let Some(receipt) = receipt {
            self.receipts.insert(hash.to_string(), receipt);
        }
        self
    }

    pub fn failing(mut self, hash: &str) -> Self {
        self.failing.insert(hash.to_string());
        self
    }

    /// Every `get_transaction` call waits until `parties` calls are in flight.
    pub fn with_barrier(mut self, parties: usize) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn with_unreachable_node(mut self) -> Self {
        self.fail_block_number = true;
        self
    }

    /// `get_transaction` calls made for `hash`.
    pub fn calls_for(&self, hash: &str) -> usize {
        self.calls.lock().unwrap().get(hash).copied().unwrap_or(0)
    }

    pub fn calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_transaction(&self, hash: &str) -> Result<Option<RawTransaction>, ClientError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(hash.to_string()).or_insert(0) += 1;

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        if self.failing.contains(hash) {
            return Err(ClientError::Rpc { code: -32000, message: "node exploded".to_string() });
        }
        Ok(self.transactions.get(hash).cloned())
    }

    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<RawReceipt>, ClientError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(hash) {
            return Err(ClientError::Rpc { code: -32000, message: "node exploded".to_string() });
        }
        Ok(self.receipts.get(hash).cloned())
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        if self.fail_block_number {
            return Err(ClientError::EmptyResult("eth_blockNumber".to_string()));
        }
        Ok(17_000_042)
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub chain: Arc<MockChainClient>,
    pub jwt: Arc<JwtService>,
    pub tracker: Arc<TransactionTracker>,
    pub resolver: TransactionResolver,
}

pub async fn harness(chain: MockChainClient) -> Harness {
    harness_with_pool(test_pool().await, chain)
}

pub fn harness_with_pool(pool: SqlitePool, chain: MockChainClient) -> Harness {
    let chain = Arc::new(chain);
    let jwt = Arc::new(JwtService::new(TEST_SECRET, Duration::from_secs(3600)));
    let tracker = Arc::new(TransactionTracker::new(pool.clone(), Duration::from_secs(60)));
    let resolver = TransactionResolver::new(pool.clone(), chain.clone(), jwt.clone(), tracker.clone());

    Harness {
        pool,
        chain,
        jwt,
        tracker,
        resolver,
    }
}

pub async fn link_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM user_transactions")
        .fetch_one(pool)
        .await
        .expect("count query")
}
