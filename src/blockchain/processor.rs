use crate::auth::TokenVerifier;
use crate::blockchain::client::ChainClient;
use crate::blockchain::models::normalize_transaction;
use crate::blockchain::rlp::{decode_hash_list, DecodeError};
use crate::db::{transaction, PersistenceError};
use crate::models::TransactionRecord;
use crate::tracking::TransactionTracker;
use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to decode RLP data: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] PersistenceError),
}

/// Outcome of fetching one unknown hash from the node.
#[derive(Debug)]
enum FetchOutcome {
    Resolved(TransactionRecord),
    Absent,
}

/// Turns transaction hashes into stored records, fetching unknown ones from
/// the chain. Holds no state between calls.
pub struct TransactionResolver {
    pool: SqlitePool,
    chain: Arc<dyn ChainClient>,
    tokens: Arc<dyn TokenVerifier>,
    tracker: Arc<TransactionTracker>,
    fetch_concurrency: Option<usize>,
}

impl TransactionResolver {
    pub fn new(
        pool: SqlitePool,
        chain: Arc<dyn ChainClient>,
        tokens: Arc<dyn TokenVerifier>,
        tracker: Arc<TransactionTracker>,
    ) -> Self {
        Self {
            pool,
            chain,
            tokens,
            tracker,
            fetch_concurrency: None,
        }
    }

    /// Caps how many unknown hashes are fetched at once. `None` fetches all
    /// of them concurrently.
    pub fn with_fetch_concurrency(mut self, limit: Option<usize>) -> Self {
        self.fetch_concurrency = limit.filter(|n| *n > 0);
        self
    }

    /// Resolves `hashes` in order. Hashes that cannot be fetched, validated
    /// or stored are left out of the result instead of failing the batch.
    /// With a valid `caller_token` the whole result is added to the
    /// caller's history.
    pub async fn resolve(
        &self,
        hashes: &[String],
        caller_token: Option<&str>,
    ) -> Result<Vec<TransactionRecord>, ResolveError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(position) = hashes.iter().position(|h| h.trim().is_empty()) {
            return Err(ResolveError::InvalidArgument(format!(
                "transaction hash at position {} is empty",
                position
            )));
        }

        let stored: HashMap<String, TransactionRecord> = transaction::find_by_hashes(&self.pool, hashes)
            .await?
            .into_iter()
            .map(|record| (record.hash.clone(), record))
            .collect();

        let mut queued = HashSet::new();
        let missing: Vec<&str> = hashes
            .iter()
            .map(String::as_str)
            .filter(|h| !stored.contains_key(*h) && queued.insert(*h))
            .collect();

        debug!("Resolving {} hashes: {} stored, {} to fetch", hashes.len(), stored.len(), missing.len());

        // Keyed by the requested spelling of the hash.
        let mut fetched: HashMap<&str, TransactionRecord> = HashMap::new();
        if !missing.is_empty() {
            let outcomes = self.fetch_all(&missing).await;
            for (hash, outcome) in missing.iter().zip(outcomes) {
                if let FetchOutcome::Resolved(record) = outcome {
                    fetched.insert(*hash, record);
                }
            }
        }

        let resolved: Vec<TransactionRecord> = hashes
            .iter()
            .filter_map(|h| stored.get(h).or_else(|| fetched.get(h.as_str())).cloned())
            .collect();

        if resolved.len() < hashes.len() {
            info!("Resolved {} of {} requested transactions", resolved.len(), hashes.len());
        }

        if let Some(token) = caller_token {
            self.track_for_caller(token, &resolved).await;
        }

        Ok(resolved)
    }

    /// Decodes an RLP hash list and resolves it.
    pub async fn resolve_rlp(
        &self,
        rlphex: &str,
        caller_token: Option<&str>,
    ) -> Result<Vec<TransactionRecord>, ResolveError> {
        let hashes = decode_hash_list(rlphex).map_err(|e| {
            error!("RLP decoding error: {}", e);
            e
        })?;
        self.resolve(&hashes, caller_token).await
    }

    /// Fetches every hash and waits for all of them to settle. Output order
    /// follows `hashes`.
    async fn fetch_all(&self, hashes: &[&str]) -> Vec<FetchOutcome> {
        match self.fetch_concurrency {
            Some(limit) => {
                let fetches: Vec<_> = hashes.iter().map(|hash| self.fetch_one(hash)).collect();
                stream::iter(fetches)
                    .buffered(limit)
                    .collect()
                    .await
            }
            None => futures::future::join_all(hashes.iter().map(|hash| self.fetch_one(hash))).await,
        }
    }

    async fn fetch_one(&self, hash: &str) -> FetchOutcome {
        let (tx, receipt) = tokio::join!(
            self.chain.get_transaction(hash),
            self.chain.get_transaction_receipt(hash)
        );

        let (tx, receipt) = match (tx, receipt) {
            (Ok(Some(tx)), Ok(Some(receipt))) => (tx, receipt),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Error fetching transaction {}: {}", hash, e);
                return FetchOutcome::Absent;
            }
            _ => {
                debug!("Transaction or receipt for {} not available from node", hash);
                return FetchOutcome::Absent;
            }
        };

        let record = match normalize_transaction(&tx, &receipt) {
            Ok(record) => record,
            Err(e) => {
                error!("Transaction validation failed for {}: {}", hash, e);
                return FetchOutcome::Absent;
            }
        };

        if !record.hash.eq_ignore_ascii_case(hash) {
            warn!("Node returned transaction {} when asked for {}", record.hash, hash);
            return FetchOutcome::Absent;
        }

        self.persist(record).await
    }

    /// Stores a new record. When the insert fails (typically a concurrent
    /// request stored the same hash first) the stored row is returned, so the
    /// response always reflects the store.
    async fn persist(&self, record: TransactionRecord) -> FetchOutcome {
        match transaction::insert(&self.pool, &record).await {
            Ok(saved) => {
                debug!("Stored transaction {}", saved.hash);
                FetchOutcome::Resolved(saved)
            }
            Err(e) => {
                if e.is_conflict() {
                    debug!("Transaction {} was stored concurrently, re-reading", record.hash);
                } else {
                    error!("Failed to save transaction {}: {}", record.hash, e);
                }

                let hash = std::slice::from_ref(&record.hash);
                match transaction::find_by_hashes(&self.pool, hash).await {
                    Ok(mut rows) => rows.pop().map_or(FetchOutcome::Absent, FetchOutcome::Resolved),
                    Err(e) => {
                        error!("Failed to re-read transaction {}: {}", record.hash, e);
                        FetchOutcome::Absent
                    }
                }
            }
        }
    }

    async fn track_for_caller(&self, token: &str, records: &[TransactionRecord]) {
        let user_id = match self.tokens.verify(token).await {
            Ok(user_id) => user_id,
            Err(e) => {
                warn!("Failed to verify caller token, skipping tracking: {}", e);
                return;
            }
        };

        if let Err(e) = self.tracker.track(user_id, records).await {
            error!("Failed to track transactions for user {}: {}", user_id, e);
        }
    }
}
