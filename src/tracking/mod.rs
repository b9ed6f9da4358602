//! Many-to-many history of which user resolved which transaction.

pub mod locks;

use crate::db::{user_transaction, PersistenceError};
use crate::models::TransactionRecord;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

pub use locks::UserLocks;

pub struct TransactionTracker {
    pool: SqlitePool,
    locks: UserLocks,
}

impl TransactionTracker {
    pub fn new(pool: SqlitePool, lock_idle: Duration) -> Self {
        Self {
            pool,
            locks: UserLocks::new(lock_idle),
        }
    }

    /// Merges `records` into the user's history.
    ///
    /// The history only grows and holds each hash once. Calls for the same
    /// user are serialized, and the merge is one write-only SQL transaction
    /// so concurrent calls for different users queue on the write lock
    /// instead of failing. An unknown user id is a silent no-op.
    pub async fn track(&self, user_id: i64, records: &[TransactionRecord]) -> Result<(), PersistenceError> {
        let mut seen = HashSet::new();
        let additions: Vec<String> = records
            .iter()
            .filter(|record| seen.insert(record.hash.as_str()))
            .map(|record| record.hash.clone())
            .collect();

        if additions.is_empty() {
            return Ok(());
        }

        let _guard = self.locks.acquire(user_id).await;

        let mut tx = self.pool.begin().await?;
        let inserted = user_transaction::append_links(&mut tx, user_id, &additions).await?;
        tx.commit().await?;

        if inserted == 0 {
            debug!("Nothing new to track for user {} ({} hashes)", user_id, additions.len());
        } else {
            info!("Tracked {} new transactions for user {}", inserted, user_id);
        }
        Ok(())
    }

    /// The user's full history, or an empty list for an unknown user.
    pub async fn get_for_user(&self, user_id: i64) -> Result<Vec<TransactionRecord>, PersistenceError> {
        let mut conn = self.pool.acquire().await?;
        user_transaction::records_for_user(&mut conn, user_id).await
    }
}
