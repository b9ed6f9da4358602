//! Per-user write locks for the tracker

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Hands out one async mutex per user id. Idle entries are evicted so the
/// registry does not grow with every user ever seen.
#[derive(Clone)]
pub struct UserLocks {
    locks: Cache<i64, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub fn new(idle: Duration) -> Self {
        let locks = Cache::builder().time_to_idle(idle).build();

        Self { locks }
    }

    /// Waits for exclusive access to `user_id`'s association set.
    pub async fn acquire(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .get_with(user_id, async { Arc::new(Mutex::new(())) })
            .await;
        debug!("Acquiring tracking lock for user {}", user_id);
        lock.lock_owned().await
    }
}
