use crate::auth::JwtService;
use crate::blockchain::{ChainClient, TransactionResolver};
use crate::config::Config;
use crate::tracking::TransactionTracker;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db_pool: SqlitePool,
    pub chain: Arc<dyn ChainClient>,
    pub jwt: Arc<JwtService>,
    pub tracker: Arc<TransactionTracker>,
    pub resolver: Arc<TransactionResolver>,
}

impl AppState {
    /// Wires the resolution pipeline around an already-open pool and chain client.
    pub fn new(config: Config, db_pool: SqlitePool, chain: Arc<dyn ChainClient>) -> Self {
        let jwt = Arc::new(JwtService::new(&config.jwt_secret, config.jwt_expiry));
        let tracker = Arc::new(TransactionTracker::new(db_pool.clone(), config.user_lock_idle));
        let resolver = Arc::new(
            TransactionResolver::new(db_pool.clone(), chain.clone(), jwt.clone(), tracker.clone())
                .with_fetch_concurrency(config.fetch_concurrency),
        );

        Self {
            config,
            db_pool,
            chain,
            jwt,
            tracker,
            resolver,
        }
    }
}
