// Configuration structure for:
// - Database connection string
// - Server listening address/port and global route prefix
// - Ethereum node endpoint (timeout, retries, rate limit)
// - JWT signing secret and token lifetime
// - Resolution fan-out cap and per-user lock eviction

use dotenv::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_prefix: String,
    pub eth_node_url: String,
    pub rpc_timeout_secs: u64,
    pub rpc_max_retries: usize,
    pub rpc_rate_limit: Option<u32>,
    pub fetch_concurrency: Option<usize>,
    pub jwt_secret: String,
    pub jwt_expiry: Duration,
    pub user_lock_idle: Duration,
    pub seed_users: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data.db".to_string());
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| num_cpus::get().max(2) as u32);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);
        let api_prefix = env::var("API_PREFIX")
            .map(|p| p.trim_matches('/').to_string())
            .unwrap_or_else(|_| "lime".to_string());
        let eth_node_url = env::var("ETH_NODE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string());
        let rpc_timeout_secs = env::var("RPC_TIMEOUT_SECS")
            .map(|v| v.parse().unwrap_or(30))
            .unwrap_or(30);
        let rpc_max_retries = env::var("RPC_MAX_RETRIES")
            .map(|v| v.parse().unwrap_or(3))
            .unwrap_or(3);
        let rpc_rate_limit = env::var("RPC_RATE_LIMIT")
            .map(|v| v.parse().ok())
            .unwrap_or(None);
        let fetch_concurrency = env::var("FETCH_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0);
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using an insecure development secret");
            "development-secret-change-me".to_string()
        });
        let jwt_expiry = env::var("JWT_EXPIRY_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));
        let user_lock_idle = env::var("USER_LOCK_IDLE_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(600));
        let seed_users = env::var("SEED_USERS")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Self {
            database_url,
            db_max_connections,
            server_host,
            server_port,
            api_prefix,
            eth_node_url,
            rpc_timeout_secs,
            rpc_max_retries,
            rpc_rate_limit,
            fetch_concurrency,
            jwt_secret,
            jwt_expiry,
            user_lock_idle,
            seed_users,
        }
    }
}
