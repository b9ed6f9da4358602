pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod db;
pub mod models;
pub mod state;
pub mod tracking;
pub mod validation;

#[cfg(test)]
pub mod tests;

// Re-export specific items for convenience
pub use api::error::ApiError;
pub use api::route::create_router;
pub use blockchain::{ChainClient, EthRpcClient, ResolveError, TransactionResolver};
pub use models::TransactionRecord;
pub use tracking::TransactionTracker;
