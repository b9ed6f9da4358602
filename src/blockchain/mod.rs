pub mod client;
pub mod models;
pub mod processor;
pub mod rlp;

// Re-exports for convenience
pub use client::{ChainClient, EthRpcClient};
pub use processor::{ResolveError, TransactionResolver};
