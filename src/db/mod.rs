pub mod connection;
pub mod migration;
pub mod transaction;
pub mod user;
pub mod user_transaction;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    /// A row with the same key already exists. Transactions are write-once,
    /// so this is how a racing insert of the same hash surfaces.
    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl PersistenceError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Maps unique/primary-key violations to `Conflict`, everything else to `Storage`.
pub(crate) fn classify(err: sqlx::Error) -> PersistenceError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            PersistenceError::Conflict(db_err.message().to_string())
        }
        _ => PersistenceError::Storage(err),
    }
}
