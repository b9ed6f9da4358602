use crate::db::{classify, PersistenceError};
use crate::models::TransactionRecord;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashSet;

// SQLite caps bound parameters per statement.
const LOOKUP_CHUNK: usize = 500;

pub(crate) const RECORD_COLUMNS: &str = "t.transaction_hash, t.transaction_status, t.block_hash, t.block_number, \
     t.from_address, t.to_address, t.contract_address, t.logs_count, t.input, t.value";

pub(crate) fn record_from_row(row: &SqliteRow) -> Result<TransactionRecord, sqlx::Error> {
    Ok(TransactionRecord {
        hash: row.try_get("transaction_hash")?,
        status: row.try_get("transaction_status")?,
        block_hash: row.try_get("block_hash")?,
        block_number: row.try_get("block_number")?,
        from: row.try_get("from_address")?,
        to: row.try_get("to_address")?,
        contract_address: row.try_get("contract_address")?,
        logs_count: row.try_get("logs_count")?,
        input: row.try_get("input")?,
        value: row.try_get("value")?,
    })
}

/// Returns the stored records among `hashes`. Unknown hashes are simply
/// absent from the result; duplicates in the input are looked up once.
pub async fn find_by_hashes(
    pool: &SqlitePool,
    hashes: &[String],
) -> Result<Vec<TransactionRecord>, PersistenceError> {
    let mut seen = HashSet::new();
    let unique: Vec<&String> = hashes.iter().filter(|h| seen.insert(h.as_str())).collect();

    let mut records = Vec::with_capacity(unique.len());
    for chunk in unique.chunks(LOOKUP_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM transactions t WHERE t.transaction_hash IN (",
            RECORD_COLUMNS
        ));
        let mut separated = builder.separated(", ");
        for hash in chunk {
            separated.push_bind(hash.as_str());
        }
        separated.push_unseparated(")");

        let rows = builder.build().fetch_all(pool).await?;
        for row in &rows {
            records.push(record_from_row(row)?);
        }
    }

    Ok(records)
}

/// Inserts a new record. Never overwrites: an existing hash yields
/// `PersistenceError::Conflict`.
pub async fn insert(
    pool: &SqlitePool,
    record: &TransactionRecord,
) -> Result<TransactionRecord, PersistenceError> {
    sqlx::query(
        r#"
        INSERT INTO transactions
        (transaction_hash, transaction_status, block_hash, block_number, from_address,
         to_address, contract_address, logs_count, input, value)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.hash)
    .bind(record.status)
    .bind(&record.block_hash)
    .bind(record.block_number)
    .bind(&record.from)
    .bind(&record.to)
    .bind(&record.contract_address)
    .bind(record.logs_count)
    .bind(&record.input)
    .bind(&record.value)
    .execute(pool)
    .await
    .map_err(classify)?;

    Ok(record.clone())
}

/// Every stored transaction, oldest first.
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<TransactionRecord>, PersistenceError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM transactions t ORDER BY t.rowid ASC",
        RECORD_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| record_from_row(row).map_err(PersistenceError::from))
        .collect()
}
