use crate::db::transaction::{record_from_row, RECORD_COLUMNS};
use crate::db::PersistenceError;
use crate::models::TransactionRecord;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

// Two bound parameters per row.
const LINK_CHUNK: usize = 250;

/// Full records associated with `user_id`, in tracking order.
pub async fn records_for_user(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<TransactionRecord>, PersistenceError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM user_transactions ut
         JOIN transactions t ON t.transaction_hash = ut.transaction_hash
         WHERE ut.user_id = ?
         ORDER BY ut.rowid ASC",
        RECORD_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| record_from_row(row).map_err(PersistenceError::from))
        .collect()
}

/// Appends associations for `user_id`, keeping the order of `hashes`.
///
/// Each chunk is a single `INSERT .. SELECT` joined against `users`: pairs
/// that already exist are ignored and an unknown user inserts nothing. The
/// statement writes without a prior read, so it waits on the busy timeout
/// instead of failing a snapshot upgrade.
pub async fn append_links(
    conn: &mut SqliteConnection,
    user_id: i64,
    hashes: &[String],
) -> Result<u64, PersistenceError> {
    let mut inserted = 0;

    for chunk in hashes.chunks(LINK_CHUNK) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT OR IGNORE INTO user_transactions (user_id, transaction_hash) \
             SELECT u.id, a.column2 FROM users u, (VALUES ",
        );
        for (position, hash) in chunk.iter().enumerate() {
            if position > 0 {
                builder.push(", ");
            }
            builder
                .push("(")
                .push_bind(position as i64)
                .push(", ")
                .push_bind(hash.as_str())
                .push(")");
        }
        builder
            .push(") AS a WHERE u.id = ")
            .push_bind(user_id)
            .push(" ORDER BY a.column1");

        let result = builder.build().execute(&mut *conn).await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}
