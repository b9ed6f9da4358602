use crate::db::{classify, PersistenceError};
use crate::models::User;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password")?,
    })
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>, PersistenceError> {
    let row = sqlx::query("SELECT id, username, password FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(user_from_row).transpose()?)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, PersistenceError> {
    let row = sqlx::query("SELECT id, username, password FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(user_from_row).transpose()?)
}

/// Stores a new user with an already-hashed password and returns its id.
pub async fn create_user(pool: &SqlitePool, username: &str, password_hash: &str) -> Result<i64, PersistenceError> {
    let result = sqlx::query("INSERT INTO users (username, password) VALUES (?, ?)")
        .bind(username)
        .bind(password_hash)
        .execute(pool)
        .await
        .map_err(classify)?;

    Ok(result.last_insert_rowid())
}

pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<bool, PersistenceError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
