//! Caller identity: credential checks, JWT issuing and verification.
//!
//! The resolution pipeline only sees the [`TokenVerifier`] seam; the HTTP
//! layer additionally uses [`JwtService::issue`] and [`authenticate`].

pub mod password;

use crate::db::{self, PersistenceError};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Users created on a fresh database; each password equals the username.
pub const DEFAULT_USERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Failed to generate token: {0}")]
    TokenGeneration(String),

    #[error("Failed to hash password: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Maps an opaque caller token back to a user id.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<i64, AuthError>;
}

/// HS256 token issuer and verifier.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry: Duration,
}

impl JwtService {
    pub fn new(secret: &str, expiry: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            expiry,
        }
    }

    pub fn issue(&self, user_id: i64, username: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now,
            exp: now + self.expiry.as_secs().max(1) as i64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[async_trait]
impl TokenVerifier for JwtService {
    async fn verify(&self, token: &str) -> Result<i64, AuthError> {
        self.validate_token(token).map(|claims| claims.sub)
    }
}

/// Checks a username/password pair and returns a signed token.
pub async fn authenticate(
    pool: &SqlitePool,
    jwt: &JwtService,
    username: &str,
    password: &str,
) -> Result<String, AuthError> {
    let user = db::user::find_by_username(pool, username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !password::verify_password(password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    debug!("Issuing token for user {} ({})", user.username, user.id);
    jwt.issue(user.id, &user.username)
}

/// Inserts the default users that are not present yet.
pub async fn seed_default_users(pool: &SqlitePool) -> Result<usize, AuthError> {
    let mut created = 0;

    for username in DEFAULT_USERS {
        if db::user::find_by_username(pool, username).await?.is_some() {
            debug!("User {} already exists, skipping seed", username);
            continue;
        }

        let hash = password::hash_password(username).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        match db::user::create_user(pool, username, &hash).await {
            Ok(_) => {
                info!("Created user: {}", username);
                created += 1;
            }
            // Another instance seeded it first.
            Err(e) if e.is_conflict() => debug!("User {} seeded concurrently", username),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(created)
}
