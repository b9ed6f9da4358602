use crate::{
    api::{error::ApiError, response::JsonResponse},
    auth,
    db::{self, connection},
    models::{AuthenticateRequest, AuthenticateResponse, TransactionsResponse},
    state::AppState,
    validation::{parse_transaction_hashes, validate_rlp_hex, ValidationError},
};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

/// Header carrying the caller's token. `Authorization: Bearer` is accepted too.
pub const AUTH_TOKEN_HEADER: &str = "auth_token";

// Create router with all routes, mounted under the configured prefix
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let prefix = app_state.config.api_prefix.clone();

    let routes = Router::new()
        .route("/authenticate", post(authenticate))
        .route("/eth", get(get_transactions))
        .route("/eth/{rlphex}", get(get_transactions_by_rlp))
        .route("/my", get(get_my_transactions))
        .route("/all", get(get_all_transactions))
        .route("/health", get(health))
        .with_state(app_state);

    let router = if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&format!("/{}", prefix), routes)
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn caller_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let from_bearer = || {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    };

    from_header.or_else(from_bearer).map(str::to_string)
}

// POST /authenticate handler
async fn authenticate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AuthenticateRequest>,
) -> Result<Response, ApiError> {
    if body.username.trim().is_empty() {
        return Err(ValidationError::MissingParameter("username".to_string()).into());
    }
    if body.password.is_empty() {
        return Err(ValidationError::MissingParameter("password".to_string()).into());
    }

    let token = auth::authenticate(&state.db_pool, &state.jwt, &body.username, &body.password).await?;
    info!("User {} authenticated", body.username);

    Ok(JsonResponse::ok(AuthenticateResponse { token }).into_response())
}

// GET /eth?transactionHashes=... handler
async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let values: Vec<String> = params
        .into_iter()
        .filter(|(key, _)| key == "transactionHashes")
        .map(|(_, value)| value)
        .collect();
    let hashes = parse_transaction_hashes(values)?;
    let token = caller_token(&headers);

    debug!("Resolving {} transaction hashes (authenticated: {})", hashes.len(), token.is_some());
    let transactions = state.resolver.resolve(&hashes, token.as_deref()).await?;

    Ok(JsonResponse::ok(TransactionsResponse { transactions }).into_response())
}

// GET /eth/{rlphex} handler
async fn get_transactions_by_rlp(
    State(state): State<Arc<AppState>>,
    Path(rlphex): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    validate_rlp_hex(&rlphex)?;
    let token = caller_token(&headers);

    let transactions = state.resolver.resolve_rlp(&rlphex, token.as_deref()).await?;

    Ok(JsonResponse::ok(TransactionsResponse { transactions }).into_response())
}

// GET /my handler
async fn get_my_transactions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = caller_token(&headers).ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;
    let claims = state.jwt.validate_token(&token)?;

    if db::user::find_by_id(&state.db_pool, claims.sub).await?.is_none() {
        return Err(ApiError::Unauthorized("User not found".to_string()));
    }

    let transactions = state.tracker.get_for_user(claims.sub).await?;
    debug!("User {} has {} tracked transactions", claims.sub, transactions.len());

    Ok(JsonResponse::ok(TransactionsResponse { transactions }).into_response())
}

// GET /all handler
async fn get_all_transactions(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let transactions = db::transaction::get_all(&state.db_pool).await?;

    Ok(JsonResponse::ok(TransactionsResponse { transactions }).into_response())
}

// GET /health handler
async fn health(State(state): State<Arc<AppState>>) -> Response {
    let started = Instant::now();
    let database = match connection::ping(&state.db_pool).await {
        Ok(()) => json!({
            "status": "up",
            "queryTime": format!("{}ms", started.elapsed().as_millis()),
        }),
        Err(e) => json!({ "status": "down", "message": e.to_string() }),
    };

    let started = Instant::now();
    let ethereum = match state.chain.block_number().await {
        Ok(block_number) => json!({
            "status": "up",
            "blockNumber": block_number.to_string(),
            "responseTime": format!("{}ms", started.elapsed().as_millis()),
        }),
        Err(e) => json!({ "status": "down", "message": e.to_string() }),
    };

    let healthy = database["status"] == "up" && ethereum["status"] == "up";
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    JsonResponse::with_status(
        status,
        json!({
            "status": if healthy { "ok" } else { "error" },
            "details": {
                "database": database,
                "ethereum": ethereum,
            },
        }),
    )
    .into_response()
}
