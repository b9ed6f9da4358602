// Initialize configuration
// Set up logging
// Create database connection pool and seed users
// Connect the Ethereum client
// Create shared state
// Start HTTP server with graceful shutdown

use eth_fetcher::{api, auth, blockchain::EthRpcClient, config::Config, db, state::AppState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting eth-fetcher");

    // Load configuration
    let config = Config::from_env();
    tracing::info!(
        "Configuration loaded: node {}, database {}, prefix /{}",
        config.eth_node_url, config.database_url, config.api_prefix
    );

    // Setup database connection
    let db_pool = db::connection::establish_connection(&config).await?;
    tracing::info!("Database connection established");

    if config.seed_users {
        let created = auth::seed_default_users(&db_pool).await?;
        tracing::info!("Seeded {} users", created);
    }

    // Ethereum node client, shared by every request
    let chain = Arc::new(EthRpcClient::new(&config)?);

    let app_state = Arc::new(AppState::new(config.clone(), db_pool.clone(), chain));
    let app = api::create_router(app_state);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    db_pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}
