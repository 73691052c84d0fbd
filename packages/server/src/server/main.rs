// Main entry point for the comment harvester API server

use std::sync::Arc;

use anyhow::{Context, Result};
use douyin_client::DouyinClient;
use server_core::domains::comments::{CommentStore, PgCommentStore};
use server_core::kernel::{DouyinCommentSource, TaskRegistry};
use server_core::server::{build_app, AppState};
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Douyin Comment Harvester API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Provision storage so read paths never see a missing table
    let pg_store = PgCommentStore::new(pool.clone());
    pg_store
        .ensure_schema()
        .await
        .context("Failed to provision comment storage")?;
    let store: Arc<dyn CommentStore> = Arc::new(pg_store);

    // Upstream scraper client and ingestion task registry
    let client = Arc::new(
        DouyinClient::new(config.douyin_api_base_url.clone())
            .context("Failed to create Douyin client")?,
    );
    let source = Arc::new(DouyinCommentSource::new(
        DouyinClient::new(config.douyin_api_base_url.clone())
            .context("Failed to create Douyin client")?,
    ));
    let registry = Arc::new(TaskRegistry::new(
        source,
        Arc::clone(&store),
        config.jobs.clone(),
    ));

    let app = build_app(AppState {
        db_pool: pool,
        registry: Arc::clone(&registry),
        store,
        client,
    });

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(addr = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Let running ingestion tasks wind down cooperatively
    tracing::info!("Shutting down, cancelling running tasks");
    registry.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
