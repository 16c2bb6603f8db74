use actix_web::{middleware, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use marketplace_orders::api;
use marketplace_orders::auth::{authenticate, AccessPolicy, AuthGate, TokenVerifier};
use marketplace_orders::config::AppConfig;
use marketplace_orders::domain::order::OrderLifecycleManager;
use marketplace_orders::domain::vendor::VendorStatsAggregator;
use marketplace_orders::metrics::{self, Metrics};
use marketplace_orders::store::{self, PgCatalog, PgStore, StoreError};
use marketplace_orders::utils::{retry_with_backoff, RetryConfig};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,marketplace_orders=debug")),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(?config, "Starting marketplace orders service");

    // === 1. Connect to PostgreSQL, waiting for it if it is still starting ===
    tracing::info!("Connecting to PostgreSQL...");
    let pool = retry_with_backoff(RetryConfig::startup(), |attempt| {
        let url = config.database_url.clone();
        let max_connections = config.db_max_connections;
        async move {
            tracing::debug!(attempt, "Opening connection pool");
            PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(&url)
                .await
                .map_err(StoreError::from)
        }
    })
    .await
    .into_result()?;

    store::migrate(&pool).await?;
    tracing::info!("Database migrations applied");

    // === 2. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    let registry = metrics.registry().clone();
    let metrics_port = config.metrics_port;
    actix_web::rt::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(registry, metrics_port).await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 3. Wire services ===
    let store = Arc::new(PgStore::new(pool.clone()));
    let catalog = Arc::new(PgCatalog::new(pool));

    let manager = web::Data::new(OrderLifecycleManager::new(store.clone(), metrics.clone()));
    let aggregator = web::Data::new(VendorStatsAggregator::new(
        store,
        catalog,
        config.critical_stock_threshold,
    ));
    let gate = web::Data::new(AuthGate::new(
        AccessPolicy::default(),
        TokenVerifier::new(config.jwt_secret.as_bytes()).with_leeway(config.jwt_leeway_secs),
        metrics,
    ));

    // === 4. Serve the API ===
    tracing::info!("🚀 Listening on http://{}", config.http_addr);
    HttpServer::new(move || {
        App::new()
            .app_data(gate.clone())
            .app_data(manager.clone())
            .app_data(aggregator.clone())
            .wrap(middleware::from_fn(authenticate))
            .configure(api::configure)
    })
    .bind(config.http_addr)?
    .run()
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
