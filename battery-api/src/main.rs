use anyhow::Context;
use axum::{routing::get, Router};
use battery_api::{metrics, rest, AppConfig, BatteryStore, StorePool};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let listen_addr = config.listen_addr();

    info!("Starting battery telemetry API");
    info!("HTTP server: {}", listen_addr);
    info!("Database: {}", config.database.redacted_url());

    metrics::init_metrics().context("Failed to register metrics")?;

    let pool = StorePool::open(&config.database).await?;
    let monitor_handle = pool.spawn_health_monitor(config.database.health_check_interval());
    let store = BatteryStore::new(pool.clone());

    // Build HTTP app with REST API and metrics endpoint
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(store))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", listen_addr))?;

    info!("HTTP server listening on {}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Shutting down");
    pool.close().await;
    monitor_handle.abort();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
