//! # vfx-api: Binary Entry Point
//!
//! Loads configuration, hydrates chains from PostgreSQL when configured,
//! starts the background tasks, and serves HTTP until Ctrl-C.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;
use vfx_api::config::{AppConfig, LogFormat};
use vfx_api::state::AppState;
use vfx_transmit::{AuthorityAdapter, HttpAuthorityAdapter, MockAuthorityAdapter};

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let adapter: Arc<dyn AuthorityAdapter> = match config.authority.clone() {
        Some(authority) => {
            tracing::info!(
                testing = %authority.testing_url,
                production = %authority.production_url,
                "authority adapter configured"
            );
            Arc::new(HttpAuthorityAdapter::new(authority).map_err(|e| {
                tracing::error!("Failed to create authority adapter: {e}");
                e
            })?)
        }
        None => {
            tracing::warn!("VFX_AUTHORITY_TOKEN not set: submissions go to the in-process mock authority");
            Arc::new(MockAuthorityAdapter::new())
        }
    };

    let db_pool = vfx_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let port = config.port;
    let state = AppState::with_config(config, adapter, db_pool.clone());

    if let Some(pool) = &db_pool {
        let summary = vfx_api::db::hydrate(pool, &state.registry, &state.invoices).await.map_err(|e| {
            tracing::error!("Database hydration failed: {e}");
            e
        })?;
        if summary.broken_chains > 0 {
            tracing::error!(
                broken_chains = summary.broken_chains,
                "chains failed verification at startup; affected records are left as found"
            );
        }
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let state = state.with_metrics(handle);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = vfx_api::scheduler::spawn(state.clone(), shutdown_rx);

    let app = vfx_api::app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("VFX API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
            }
            tracing::info!("shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    scheduler.join().await;
    Ok(())
}
