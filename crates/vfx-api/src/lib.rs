//! # vfx-api: Invoice Chain Reporting Service
//!
//! Axum service around the chain registry. Businesses are configured
//! through the admin routes; the invoicing module pushes snapshots and
//! registers invoices; the scheduler transmits pending records and keeps
//! certificate validity current.
//!
//! ## API Surface
//!
//! | Prefix                          | Module                        |
//! |---------------------------------|-------------------------------|
//! | `/v1/businesses/{id}/status`, `/config` | [`routes::businesses`] |
//! | `/v1/businesses/{id}/invoices/*` | [`routes::invoices`]         |
//! | `/v1/businesses/{id}/records*`, `/chain/*` | [`routes::records`] |
//! | `/v1/businesses/{id}/transmissions/*` | [`routes::transmissions`] |
//! | `/v1/certificates/*`, `/v1/businesses/{id}/certificate` | [`routes::certificates`] |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → metrics_middleware → Handler
//! ```
//!
//! Health probes and `/metrics` are mounted outside the stack.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod scheduler;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Largest accepted request body. Invoice snapshots are small.
const BODY_LIMIT: usize = 1024 * 1024;

/// Assemble the application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::businesses::router())
        .merge(routes::invoices::router())
        .merge(routes::records::router())
        .merge(routes::transmissions::router())
        .merge(routes::certificates::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(from_fn(middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics: Prometheus text exposition of every recorded metric.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Liveness probe: 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 "ready", or 503 when the database is unreachable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}
