//! # Business Status and Configuration
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `GET` | `/v1/businesses/{id}/status` | `get_status` |
//! | `GET` | `/v1/businesses/{id}/config` | `get_config` |
//! | `PUT` | `/v1/businesses/{id}/config` | `put_config` |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use vfx_chain::{ComplianceConfig, ConfigUpdate, StatusCounts};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::business_id;
use crate::state::AppState;

/// Transmission overview of one business.
#[derive(Debug, Serialize, ToSchema)]
pub struct BusinessStatus {
    pub business_id: String,
    pub enabled: bool,
    pub mode: String,
    pub environment: String,
    #[schema(value_type = Object)]
    pub counts: StatusCounts,
    pub total: u64,
    pub last_sequence_number: u64,
    pub last_processed_at: Option<DateTime<Utc>>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/businesses/{id}/status", get(get_status))
        .route("/v1/businesses/{id}/config", get(get_config).put(put_config))
}

/// GET /v1/businesses/{id}/status: record counts per transmission status.
#[utoipa::path(
    get,
    path = "/v1/businesses/{id}/status",
    params(("id" = String, Path, description = "Business id")),
    responses(
        (status = 200, description = "Status counts", body = BusinessStatus),
        (status = 404, description = "Business not configured", body = crate::error::ErrorBody),
    ),
    tag = "businesses"
)]
pub async fn get_status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<BusinessStatus>, AppError> {
    let business_id = business_id(id)?;
    let config = state
        .registry
        .config(&business_id)
        .ok_or_else(|| AppError::NotFound(format!("business {business_id} has no compliance configuration")))?;
    let counts = state.registry.status_counts(&business_id);
    Ok(Json(BusinessStatus {
        business_id: business_id.to_string(),
        enabled: config.enabled,
        mode: config.mode.as_str().to_string(),
        environment: config.environment.as_str().to_string(),
        total: counts.total(),
        counts,
        last_sequence_number: config.last_sequence_number,
        last_processed_at: config.last_processed_at,
    }))
}

/// GET /v1/businesses/{id}/config
#[utoipa::path(
    get,
    path = "/v1/businesses/{id}/config",
    params(("id" = String, Path, description = "Business id")),
    responses(
        (status = 200, description = "Compliance configuration"),
        (status = 404, description = "Business not configured", body = crate::error::ErrorBody),
    ),
    tag = "businesses"
)]
pub async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ComplianceConfig>, AppError> {
    let business_id = business_id(id)?;
    state
        .registry
        .config(&business_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("business {business_id} has no compliance configuration")))
}

/// PUT /v1/businesses/{id}/config: create or partially update a
/// configuration. Absent fields are left unchanged.
#[utoipa::path(
    put,
    path = "/v1/businesses/{id}/config",
    params(("id" = String, Path, description = "Business id")),
    request_body(content = Object, description = "Partial compliance configuration"),
    responses(
        (status = 200, description = "Updated configuration"),
        (status = 422, description = "Invalid setting", body = crate::error::ErrorBody),
    ),
    tag = "businesses"
)]
pub async fn put_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ConfigUpdate>, JsonRejection>,
) -> Result<Json<ComplianceConfig>, AppError> {
    let business_id = business_id(id)?;
    let update = extract_json(body)?;
    let config = state.registry.configure(&business_id, update)?;
    state.persist(&business_id, &[]).await?;
    Ok(Json(config))
}
