//! # Certificate Checks
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/certificates/check` | `check_all` |
//! | `GET`  | `/v1/businesses/{id}/certificate` | `get_certificate` |
//!
//! The manual check runs the same bounded refresh as the scheduled task.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use vfx_cert::{CertificateStatus, CheckAllReport, RefreshReport};

use crate::error::AppError;
use crate::routes::business_id;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CertificateCheckResponse {
    pub refresh: RefreshReport,
    pub check: CheckAllReport,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/certificates/check", post(check_all))
        .route("/v1/businesses/{id}/certificate", get(get_certificate))
}

/// POST /v1/certificates/check: refresh every certificate, then classify
/// every business.
#[utoipa::path(
    post,
    path = "/v1/certificates/check",
    responses((status = 200, description = "Refresh failures and classification summary")),
    tag = "certificates"
)]
pub async fn check_all(State(state): State<AppState>) -> Result<Json<CertificateCheckResponse>, AppError> {
    let refresh = state.monitor.refresh_all().await;
    for status in &refresh.refreshed {
        state.persist(&status.business_id, &[]).await?;
    }
    let check = state.monitor.check_all(Utc::now());
    Ok(Json(CertificateCheckResponse { refresh, check }))
}

/// GET /v1/businesses/{id}/certificate: classification from the last
/// known validity.
#[utoipa::path(
    get,
    path = "/v1/businesses/{id}/certificate",
    params(("id" = String, Path, description = "Business id")),
    responses(
        (status = 200, description = "Certificate status"),
        (status = 404, description = "Business not configured", body = crate::error::ErrorBody),
    ),
    tag = "certificates"
)]
pub async fn get_certificate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CertificateStatus>, AppError> {
    let business_id = business_id(id)?;
    Ok(Json(state.monitor.status(&business_id, Utc::now())?))
}
