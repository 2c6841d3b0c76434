//! # Chain Records
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `GET`  | `/v1/businesses/{id}/records` | `list_records` |
//! | `POST` | `/v1/businesses/{id}/records/{sequence}/requeue` | `requeue` |
//! | `GET`  | `/v1/businesses/{id}/chain/verification` | `verify_chain` |

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;
use vfx_chain::{ChainRecord, TransmissionStatus, VerificationReport};

use crate::error::AppError;
use crate::routes::business_id;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 1000;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListRecordsQuery {
    /// Only records in this transmission status.
    #[param(value_type = Option<String>)]
    pub status: Option<TransmissionStatus>,
    /// Maximum number of records (default 1000).
    pub limit: Option<usize>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/businesses/{id}/records", get(list_records))
        .route("/v1/businesses/{id}/records/{sequence}/requeue", post(requeue))
        .route("/v1/businesses/{id}/chain/verification", get(verify_chain))
}

/// GET /v1/businesses/{id}/records: records in ascending sequence order.
#[utoipa::path(
    get,
    path = "/v1/businesses/{id}/records",
    params(("id" = String, Path, description = "Business id"), ListRecordsQuery),
    responses(
        (status = 200, description = "Chain records"),
        (status = 404, description = "Business not configured", body = crate::error::ErrorBody),
    ),
    tag = "records"
)]
pub async fn list_records(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListRecordsQuery>,
) -> Result<Json<Vec<ChainRecord>>, AppError> {
    let business_id = business_id(id)?;
    if state.registry.config(&business_id).is_none() {
        return Err(AppError::NotFound(format!(
            "business {business_id} has no compliance configuration"
        )));
    }
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let records = match query.status {
        Some(status) => state.registry.store().records_with_status(&business_id, status, limit),
        None => state.registry.records(&business_id).into_iter().take(limit).collect(),
    };
    Ok(Json(records))
}

/// POST /v1/businesses/{id}/records/{sequence}/requeue: return an `error`
/// record to `pending` with its attempt counter reset.
#[utoipa::path(
    post,
    path = "/v1/businesses/{id}/records/{sequence}/requeue",
    params(
        ("id" = String, Path, description = "Business id"),
        ("sequence" = u64, Path, description = "Sequence number"),
    ),
    responses(
        (status = 200, description = "Record requeued"),
        (status = 404, description = "Record not found", body = crate::error::ErrorBody),
        (status = 409, description = "Record is not in error", body = crate::error::ErrorBody),
    ),
    tag = "records"
)]
pub async fn requeue(
    State(state): State<AppState>,
    Path((id, sequence)): Path<(String, u64)>,
) -> Result<Json<ChainRecord>, AppError> {
    let business_id = business_id(id)?;
    let record = state.registry.requeue(&business_id, sequence)?;
    state.persist(&business_id, &[sequence]).await?;
    Ok(Json(record))
}

/// GET /v1/businesses/{id}/chain/verification: replay the chain against
/// current invoice snapshots.
///
/// A broken chain is reported in the body (`first_mismatch`), not as an
/// error status; the replay itself succeeded.
#[utoipa::path(
    get,
    path = "/v1/businesses/{id}/chain/verification",
    params(("id" = String, Path, description = "Business id")),
    responses(
        (status = 200, description = "Verification report"),
        (status = 404, description = "Business not configured", body = crate::error::ErrorBody),
    ),
    tag = "records"
)]
pub async fn verify_chain(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VerificationReport>, AppError> {
    let business_id = business_id(id)?;
    Ok(Json(state.registry.verify_chain(&business_id)?))
}
