//! # Invoice Registration and XML Download
//!
//! The snapshot upsert stands in for the invoicing module's feed. The other
//! handlers operate on whatever snapshot is current.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `PUT`  | `/v1/businesses/{id}/invoices/{invoice_id}` | `put_snapshot` |
//! | `POST` | `/v1/businesses/{id}/invoices/{invoice_id}/registration` | `register` |
//! | `GET`  | `/v1/businesses/{id}/invoices/{invoice_id}/record` | `get_record` |
//! | `GET`  | `/v1/businesses/{id}/invoices/{invoice_id}/xml` | `download_xml` |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use vfx_chain::ChainRecord;
use vfx_core::{InvoiceDirection, InvoiceSnapshot};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::{business_id, invoice_id};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegistrationRequest {
    /// "issued" or "received".
    #[schema(value_type = String)]
    pub direction: InvoiceDirection,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/businesses/{id}/invoices/{invoice_id}", put(put_snapshot))
        .route("/v1/businesses/{id}/invoices/{invoice_id}/registration", post(register))
        .route("/v1/businesses/{id}/invoices/{invoice_id}/record", get(get_record))
        .route("/v1/businesses/{id}/invoices/{invoice_id}/xml", get(download_xml))
}

/// PUT /v1/businesses/{id}/invoices/{invoice_id}: store the current
/// snapshot of an invoice.
///
/// Incomplete snapshots are accepted here; registration and XML download
/// report what is missing.
#[utoipa::path(
    put,
    path = "/v1/businesses/{id}/invoices/{invoice_id}",
    params(
        ("id" = String, Path, description = "Business id"),
        ("invoice_id" = String, Path, description = "Invoice id"),
    ),
    request_body(content = Object, description = "Invoice snapshot"),
    responses(
        (status = 204, description = "Snapshot stored"),
        (status = 422, description = "Malformed snapshot", body = crate::error::ErrorBody),
        (status = 500, description = "Snapshot could not be persisted", body = crate::error::ErrorBody),
    ),
    tag = "invoices"
)]
pub async fn put_snapshot(
    State(state): State<AppState>,
    Path((id, invoice)): Path<(String, String)>,
    body: Result<Json<InvoiceSnapshot>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let business_id = business_id(id)?;
    let invoice_id = invoice_id(invoice)?;
    let snapshot = extract_json(body)?;
    if snapshot.invoice_id != invoice_id {
        return Err(AppError::Validation(format!(
            "body invoice_id {} does not match path {invoice_id}",
            snapshot.invoice_id
        )));
    }
    if state.save_snapshot(&business_id, snapshot).await?.is_some()
        && state.registry.record(&business_id, &invoice_id).is_some()
    {
        tracing::warn!(
            business_id = %business_id,
            invoice_id = %invoice_id,
            "snapshot of a registered invoice replaced; verification will flag it if content changed"
        );
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/businesses/{id}/invoices/{invoice_id}/registration: create the
/// chain record, or return the existing one.
///
/// Both paths persist the record, so retrying a registration whose write
/// failed completes the write.
#[utoipa::path(
    post,
    path = "/v1/businesses/{id}/invoices/{invoice_id}/registration",
    params(
        ("id" = String, Path, description = "Business id"),
        ("invoice_id" = String, Path, description = "Invoice id"),
    ),
    request_body = RegistrationRequest,
    responses(
        (status = 201, description = "Chain record created"),
        (status = 200, description = "Invoice was already registered"),
        (status = 404, description = "Business or invoice unknown", body = crate::error::ErrorBody),
        (status = 422, description = "Business disabled or invoice unusable", body = crate::error::ErrorBody),
        (status = 500, description = "Record created but not yet persisted; retry", body = crate::error::ErrorBody),
    ),
    tag = "invoices"
)]
pub async fn register(
    State(state): State<AppState>,
    Path((id, invoice)): Path<(String, String)>,
    body: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let business_id = business_id(id)?;
    let invoice_id = invoice_id(invoice)?;
    let req = extract_json(body)?;

    if let Some(existing) = state.registry.record(&business_id, &invoice_id) {
        state.persist(&business_id, &[existing.sequence_number]).await?;
        return Ok((StatusCode::OK, Json(existing)));
    }
    let record = state.registry.get_or_create(&business_id, &invoice_id, req.direction)?;
    state.persist(&business_id, &[record.sequence_number]).await?;
    metrics::counter!("vfx_records_created_total").increment(1);
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/businesses/{id}/invoices/{invoice_id}/record
#[utoipa::path(
    get,
    path = "/v1/businesses/{id}/invoices/{invoice_id}/record",
    params(
        ("id" = String, Path, description = "Business id"),
        ("invoice_id" = String, Path, description = "Invoice id"),
    ),
    responses(
        (status = 200, description = "Chain record"),
        (status = 404, description = "Invoice not registered", body = crate::error::ErrorBody),
    ),
    tag = "invoices"
)]
pub async fn get_record(
    State(state): State<AppState>,
    Path((id, invoice)): Path<(String, String)>,
) -> Result<Json<ChainRecord>, AppError> {
    let business_id = business_id(id)?;
    let invoice_id = invoice_id(invoice)?;
    state
        .registry
        .record(&business_id, &invoice_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("invoice {invoice_id} of {business_id} is not registered")))
}

/// GET /v1/businesses/{id}/invoices/{invoice_id}/xml: the registration
/// document. Documents that fail validation are never returned.
#[utoipa::path(
    get,
    path = "/v1/businesses/{id}/invoices/{invoice_id}/xml",
    params(
        ("id" = String, Path, description = "Business id"),
        ("invoice_id" = String, Path, description = "Invoice id"),
    ),
    responses(
        (status = 200, description = "XML document", content_type = "application/xml"),
        (status = 404, description = "Invoice unknown", body = crate::error::ErrorBody),
        (status = 422, description = "Document invalid; details lists each field", body = crate::error::ErrorBody),
    ),
    tag = "invoices"
)]
pub async fn download_xml(
    State(state): State<AppState>,
    Path((id, invoice)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let business_id = business_id(id)?;
    let invoice_id = invoice_id(invoice)?;
    let snapshot = state
        .registry
        .snapshot(&business_id, &invoice_id)
        .ok_or_else(|| AppError::NotFound(format!("invoice {invoice_id} of {business_id} is not available")))?;

    let document = vfx_xml::encode_snapshot(&snapshot);
    let report = vfx_xml::validate(&document);
    if !report.valid {
        tracing::warn!(
            business_id = %business_id,
            invoice_id = %invoice_id,
            errors = report.errors.len(),
            "XML download refused: document invalid"
        );
        let details = serde_json::to_value(&report.errors)
            .map_err(|e| AppError::Internal(format!("serialization error: {e}")))?;
        return Err(AppError::InvalidFields {
            message: report.summary(),
            details,
        });
    }

    let disposition = format!("attachment; filename=\"{}\"", document.file_name());
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, vfx_xml::CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.to_xml(),
    ))
}
