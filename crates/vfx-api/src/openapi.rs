//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI document served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "VFX API: Invoice Chain Reporting",
        description = "Hash-chained registration records for issued and received invoices, \
                       regulatory XML documents, and transmission to the tax authority.\n\n\
                       Health probes (`/health/*`) and `/metrics` sit outside `/v1`."
    ),
    paths(
        crate::routes::businesses::get_status,
        crate::routes::businesses::get_config,
        crate::routes::businesses::put_config,
        crate::routes::invoices::put_snapshot,
        crate::routes::invoices::register,
        crate::routes::invoices::get_record,
        crate::routes::invoices::download_xml,
        crate::routes::records::list_records,
        crate::routes::records::requeue,
        crate::routes::records::verify_chain,
        crate::routes::transmissions::run,
        crate::routes::certificates::check_all,
        crate::routes::certificates::get_certificate,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::businesses::BusinessStatus,
        crate::routes::invoices::RegistrationRequest,
    )),
    tags(
        (name = "businesses", description = "Compliance configuration and status"),
        (name = "invoices", description = "Registration and XML download"),
        (name = "records", description = "Chain records, requeue, and verification"),
        (name = "transmissions", description = "Manual transmission runs"),
        (name = "certificates", description = "Signing certificate monitoring"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
