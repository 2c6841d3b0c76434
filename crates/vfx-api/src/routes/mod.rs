//! # Route Modules
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `GET`  | `/v1/businesses/{id}/status` | [`businesses::get_status`] |
//! | `GET`  | `/v1/businesses/{id}/config` | [`businesses::get_config`] |
//! | `PUT`  | `/v1/businesses/{id}/config` | [`businesses::put_config`] |
//! | `PUT`  | `/v1/businesses/{id}/invoices/{invoice_id}` | [`invoices::put_snapshot`] |
//! | `POST` | `/v1/businesses/{id}/invoices/{invoice_id}/registration` | [`invoices::register`] |
//! | `GET`  | `/v1/businesses/{id}/invoices/{invoice_id}/record` | [`invoices::get_record`] |
//! | `GET`  | `/v1/businesses/{id}/invoices/{invoice_id}/xml` | [`invoices::download_xml`] |
//! | `GET`  | `/v1/businesses/{id}/records` | [`records::list_records`] |
//! | `POST` | `/v1/businesses/{id}/records/{sequence}/requeue` | [`records::requeue`] |
//! | `GET`  | `/v1/businesses/{id}/chain/verification` | [`records::verify_chain`] |
//! | `POST` | `/v1/businesses/{id}/transmissions/run` | [`transmissions::run`] |
//! | `GET`  | `/v1/businesses/{id}/certificate` | [`certificates::get_certificate`] |
//! | `POST` | `/v1/certificates/check` | [`certificates::check_all`] |

pub mod businesses;
pub mod certificates;
pub mod invoices;
pub mod records;
pub mod transmissions;

use vfx_core::{BusinessId, InvoiceId};

use crate::error::AppError;

/// Parse a business id path segment (422 on a malformed id).
pub(crate) fn business_id(raw: String) -> Result<BusinessId, AppError> {
    Ok(BusinessId::new(raw)?)
}

pub(crate) fn invoice_id(raw: String) -> Result<InvoiceId, AppError> {
    Ok(InvoiceId::new(raw)?)
}
