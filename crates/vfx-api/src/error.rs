//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from vfx-chain, vfx-cert and vfx-transmit to HTTP
//! status codes with a JSON body `{"error":{"code","message","details"?}}`.
//! Internal and integrity failures never expose their detail to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use vfx_cert::CertError;
use vfx_chain::{ChainError, StoreError};
use vfx_transmit::WorkerError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    pub message: String,
    /// Field-level errors of a 422 response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request content is semantically invalid (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid with per-field detail, e.g. a rejected XML document (422).
    #[error("validation error: {message}")]
    InvalidFields {
        message: String,
        details: serde_json::Value,
    },

    /// Request body could not be parsed (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored chain no longer replays (500). Logged, never repaired.
    #[error("chain integrity failure: {0}")]
    Integrity(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) | Self::InvalidFields { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Integrity(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CHAIN_INTEGRITY_FAILURE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Integrity(_) => "chain integrity failure".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Integrity(_) => tracing::error!(error = %self, "chain integrity failure"),
            _ => {}
        }

        let details = match self {
            Self::InvalidFields { details, .. } => Some(details),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<vfx_core::ValidationError> for AppError {
    fn from(err: vfx_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ChainError> for AppError {
    fn from(err: ChainError) -> Self {
        match &err {
            ChainError::NotConfigured(_)
            | ChainError::InvoiceNotFound { .. }
            | ChainError::RecordNotFound { .. }
            | ChainError::Store(StoreError::UnknownBusiness(_))
            | ChainError::Store(StoreError::RecordNotFound { .. }) => Self::NotFound(err.to_string()),
            ChainError::Disabled(_)
            | ChainError::DirectionMismatch { .. }
            | ChainError::Validation(_)
            | ChainError::Canonicalization(_)
            | ChainError::Qr(_) => Self::Validation(err.to_string()),
            ChainError::Transition(_) => Self::Conflict(err.to_string()),
            ChainError::Integrity { .. } => Self::Integrity(err.to_string()),
            ChainError::ConcurrencyConflict { .. } | ChainError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<CertError> for AppError {
    fn from(err: CertError) -> Self {
        match &err {
            CertError::NotConfigured(_) => Self::NotFound(err.to_string()),
            CertError::NoCertificate(_) | CertError::InvalidReference(_) | CertError::Parse(_) => {
                Self::Validation(err.to_string())
            }
            CertError::Read { .. } | CertError::Timeout { .. } | CertError::Task(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<WorkerError> for AppError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::NotConfigured(id) => Self::NotFound(format!("business {id} has no compliance configuration")),
            WorkerError::Chain(e) => e.into(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("database error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use vfx_core::BusinessId;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn not_configured_maps_to_not_found() {
        let err: AppError = ChainError::NotConfigured(BusinessId::new("acme").unwrap()).into();
        assert_eq!(err.status_and_code(), (StatusCode::NOT_FOUND, "NOT_FOUND"));
    }

    #[test]
    fn disabled_business_is_validation_error() {
        let err: AppError = ChainError::Disabled(BusinessId::new("acme").unwrap()).into();
        assert_eq!(err.status_and_code().0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn internal_error_hides_message() {
        let (status, body) = body_json(AppError::Internal("pool exhausted on host db-7".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn integrity_error_says_integrity_failure() {
        let (status, body) = body_json(AppError::Integrity("acme#4: hash mismatch".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "CHAIN_INTEGRITY_FAILURE");
        assert_eq!(body["error"]["message"], "chain integrity failure");
    }

    #[tokio::test]
    async fn invalid_fields_carry_details() {
        let err = AppError::InvalidFields {
            message: "document failed validation".into(),
            details: serde_json::json!([{ "path": "Recipient/LegalId", "message": "required" }]),
        };
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["details"][0]["path"], "Recipient/LegalId");
    }

    #[tokio::test]
    async fn conflict_keeps_message() {
        let (status, body) = body_json(AppError::Conflict("record is not in error".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"]["message"].as_str().unwrap().contains("not in error"));
    }
}
