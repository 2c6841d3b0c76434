//! # Request Extraction Helpers
//!
//! Handlers take `Result<Json<T>, JsonRejection>` so that malformed bodies
//! produce the structured [`AppError`] body instead of axum's plain-text
//! rejection.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Unwrap a JSON body, mapping rejections to [`AppError::BadRequest`].
pub fn extract_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}
