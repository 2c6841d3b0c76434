//! # Error Types: Structured Error Hierarchy
//!
//! Defines the error types shared by every crate in the workspace. All errors
//! use `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Validation errors name the offending field with a path such as
//!   `counterparty.legal_id` or `lines[2].quantity`, so that the boundary
//!   that rejected the input can report it verbatim.
//! - Integrity errors are never recoverable locally. They are carried up to
//!   an operator-facing status unchanged.

use thiserror::Error;

/// Top-level error type for the reporting stack.
#[derive(Error, Debug)]
pub enum VfxError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Input failed validation at a boundary.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Chain integrity violation. Requires a manual audit.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// State machine transition rejected.
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts must be strings or integers.
    #[error("float values are not permitted in canonical representations; use string or integer for amount: {0}")]
    FloatRejected(f64),

    /// The invoice snapshot is malformed or incomplete.
    #[error("invoice snapshot rejected: {0}")]
    InvalidSnapshot(#[from] ValidationError),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for identifiers, amounts, and invoice snapshots.
///
/// Every variant carries the field path (or the rejected value) so that
/// operators can diagnose the input without guesswork.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or blank.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A field is present but its value is not acceptable.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Path of the offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Identifier does not match its expected format.
    #[error("invalid {kind}: \"{value}\" ({expected})")]
    InvalidIdentifier {
        /// Identifier kind (e.g. "business id").
        kind: &'static str,
        /// The rejected value.
        value: String,
        /// Description of the expected format.
        expected: &'static str,
    },

    /// Decimal value could not be parsed at the required precision.
    #[error("invalid decimal \"{value}\": expected at most {scale} fractional digits")]
    InvalidDecimal {
        /// The rejected input.
        value: String,
        /// Maximum number of fractional digits.
        scale: u32,
    },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::InvalidField`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Path of the field this error refers to, when it names one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField(field) | Self::InvalidField { field, .. } => Some(field),
            Self::InvalidIdentifier { .. } | Self::InvalidDecimal { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vfx_error_canonicalization_display() {
        let err = VfxError::Canonicalization(CanonicalizationError::FloatRejected(1.5));
        assert!(format!("{err}").contains("canonicalization error"));
    }

    #[test]
    fn vfx_error_integrity_display() {
        let err = VfxError::Integrity("hash mismatch at #4".to_string());
        assert!(format!("{err}").contains("hash mismatch at #4"));
    }

    #[test]
    fn missing_field_names_the_path() {
        let err = ValidationError::MissingField("counterparty.legal_id".to_string());
        assert_eq!(err.field(), Some("counterparty.legal_id"));
        assert!(format!("{err}").contains("counterparty.legal_id"));
    }

    #[test]
    fn invalid_field_display() {
        let err = ValidationError::invalid("lines[0].quantity", "must be positive");
        let msg = format!("{err}");
        assert!(msg.contains("lines[0].quantity"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn invalid_decimal_display() {
        let err = ValidationError::InvalidDecimal {
            value: "1.234".to_string(),
            scale: 2,
        };
        assert!(format!("{err}").contains("at most 2 fractional digits"));
        assert_eq!(err.field(), None);
    }

    #[test]
    fn snapshot_error_wraps_validation() {
        let inner = ValidationError::MissingField("invoice_number".to_string());
        let err = CanonicalizationError::from(inner.clone());
        assert!(matches!(err, CanonicalizationError::InvalidSnapshot(ref e) if *e == inner));
    }
}
