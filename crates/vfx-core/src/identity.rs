//! # Identity Newtypes
//!
//! Key identifiers for the reporting stack. Each identifier is a distinct
//! type: you cannot pass an [`InvoiceId`] where a [`BusinessId`] is expected.
//!
//! Both identifiers validate their format at construction and during
//! deserialization, so a value that exists is always well-formed.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier of a business (the issuer whose invoices are chained).
///
/// 1-64 characters from `[A-Za-z0-9._-]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BusinessId(String);

impl BusinessId {
    /// Create a business identifier, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidIdentifier`] when the value is empty,
    /// longer than 64 characters, or contains characters outside `[A-Za-z0-9._-]`.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let ok = !s.is_empty()
            && s.len() <= 64
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !ok {
            return Err(ValidationError::InvalidIdentifier {
                kind: "business id",
                value: s,
                expected: "1-64 characters from [A-Za-z0-9._-]",
            });
        }
        Ok(Self(s))
    }

    /// Access the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BusinessId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BusinessId> for String {
    fn from(id: BusinessId) -> Self {
        id.0
    }
}

impl std::fmt::Display for BusinessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of an invoice inside the invoicing module.
///
/// 1-128 printable characters with no surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoiceId(String);

impl InvoiceId {
    /// Create an invoice identifier, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidIdentifier`] for empty, oversized,
    /// padded, or control-character-bearing values.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let ok = !s.is_empty()
            && s.chars().count() <= 128
            && s.trim() == s
            && !s.chars().any(char::is_control);
        if !ok {
            return Err(ValidationError::InvalidIdentifier {
                kind: "invoice id",
                value: s,
                expected: "1-128 printable characters without surrounding whitespace",
            });
        }
        Ok(Self(s))
    }

    /// Access the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InvoiceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InvoiceId> for String {
    fn from(id: InvoiceId) -> Self {
        id.0
    }
}

impl std::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a tax legal identifier (NIF/VAT number): trim and upper-case.
///
/// Returns `None` when the normalized value is not 5-20 ASCII alphanumerics.
pub fn normalize_legal_id(raw: &str) -> Option<String> {
    let s = raw.trim().to_ascii_uppercase();
    if (5..=20).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(s)
    } else {
        None
    }
}
