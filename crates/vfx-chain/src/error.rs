use thiserror::Error;
use vfx_core::{BusinessId, CanonicalizationError, InvoiceDirection, InvoiceId, ValidationError};

use crate::qr::QrError;
use crate::store::StoreError;
use crate::transmission::TransitionError;
use crate::verify::MismatchKind;

/// Errors from chain registry operations.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("business {0} has no compliance configuration")]
    NotConfigured(BusinessId),

    #[error("compliance reporting is disabled for business {0}")]
    Disabled(BusinessId),

    #[error("invoice {invoice_id} of business {business_id} is not available from the invoicing module")]
    InvoiceNotFound {
        business_id: BusinessId,
        invoice_id: InvoiceId,
    },

    #[error("invoice {invoice_id} is {actual}, not {requested}")]
    DirectionMismatch {
        invoice_id: InvoiceId,
        requested: InvoiceDirection,
        actual: InvoiceDirection,
    },

    /// Malformed or incomplete snapshot, or invalid settings.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    #[error(transparent)]
    Qr(#[from] QrError),

    #[error("chain record {business_id}#{sequence} not found")]
    RecordNotFound { business_id: BusinessId, sequence: u64 },

    /// Lost the race for the next sequence more often than the retry bound.
    #[error("concurrency conflict on {business_id} persisted after {attempts} attempts")]
    ConcurrencyConflict { business_id: BusinessId, attempts: u32 },

    /// Fatal: the stored chain does not replay. Requires manual audit.
    #[error("chain integrity failure at {business_id}#{sequence}: {kind}")]
    Integrity {
        business_id: BusinessId,
        sequence: u64,
        kind: MismatchKind,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ChainError {
    /// Whether the failure is caused by the caller's input (never retryable).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured(_)
                | Self::Disabled(_)
                | Self::InvoiceNotFound { .. }
                | Self::DirectionMismatch { .. }
                | Self::Validation(_)
                | Self::Canonicalization(_)
        )
    }
}
