//! # Chain Verification
//!
//! Replays a business's chain from genesis: re-fetches every invoice
//! snapshot, re-canonicalizes it, recomputes the link hash, and compares it
//! with the stored one. Also checks sequence contiguity, previous-hash
//! linkage, and the `last_sequence_number` cache.
//!
//! Verification only reports. A mismatch is never repaired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vfx_core::{canonicalize_invoice, chain_digest, BusinessId, ChainHash};

use crate::error::ChainError;
use crate::record::ChainRecord;
use crate::source::InvoiceSource;

/// What went wrong at the first failing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Recomputed hash differs from the stored one (content changed).
    HashMismatch,
    /// `previous_hash` does not equal the prior record's `current_hash`.
    BrokenLink,
    /// Sequence numbers are not contiguous from 1.
    SequenceGap,
    /// The invoicing module no longer provides the invoice.
    MissingSourceInvoice,
    /// `last_sequence_number` disagrees with the stored records.
    CacheDrift,
}

impl std::fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::HashMismatch => "hash mismatch",
            Self::BrokenLink => "broken link",
            Self::SequenceGap => "sequence gap",
            Self::MissingSourceInvoice => "missing source invoice",
            Self::CacheDrift => "cache drift",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub sequence: u64,
    pub kind: MismatchKind,
    pub detail: String,
}

/// Result of replaying one business's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub business_id: BusinessId,
    /// Records that verified before the first mismatch (all, when intact).
    pub records_checked: u64,
    pub first_mismatch: Option<Mismatch>,
    pub verified_at: DateTime<Utc>,
}

impl VerificationReport {
    pub fn is_intact(&self) -> bool {
        self.first_mismatch.is_none()
    }

    /// Turn a failed report into [`ChainError::Integrity`].
    pub fn into_result(self) -> Result<Self, ChainError> {
        match &self.first_mismatch {
            None => Ok(self),
            Some(m) => Err(ChainError::Integrity {
                business_id: self.business_id.clone(),
                sequence: m.sequence,
                kind: m.kind,
            }),
        }
    }
}

/// Replay `records` (ascending sequence order) against the invoice source.
pub fn replay(
    business_id: &BusinessId,
    records: &[ChainRecord],
    cached_last_sequence: u64,
    source: &dyn InvoiceSource,
    now: DateTime<Utc>,
) -> VerificationReport {
    let mut report = VerificationReport {
        business_id: business_id.clone(),
        records_checked: 0,
        first_mismatch: None,
        verified_at: now,
    };
    let mut previous = ChainHash::genesis();

    for (expected, record) in (1u64..).zip(records) {
        if let Some(mismatch) = check_record(expected, record, &previous, source) {
            report.first_mismatch = Some(mismatch);
            return report;
        }
        previous = record.current_hash.clone();
        report.records_checked += 1;
    }

    let actual_last = records.last().map_or(0, |r| r.sequence_number);
    if cached_last_sequence != actual_last {
        report.first_mismatch = Some(Mismatch {
            sequence: cached_last_sequence,
            kind: MismatchKind::CacheDrift,
            detail: format!(
                "last_sequence_number is {cached_last_sequence} but the chain ends at {actual_last}"
            ),
        });
    }
    report
}

fn check_record(
    expected: u64,
    record: &ChainRecord,
    previous: &ChainHash,
    source: &dyn InvoiceSource,
) -> Option<Mismatch> {
    let mismatch = |kind, detail: String| {
        Some(Mismatch {
            sequence: record.sequence_number,
            kind,
            detail,
        })
    };

    if record.sequence_number != expected {
        return Some(Mismatch {
            sequence: expected,
            kind: MismatchKind::SequenceGap,
            detail: format!("expected sequence {expected}, found {}", record.sequence_number),
        });
    }
    if &record.previous_hash != previous {
        return mismatch(
            MismatchKind::BrokenLink,
            format!("previous_hash {} does not match {}", record.previous_hash, previous),
        );
    }
    let Some(snapshot) = source.snapshot(&record.business_id, &record.invoice_id) else {
        return mismatch(
            MismatchKind::MissingSourceInvoice,
            format!("invoice {} not found", record.invoice_id),
        );
    };
    let bytes = match canonicalize_invoice(&snapshot) {
        Ok(bytes) => bytes,
        Err(e) => {
            return mismatch(
                MismatchKind::HashMismatch,
                format!("invoice {} no longer canonicalizes: {e}", record.invoice_id),
            )
        }
    };
    let recomputed = chain_digest(&record.previous_hash, &bytes);
    if recomputed != record.current_hash {
        return mismatch(
            MismatchKind::HashMismatch,
            format!("stored {} but recomputed {}", record.current_hash, recomputed),
        );
    }
    None
}
