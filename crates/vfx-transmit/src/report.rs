//! Run reports. Every failure of a run is listed; none are dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vfx_chain::{FailureClass, TransmissionStatus};
use vfx_core::{BusinessId, InvoiceId};

/// Why a run was triggered. Scheduled runs honour `auto_submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    SelfVerifiable,
    AutoSubmitOff,
}

/// One record that did not reach `sent` in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub sequence: u64,
    pub invoice_id: InvoiceId,
    pub reason: String,
    /// `None` for certificate blocks.
    pub class: Option<FailureClass>,
    /// Status after the failure: `pending` (retry scheduled) or `error`.
    pub status: TransmissionStatus,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

/// Outcome of one business's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub business_id: BusinessId,
    pub trigger: RunTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    /// Records chosen for this run.
    pub selected: usize,
    /// Records the run acted on (submitted or blocked).
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<RecordFailure>,
    /// Sequence of a pending record whose backoff gate held back the rest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<u64>,
    /// Why the run stopped early, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<String>,
    /// Sequences whose transmission state changed.
    pub touched: Vec<u64>,
}

impl RunReport {
    pub(crate) fn new(business_id: BusinessId, trigger: RunTrigger, started_at: DateTime<Utc>) -> Self {
        Self {
            business_id,
            trigger,
            started_at,
            finished_at: started_at,
            skipped: None,
            selected: 0,
            processed: 0,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            blocked_at: None,
            halted: None,
            touched: Vec::new(),
        }
    }

    pub(crate) fn skip(mut self, reason: SkipReason) -> Self {
        self.skipped = Some(reason);
        self
    }

    pub(crate) fn fail(&mut self, failure: RecordFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub businesses: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// A business whose run could not start or crashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub business_id: BusinessId,
    pub error: String,
}

/// Outcome of a run over every business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAllReport {
    pub reports: Vec<RunReport>,
    pub errors: Vec<RunError>,
    pub totals: RunTotals,
}

impl RunAllReport {
    pub(crate) fn new(mut reports: Vec<RunReport>, mut errors: Vec<RunError>) -> Self {
        reports.sort_by(|a, b| a.business_id.cmp(&b.business_id));
        errors.sort_by(|a, b| a.business_id.cmp(&b.business_id));
        let totals = reports.iter().fold(RunTotals::default(), |mut t, r| {
            t.businesses += 1;
            t.processed += r.processed;
            t.succeeded += r.succeeded;
            t.failed += r.failed;
            t
        });
        Self {
            reports,
            errors,
            totals,
        }
    }
}

/// A processing claim returned to `pending` by the recovery pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimedRecord {
    pub business_id: BusinessId,
    pub sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub reclaimed: Vec<ReclaimedRecord>,
}
