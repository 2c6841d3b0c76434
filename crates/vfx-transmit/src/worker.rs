//! # Transmission Worker
//!
//! Submits pending chain records to the tax authority, one business at a
//! time per task, strictly in sequence order.
//!
//! ## One business run
//!
//! 1. Skip disabled and self-verifiable businesses, and (for scheduled
//!    runs) businesses with `auto_submit` off.
//! 2. Select ready `pending` records in ascending sequence order, up to
//!    `max_records_per_batch`. `sent` and `error` records are passed over.
//!    A `pending` record still in backoff, or a `processing` claim, stops
//!    the selection: later records may not overtake it.
//! 3. Certificate gate. An expired or missing certificate moves every
//!    selected record to `error` and nothing is submitted.
//! 4. Per record: re-encode and validate the invoice, wait for the flow
//!    control interval, claim, submit under a timeout, and apply the
//!    outcome. A retryable failure ends the run; a terminal one does not.
//!
//! No chain lock is held across a submission. Runs of the same business
//! are serialized by a per-business run lock so spacing and order hold even
//! when a manual run overlaps a scheduled one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::task::JoinSet;
use vfx_cert::CertificateMonitor;
use vfx_chain::{
    ChainError, ChainRecord, ChainRegistry, ComplianceConfig, ComplianceMode, Effect, FailureClass,
    TransmissionEvent, TransmissionStatus,
};
use vfx_core::{canonicalize_invoice, chain_digest, BusinessId};
use vfx_xml::{encode_envelope, encode_snapshot, EnvelopeEntry, EnvelopeHeader};

use crate::adapter::{AdapterError, AuthorityAdapter, RecordOutcome, SubmissionRequest};
use crate::config::WorkerSettings;
use crate::flow::FlowControl;
use crate::report::{
    ReclaimedRecord, RecordFailure, RecoveryReport, RunAllReport, RunError, RunReport, RunTrigger,
    SkipReason,
};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("business {0} has no compliance configuration")]
    NotConfigured(BusinessId),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

struct Inner {
    registry: Arc<ChainRegistry>,
    monitor: CertificateMonitor,
    adapter: Arc<dyn AuthorityAdapter>,
    settings: WorkerSettings,
    flow: FlowControl,
    run_locks: DashMap<BusinessId, Arc<tokio::sync::Mutex<()>>>,
}

/// Cheap to clone; clones share flow-control state and run locks.
#[derive(Clone)]
pub struct TransmissionWorker {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TransmissionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransmissionWorker")
            .field("adapter", &self.inner.adapter.adapter_name())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl TransmissionWorker {
    pub fn new(
        registry: Arc<ChainRegistry>,
        monitor: CertificateMonitor,
        adapter: Arc<dyn AuthorityAdapter>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                monitor,
                adapter,
                settings,
                flow: FlowControl::new(),
                run_locks: DashMap::new(),
            }),
        }
    }

    pub fn settings(&self) -> WorkerSettings {
        self.inner.settings
    }

    fn run_lock(&self, business_id: &BusinessId) -> Arc<tokio::sync::Mutex<()>> {
        self.inner.run_locks.entry(business_id.clone()).or_default().clone()
    }

    /// Process one business's pending records.
    pub async fn run_business(&self, business_id: &BusinessId, trigger: RunTrigger) -> Result<RunReport, WorkerError> {
        let registry = &self.inner.registry;
        let config = registry
            .config(business_id)
            .ok_or_else(|| WorkerError::NotConfigured(business_id.clone()))?;
        let report = RunReport::new(business_id.clone(), trigger, Utc::now());

        if !config.enabled {
            return Ok(report.skip(SkipReason::Disabled));
        }
        if config.mode == ComplianceMode::SelfVerifiable {
            return Ok(report.skip(SkipReason::SelfVerifiable));
        }
        if trigger == RunTrigger::Scheduled && !config.auto_submit {
            return Ok(report.skip(SkipReason::AutoSubmitOff));
        }

        let lock = self.run_lock(business_id);
        let _guard = lock.lock().await;

        let mut report = report;
        self.run_locked(&config, &mut report).await;

        let finished = Utc::now();
        report.finished_at = finished;
        registry.store().update_config(business_id, |cfg| {
            cfg.last_processed_at = Some(finished);
        });
        tracing::info!(
            business_id = %business_id,
            trigger = ?trigger,
            selected = report.selected,
            succeeded = report.succeeded,
            failed = report.failed,
            "transmission run finished"
        );
        Ok(report)
    }

    async fn run_locked(&self, config: &ComplianceConfig, report: &mut RunReport) {
        let business_id = &config.business_id;
        let now = Utc::now();
        let selected = self.select(config, now, report);
        report.selected = selected.len();
        if selected.is_empty() {
            return;
        }

        let certificate = self.inner.monitor.status(business_id, now);
        let block_reason = match &certificate {
            Ok(status) => status.block_reason(),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = block_reason {
            tracing::warn!(
                business_id = %business_id,
                records = selected.len(),
                reason = %reason,
                "certificate blocks submission"
            );
            for record in &selected {
                let event = TransmissionEvent::CertificateBlocked { reason: reason.clone() };
                if !self.settle(record, event, None, report) {
                    break;
                }
                metrics::counter!("vfx_submissions_failed_total", "reason" => "certificate").increment(1);
            }
            return;
        }

        for record in &selected {
            if !self.submit_one(config, record, report).await {
                break;
            }
        }
    }

    fn select(&self, config: &ComplianceConfig, now: DateTime<Utc>, report: &mut RunReport) -> Vec<ChainRecord> {
        let limit = config.max_records_per_batch as usize;
        let mut selected = Vec::new();
        for record in self.inner.registry.records(&config.business_id) {
            if selected.len() >= limit {
                break;
            }
            match record.status() {
                TransmissionStatus::Sent | TransmissionStatus::Error => continue,
                TransmissionStatus::Processing => {
                    report.blocked_at = Some(record.sequence_number);
                    break;
                }
                TransmissionStatus::Pending if record.transmission.is_legally_verifiable => continue,
                TransmissionStatus::Pending if !record.transmission.is_ready(now) => {
                    tracing::debug!(
                        business_id = %config.business_id,
                        sequence = record.sequence_number,
                        not_before = ?record.transmission.next_attempt_at,
                        "record in backoff holds back later records"
                    );
                    report.blocked_at = Some(record.sequence_number);
                    break;
                }
                TransmissionStatus::Pending => selected.push(record),
            }
        }
        selected
    }

    /// Build the submission for a record from the current invoice.
    ///
    /// `Err` carries a terminal failure reason.
    fn prepare(&self, config: &ComplianceConfig, record: &ChainRecord) -> Result<SubmissionRequest, String> {
        let snapshot = self
            .inner
            .registry
            .snapshot(&record.business_id, &record.invoice_id)
            .ok_or_else(|| "invoice is no longer available from the invoicing module".to_string())?;
        let canonical =
            canonicalize_invoice(&snapshot).map_err(|e| format!("invoice can no longer be canonicalized: {e}"))?;
        if chain_digest(&record.previous_hash, &canonical) != record.current_hash {
            tracing::error!(
                business_id = %record.business_id,
                sequence = record.sequence_number,
                invoice_id = %record.invoice_id,
                "chain integrity failure: invoice changed after registration"
            );
            return Err("invoice changed after registration; its content no longer matches the chain hash".to_string());
        }

        let document = encode_snapshot(&snapshot);
        let header = EnvelopeHeader {
            issuer_legal_id: document.issuer.legal_id.clone().unwrap_or_default(),
            issuer_name: document.issuer.name.clone().unwrap_or_default(),
            environment: config.environment.as_str().to_string(),
        };
        let entry = EnvelopeEntry {
            sequence: record.sequence_number,
            previous_hash: record.previous_hash.as_str().to_string(),
            current_hash: record.current_hash.as_str().to_string(),
            direction: record.invoice_direction.as_str().to_string(),
            document,
        };
        let body = encode_envelope(&header, std::slice::from_ref(&entry)).map_err(|e| e.to_string())?;

        Ok(SubmissionRequest {
            business_id: record.business_id.clone(),
            environment: config.environment,
            sequences: vec![record.sequence_number],
            body,
        })
    }

    /// Submit one record. Returns whether the run may continue.
    async fn submit_one(&self, config: &ComplianceConfig, record: &ChainRecord, report: &mut RunReport) -> bool {
        let business_id = &config.business_id;
        let sequence = record.sequence_number;

        let request = match self.prepare(config, record) {
            Ok(request) => request,
            Err(reason) => {
                tracing::warn!(business_id = %business_id, sequence, reason = %reason, "record cannot be submitted");
                if !self.settle(record, TransmissionEvent::Claim, None, report) {
                    return false;
                }
                let event = TransmissionEvent::Failed {
                    class: FailureClass::NonRetryable,
                    reason,
                };
                metrics::counter!("vfx_submissions_failed_total", "reason" => "invalid").increment(1);
                return self.settle(record, event, Some(FailureClass::NonRetryable), report);
            }
        };

        let interval = std::time::Duration::from_secs(config.flow_control_interval_seconds);
        self.inner.flow.wait_turn(business_id, interval).await;

        if !self.settle(record, TransmissionEvent::Claim, None, report) {
            return false;
        }

        metrics::counter!("vfx_submissions_attempted_total").increment(1);
        tracing::debug!(business_id = %business_id, sequence, adapter = self.inner.adapter.adapter_name(), "submitting");
        let timeout = self.inner.settings.submission_timeout;
        let outcome = match tokio::time::timeout(timeout, self.inner.adapter.submit(&request)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout {
                secs: timeout.as_secs(),
            }),
        };

        let event = match outcome {
            Ok(outcomes) => match outcomes.into_iter().find(|o| o.sequence() == sequence) {
                Some(RecordOutcome::Accepted { code, .. }) => {
                    metrics::counter!("vfx_submissions_accepted_total").increment(1);
                    TransmissionEvent::Accepted { code }
                }
                Some(RecordOutcome::Rejected { kind, reason, .. }) => {
                    metrics::counter!("vfx_submissions_failed_total", "reason" => "rejected").increment(1);
                    TransmissionEvent::Failed {
                        class: FailureClass::NonRetryable,
                        reason: format!("{kind}: {reason}"),
                    }
                }
                None => {
                    metrics::counter!("vfx_submissions_failed_total", "reason" => "protocol").increment(1);
                    TransmissionEvent::Failed {
                        class: FailureClass::Retryable,
                        reason: "authority response did not include this record".to_string(),
                    }
                }
            },
            Err(e) => {
                let label = match e.class() {
                    FailureClass::Retryable => "transport",
                    FailureClass::NonRetryable => "rejected",
                };
                metrics::counter!("vfx_submissions_failed_total", "reason" => label).increment(1);
                TransmissionEvent::Failed {
                    class: e.class(),
                    reason: e.to_string(),
                }
            }
        };
        let class = match &event {
            TransmissionEvent::Failed { class, .. } => Some(*class),
            _ => None,
        };
        self.settle(record, event, class, report)
    }

    /// Apply an event and account for it. Returns whether the run may
    /// continue.
    fn settle(
        &self,
        record: &ChainRecord,
        event: TransmissionEvent,
        class: Option<FailureClass>,
        report: &mut RunReport,
    ) -> bool {
        let sequence = record.sequence_number;
        let is_claim = matches!(event, TransmissionEvent::Claim);
        let applied = self.inner.registry.apply(
            &record.business_id,
            sequence,
            event,
            &self.inner.settings.retry,
            Utc::now(),
        );
        let (updated, effect) = match applied {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(
                    business_id = %record.business_id,
                    sequence,
                    error = %e,
                    "transmission state update failed, stopping run"
                );
                report.halted = Some(format!("record {sequence}: {e}"));
                return false;
            }
        };
        if !report.touched.contains(&sequence) {
            report.touched.push(sequence);
        }
        if is_claim {
            return true;
        }

        report.processed += 1;
        let failure = |reason: String| RecordFailure {
            sequence,
            invoice_id: record.invoice_id.clone(),
            reason,
            class,
            status: updated.status(),
            next_attempt_at: updated.transmission.next_attempt_at,
        };
        match effect {
            Effect::Confirmed { code } => {
                tracing::info!(business_id = %record.business_id, sequence, code = %code, "record accepted");
                report.succeeded += 1;
                true
            }
            Effect::RetryScheduled { not_before } => {
                let reason = updated.transmission.last_error.clone().unwrap_or_default();
                tracing::warn!(
                    business_id = %record.business_id,
                    sequence,
                    attempts = updated.transmission.attempts,
                    %not_before,
                    reason = %reason,
                    "retryable failure, later records wait"
                );
                report.fail(failure(reason));
                report.halted = Some(format!("record {sequence} scheduled for retry"));
                false
            }
            Effect::Failed { reason } => {
                tracing::warn!(business_id = %record.business_id, sequence, reason = %reason, "record moved to error");
                report.fail(failure(reason));
                true
            }
            Effect::Submit | Effect::Released => true,
        }
    }

    /// Run every submitting business concurrently, one task per business.
    pub async fn run_all(&self, trigger: RunTrigger) -> RunAllReport {
        let mut tasks = JoinSet::new();
        let mut task_business = HashMap::new();
        for config in self.inner.registry.configs() {
            if !config.submits() || (trigger == RunTrigger::Scheduled && !config.auto_submit) {
                continue;
            }
            let worker = self.clone();
            let business_id = config.business_id.clone();
            let handle = tasks.spawn(async move {
                let result = worker.run_business(&business_id, trigger).await;
                (business_id, result)
            });
            task_business.insert(handle.id(), config.business_id);
        }

        let mut reports = Vec::new();
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(report))) => reports.push(report),
                Ok((business_id, Err(e))) => {
                    tracing::error!(business_id = %business_id, error = %e, "transmission run failed");
                    errors.push(RunError {
                        business_id,
                        error: e.to_string(),
                    });
                }
                Err(join) => {
                    tracing::error!(error = %join, "transmission task crashed");
                    if let Some(business_id) = task_business.remove(&join.id()) {
                        errors.push(RunError {
                            business_id,
                            error: join.to_string(),
                        });
                    }
                }
            }
        }
        RunAllReport::new(reports, errors)
    }

    /// Return stale `processing` claims to `pending`.
    pub fn recover(&self, now: DateTime<Utc>) -> RecoveryReport {
        let registry = &self.inner.registry;
        let policy = &self.inner.settings.retry;
        let mut report = RecoveryReport::default();
        for business_id in registry.store().business_ids() {
            let claims = registry
                .store()
                .records_with_status(&business_id, TransmissionStatus::Processing, usize::MAX);
            for record in claims {
                if !record.transmission.is_stale(now, policy.processing_timeout) {
                    continue;
                }
                match registry.apply(&business_id, record.sequence_number, TransmissionEvent::Reclaim, policy, now) {
                    Ok(_) => {
                        tracing::warn!(
                            business_id = %business_id,
                            sequence = record.sequence_number,
                            started = ?record.transmission.processing_started_at,
                            "stale processing claim reclaimed"
                        );
                        metrics::counter!("vfx_records_reclaimed_total").increment(1);
                        report.reclaimed.push(ReclaimedRecord {
                            business_id: business_id.clone(),
                            sequence: record.sequence_number,
                        });
                    }
                    Err(e) => tracing::debug!(
                        business_id = %business_id,
                        sequence = record.sequence_number,
                        error = %e,
                        "reclaim skipped"
                    ),
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MockAuthorityAdapter, MockResponse, RejectionKind};
    use crate::test_support::{registry_with_invoices, ACME};
    use chrono::Duration as TimeDelta;
    use std::time::Duration;
    use vfx_cert::{FsCertificateStore, MonitorSettings};
    use vfx_chain::{ConfigUpdate, RetryPolicy};

    fn no_backoff() -> WorkerSettings {
        WorkerSettings {
            retry: RetryPolicy {
                backoff_base: Duration::ZERO,
                backoff_max: Duration::ZERO,
                ..RetryPolicy::default()
            },
            ..WorkerSettings::default()
        }
    }

    fn worker(registry: &Arc<ChainRegistry>, mock: &MockAuthorityAdapter, settings: WorkerSettings) -> TransmissionWorker {
        let monitor = CertificateMonitor::new(
            Arc::clone(registry),
            Arc::new(FsCertificateStore::new("/nonexistent")),
            MonitorSettings::default(),
        );
        TransmissionWorker::new(Arc::clone(registry), monitor, Arc::new(mock.clone()), settings)
    }

    fn acme() -> BusinessId {
        BusinessId::new(ACME).unwrap()
    }

    fn statuses(registry: &ChainRegistry) -> Vec<TransmissionStatus> {
        registry.records(&acme()).iter().map(ChainRecord::status).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn flow_control_spaces_submissions() {
        let (registry, _) = registry_with_invoices(3, 60);
        let mock = MockAuthorityAdapter::new();
        let report = worker(&registry, &mock, no_backoff())
            .run_business(&acme(), RunTrigger::Manual)
            .await
            .unwrap();

        assert_eq!(report.succeeded, 3);
        let attempts = mock.attempts();
        assert_eq!(attempts.len(), 3);
        let seqs: Vec<u64> = attempts.iter().flat_map(|a| a.sequences.clone()).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert!(attempts[2].at - attempts[0].at >= Duration::from_secs(120));
        assert!(attempts[1].at - attempts[0].at >= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn success_sets_code_and_last_processed() {
        let (registry, _) = registry_with_invoices(1, 0);
        let mock = MockAuthorityAdapter::new();
        worker(&registry, &mock, no_backoff())
            .run_business(&acme(), RunTrigger::Manual)
            .await
            .unwrap();

        let record = registry.record_by_sequence(&acme(), 1).unwrap();
        assert_eq!(record.status(), TransmissionStatus::Sent);
        assert_eq!(record.transmission.authority_confirmation_code.as_deref(), Some("MOCK-acme-1"));
        assert!(record.transmission.transmission_timestamp.is_some());
        assert!(registry.config(&acme()).unwrap().last_processed_at.is_some());
        assert!(mock.attempts()[0].body.contains("<RegistrationBatch"));
    }

    #[tokio::test]
    async fn three_retryable_failures_end_in_error() {
        let (registry, _) = registry_with_invoices(1, 0);
        let unavailable = || {
            MockResponse::Fail(AdapterError::Unavailable {
                reason: "HTTP 503".to_string(),
            })
        };
        let mock = MockAuthorityAdapter::scripted([unavailable(), unavailable(), unavailable()]);
        let worker = worker(&registry, &mock, no_backoff());

        for expected in [TransmissionStatus::Pending, TransmissionStatus::Pending, TransmissionStatus::Error] {
            let report = worker.run_business(&acme(), RunTrigger::Manual).await.unwrap();
            assert_eq!(report.failed, 1);
            assert_eq!(statuses(&registry), vec![expected]);
        }
        let record = registry.record_by_sequence(&acme(), 1).unwrap();
        assert_eq!(record.transmission.attempts, 3);
        assert!(record
            .transmission
            .last_error
            .unwrap()
            .starts_with("retries exhausted after 3 attempts"));
    }

    #[tokio::test]
    async fn retryable_failure_ends_run_but_rejection_does_not() {
        let (registry, _) = registry_with_invoices(3, 0);
        let mock = MockAuthorityAdapter::scripted([
            MockResponse::Reject {
                kind: RejectionKind::Content,
                reason: "bad tax id".to_string(),
            },
            MockResponse::Fail(AdapterError::Timeout { secs: 30 }),
        ]);
        let report = worker(&registry, &mock, no_backoff())
            .run_business(&acme(), RunTrigger::Manual)
            .await
            .unwrap();

        assert_eq!(report.selected, 3);
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.failures[0].reason, "content rejected: bad tax id");
        assert_eq!(report.failures[0].status, TransmissionStatus::Error);
        assert_eq!(report.failures[1].status, TransmissionStatus::Pending);
        assert!(report.halted.is_some());
        assert_eq!(mock.attempts().len(), 2);
        assert_eq!(
            statuses(&registry),
            vec![TransmissionStatus::Error, TransmissionStatus::Pending, TransmissionStatus::Pending]
        );
    }

    #[tokio::test]
    async fn backoff_blocks_later_records() {
        let (registry, _) = registry_with_invoices(2, 0);
        let mock = MockAuthorityAdapter::scripted([MockResponse::Fail(AdapterError::Unavailable {
            reason: "down".to_string(),
        })]);
        // Default policy: 30 s backoff keeps record 1 gated.
        let worker = worker(&registry, &mock, WorkerSettings::default());
        worker.run_business(&acme(), RunTrigger::Manual).await.unwrap();

        let second = worker.run_business(&acme(), RunTrigger::Manual).await.unwrap();
        assert_eq!(second.selected, 0);
        assert_eq!(second.blocked_at, Some(1));
        assert_eq!(mock.attempts().len(), 1);
    }

    #[tokio::test]
    async fn expired_certificate_blocks_without_calling_adapter() {
        let (registry, _) = registry_with_invoices(2, 0);
        registry
            .configure(
                &acme(),
                ConfigUpdate {
                    certificate_valid_until: Some(Utc::now() - TimeDelta::days(1)),
                    ..Default::default()
                },
            )
            .unwrap();
        let mock = MockAuthorityAdapter::new();
        let report = worker(&registry, &mock, no_backoff())
            .run_business(&acme(), RunTrigger::Manual)
            .await
            .unwrap();

        assert!(mock.attempts().is_empty());
        assert_eq!(report.failed, 2);
        assert!(report.failures.iter().all(|f| f.class.is_none()));
        assert_eq!(statuses(&registry), vec![TransmissionStatus::Error; 2]);
        let record = registry.record_by_sequence(&acme(), 1).unwrap();
        assert!(record.transmission.last_error.unwrap().contains("certificate expired"));
    }

    #[tokio::test]
    async fn error_records_do_not_block_later_ones() {
        let (registry, _) = registry_with_invoices(2, 0);
        let mock = MockAuthorityAdapter::scripted([MockResponse::Reject {
            kind: RejectionKind::Duplicate,
            reason: "seen".to_string(),
        }]);
        let worker = worker(&registry, &mock, no_backoff());
        worker.run_business(&acme(), RunTrigger::Manual).await.unwrap();
        assert_eq!(statuses(&registry), vec![TransmissionStatus::Error, TransmissionStatus::Sent]);
    }

    #[tokio::test]
    async fn edited_invoice_is_not_submitted() {
        let (registry, source) = registry_with_invoices(1, 0);
        let mut snapshot = registry
            .snapshot(&acme(), &vfx_core::InvoiceId::new("inv-1").unwrap())
            .unwrap();
        snapshot.invoice_number = "F2026-EDITED".to_string();
        source.upsert(acme(), snapshot);

        let mock = MockAuthorityAdapter::new();
        let report = worker(&registry, &mock, no_backoff())
            .run_business(&acme(), RunTrigger::Manual)
            .await
            .unwrap();
        assert!(mock.attempts().is_empty());
        assert_eq!(report.failures[0].class, Some(FailureClass::NonRetryable));
        assert!(report.failures[0].reason.contains("chain hash"));
        assert_eq!(statuses(&registry), vec![TransmissionStatus::Error]);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_authority_times_out_as_retryable() {
        let (registry, _) = registry_with_invoices(1, 0);
        let mock = MockAuthorityAdapter::scripted([MockResponse::Hang]);
        let report = worker(&registry, &mock, no_backoff())
            .run_business(&acme(), RunTrigger::Manual)
            .await
            .unwrap();
        assert_eq!(report.failures[0].class, Some(FailureClass::Retryable));
        assert!(report.failures[0].reason.contains("within 30s"));
        assert_eq!(statuses(&registry), vec![TransmissionStatus::Pending]);
    }

    #[tokio::test]
    async fn scheduled_runs_respect_auto_submit() {
        let (registry, _) = registry_with_invoices(1, 0);
        registry
            .configure(
                &acme(),
                ConfigUpdate {
                    auto_submit: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let mock = MockAuthorityAdapter::new();
        let worker = worker(&registry, &mock, no_backoff());

        let scheduled = worker.run_all(RunTrigger::Scheduled).await;
        assert!(scheduled.reports.is_empty());

        let manual = worker.run_business(&acme(), RunTrigger::Manual).await.unwrap();
        assert_eq!(manual.succeeded, 1);
    }

    #[tokio::test]
    async fn self_verifiable_business_is_skipped() {
        let (registry, _) = registry_with_invoices(1, 0);
        registry
            .configure(
                &acme(),
                ConfigUpdate {
                    mode: Some(ComplianceMode::SelfVerifiable),
                    ..Default::default()
                },
            )
            .unwrap();
        let mock = MockAuthorityAdapter::new();
        let report = worker(&registry, &mock, no_backoff())
            .run_business(&acme(), RunTrigger::Manual)
            .await
            .unwrap();
        assert_eq!(report.skipped, Some(SkipReason::SelfVerifiable));
        assert!(mock.attempts().is_empty());
    }

    #[tokio::test]
    async fn run_all_covers_every_submitting_business() {
        let (registry, _) = registry_with_invoices(2, 0);
        let other = BusinessId::new("other").unwrap();
        registry
            .configure(
                &other,
                ConfigUpdate {
                    enabled: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        let mock = MockAuthorityAdapter::new();
        let all = worker(&registry, &mock, no_backoff()).run_all(RunTrigger::Scheduled).await;

        assert_eq!(all.totals.businesses, 2);
        assert_eq!(all.totals.succeeded, 2);
        assert!(all.errors.is_empty());
    }

    #[tokio::test]
    async fn recovery_reclaims_stale_claims() {
        let (registry, _) = registry_with_invoices(2, 0);
        let policy = RetryPolicy::default();
        let long_ago = Utc::now() - TimeDelta::hours(2);
        registry
            .apply(&acme(), 1, TransmissionEvent::Claim, &policy, long_ago)
            .unwrap();
        registry
            .apply(&acme(), 2, TransmissionEvent::Claim, &policy, Utc::now())
            .unwrap();

        let mock = MockAuthorityAdapter::new();
        let recovered = worker(&registry, &mock, WorkerSettings::default()).recover(Utc::now());
        assert_eq!(recovered.reclaimed.len(), 1);
        assert_eq!(recovered.reclaimed[0].sequence, 1);
        assert_eq!(
            statuses(&registry),
            vec![TransmissionStatus::Pending, TransmissionStatus::Processing]
        );
    }
}
