//! # Chain Registry
//!
//! Owns per-business hash-chain state. Creates chain records exactly once per
//! invoice, looks them up, verifies chains, and applies transmission
//! transitions.
//!
//! ## Concurrency
//!
//! Record creation for one business is serialized twice over:
//!
//! 1. a per-business mutex held only while reading the head and appending
//!    (no IO and no `.await` happen under it), and
//! 2. the store's conditional append keyed on the expected last sequence.
//!
//! A conditional-append conflict is resolved by re-reading the head and
//! retrying, up to [`MAX_APPEND_ATTEMPTS`] times. Different businesses never
//! contend.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vfx_core::{
    canonicalize_invoice, chain_digest, BusinessId, InvoiceDirection, InvoiceId, InvoiceSnapshot,
};

use crate::error::ChainError;
use crate::qr::{build_qr, QrSettings};
use crate::record::{ChainRecord, ComplianceConfig, ComplianceMode, ConfigUpdate, TransmissionStatus};
use crate::source::InvoiceSource;
use crate::store::{ChainStore, StoreError};
use crate::transmission::{transition, Effect, RetryPolicy, TransmissionEvent, TransmissionState};
use crate::verify::{replay, VerificationReport};

/// Bound on conditional-append and compare-and-swap retries.
pub const MAX_APPEND_ATTEMPTS: u32 = 8;

/// Per-status record counts of one business.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub sent: u64,
    pub error: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.sent + self.error
    }

    fn bump(&mut self, status: TransmissionStatus) {
        match status {
            TransmissionStatus::Pending => self.pending += 1,
            TransmissionStatus::Processing => self.processing += 1,
            TransmissionStatus::Sent => self.sent += 1,
            TransmissionStatus::Error => self.error += 1,
        }
    }
}

/// Chain registry for all businesses.
pub struct ChainRegistry {
    store: ChainStore,
    source: Arc<dyn InvoiceSource>,
    qr: QrSettings,
    locks: DashMap<BusinessId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for ChainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainRegistry")
            .field("store", &self.store)
            .field("qr", &self.qr)
            .finish_non_exhaustive()
    }
}

impl ChainRegistry {
    pub fn new(store: ChainStore, source: Arc<dyn InvoiceSource>, qr: QrSettings) -> Self {
        Self {
            store,
            source,
            qr,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &ChainStore {
        &self.store
    }

    /// Current snapshot of an invoice from the invoicing module.
    pub fn snapshot(&self, business_id: &BusinessId, invoice_id: &InvoiceId) -> Option<InvoiceSnapshot> {
        self.source.snapshot(business_id, invoice_id)
    }

    fn business_lock(&self, business_id: &BusinessId) -> Arc<Mutex<()>> {
        self.locks.entry(business_id.clone()).or_default().clone()
    }

    // -- Configuration --------------------------------------------------

    pub fn config(&self, business_id: &BusinessId) -> Option<ComplianceConfig> {
        self.store.config(business_id)
    }

    pub fn configs(&self) -> Vec<ComplianceConfig> {
        self.store.configs()
    }

    /// Create or update a business's configuration.
    pub fn configure(&self, business_id: &BusinessId, update: ConfigUpdate) -> Result<ComplianceConfig, ChainError> {
        let config = self
            .store
            .upsert_config(business_id, |config| config.apply(update))?;
        tracing::info!(
            business_id = %business_id,
            enabled = config.enabled,
            mode = config.mode.as_str(),
            environment = %config.environment,
            "compliance configuration updated"
        );
        Ok(config)
    }

    // -- Record creation ------------------------------------------------

    /// Return the chain record of an invoice, creating it if needed.
    ///
    /// Idempotent: a second call for the same invoice returns the existing
    /// record and never consumes a sequence number.
    ///
    /// # Errors
    ///
    /// - [`ChainError::NotConfigured`] / [`ChainError::Disabled`] when the
    ///   business cannot register invoices.
    /// - [`ChainError::InvoiceNotFound`], [`ChainError::DirectionMismatch`],
    ///   or [`ChainError::Canonicalization`] for unusable snapshots. No
    ///   record is created.
    /// - [`ChainError::ConcurrencyConflict`] if the append lost the race
    ///   [`MAX_APPEND_ATTEMPTS`] times.
    pub fn get_or_create(
        &self,
        business_id: &BusinessId,
        invoice_id: &InvoiceId,
        direction: InvoiceDirection,
    ) -> Result<ChainRecord, ChainError> {
        if let Some(existing) = self.store.find_by_invoice(business_id, invoice_id) {
            return Ok(existing);
        }

        let config = self
            .store
            .config(business_id)
            .ok_or_else(|| ChainError::NotConfigured(business_id.clone()))?;
        if !config.enabled {
            return Err(ChainError::Disabled(business_id.clone()));
        }

        let snapshot = self
            .source
            .snapshot(business_id, invoice_id)
            .ok_or_else(|| ChainError::InvoiceNotFound {
                business_id: business_id.clone(),
                invoice_id: invoice_id.clone(),
            })?;
        if snapshot.direction != direction {
            return Err(ChainError::DirectionMismatch {
                invoice_id: invoice_id.clone(),
                requested: direction,
                actual: snapshot.direction,
            });
        }
        let canonical = canonicalize_invoice(&snapshot)?;
        let base_url = self.qr.base_url(config.environment);

        let lock = self.business_lock(business_id);
        let _guard = lock.lock();

        // Another caller may have registered it while we canonicalized.
        if let Some(existing) = self.store.find_by_invoice(business_id, invoice_id) {
            return Ok(existing);
        }

        for attempt in 1..=MAX_APPEND_ATTEMPTS {
            let head = self
                .store
                .head(business_id)
                .ok_or_else(|| ChainError::NotConfigured(business_id.clone()))?;
            let sequence = head.last_sequence + 1;
            let current_hash = chain_digest(&head.last_hash, &canonical);
            let qr = build_qr(base_url, &snapshot, &current_hash)?;

            let record = ChainRecord {
                id: Uuid::new_v4(),
                business_id: business_id.clone(),
                invoice_id: invoice_id.clone(),
                invoice_direction: direction,
                sequence_number: sequence,
                previous_hash: head.last_hash,
                current_hash,
                qr_payload: qr.payload,
                qr_image_ref: qr.image_ref,
                created_at: Utc::now(),
                transmission: TransmissionState::new(config.mode == ComplianceMode::SelfVerifiable),
            };

            match self.store.append(record.clone(), head.last_sequence) {
                Ok(()) => {
                    tracing::info!(
                        business_id = %business_id,
                        invoice_id = %invoice_id,
                        sequence,
                        hash = %record.current_hash,
                        "chain record created"
                    );
                    return Ok(record);
                }
                Err(StoreError::Conflict { expected, actual, .. }) => {
                    tracing::debug!(
                        business_id = %business_id,
                        attempt,
                        expected,
                        actual,
                        "append conflict, re-reading chain head"
                    );
                }
                Err(StoreError::DuplicateInvoice { sequence, .. }) => {
                    return self
                        .store
                        .record(business_id, sequence)
                        .ok_or(ChainError::RecordNotFound {
                            business_id: business_id.clone(),
                            sequence,
                        });
                }
                Err(other) => return Err(other.into()),
            }
        }

        tracing::warn!(business_id = %business_id, "giving up on chain append after repeated conflicts");
        Err(ChainError::ConcurrencyConflict {
            business_id: business_id.clone(),
            attempts: MAX_APPEND_ATTEMPTS,
        })
    }

    // -- Lookup ---------------------------------------------------------

    pub fn record(&self, business_id: &BusinessId, invoice_id: &InvoiceId) -> Option<ChainRecord> {
        self.store.find_by_invoice(business_id, invoice_id)
    }

    pub fn record_by_sequence(&self, business_id: &BusinessId, sequence: u64) -> Option<ChainRecord> {
        self.store.record(business_id, sequence)
    }

    /// All records of a business in ascending sequence order.
    pub fn records(&self, business_id: &BusinessId) -> Vec<ChainRecord> {
        self.store.records(business_id)
    }

    pub fn status_counts(&self, business_id: &BusinessId) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in self.store.records(business_id) {
            counts.bump(record.status());
        }
        counts
    }

    // -- Verification ---------------------------------------------------

    /// Replay a business's chain and report the first mismatch, if any.
    ///
    /// A mismatch is logged as an integrity failure and returned in the
    /// report; it is never corrected.
    pub fn verify_chain(&self, business_id: &BusinessId) -> Result<VerificationReport, ChainError> {
        let config = self
            .store
            .config(business_id)
            .ok_or_else(|| ChainError::NotConfigured(business_id.clone()))?;
        let records = self.store.records(business_id);
        let report = replay(
            business_id,
            &records,
            config.last_sequence_number,
            self.source.as_ref(),
            Utc::now(),
        );
        match &report.first_mismatch {
            None => tracing::debug!(
                business_id = %business_id,
                records = report.records_checked,
                "chain verified"
            ),
            Some(m) => tracing::error!(
                business_id = %business_id,
                sequence = m.sequence,
                kind = %m.kind,
                detail = %m.detail,
                "chain integrity failure"
            ),
        }
        Ok(report)
    }

    // -- Transmission ---------------------------------------------------

    /// Apply a transmission event to a record, persisting the result with
    /// compare-and-swap.
    pub fn apply(
        &self,
        business_id: &BusinessId,
        sequence: u64,
        event: TransmissionEvent,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Result<(ChainRecord, Effect), ChainError> {
        for _ in 0..MAX_APPEND_ATTEMPTS {
            let current = self
                .store
                .record(business_id, sequence)
                .ok_or_else(|| ChainError::RecordNotFound {
                    business_id: business_id.clone(),
                    sequence,
                })?;
            let (next, effect) = transition(&current.transmission, event.clone(), policy, now)?;
            match self
                .store
                .swap_transmission(business_id, sequence, &current.transmission, next)
            {
                Ok(updated) => {
                    tracing::debug!(
                        business_id = %business_id,
                        sequence,
                        event = event.name(),
                        status = %updated.status(),
                        "transmission state updated"
                    );
                    return Ok((updated, effect));
                }
                Err(StoreError::StaleTransmission { .. }) => continue,
                Err(other) => return Err(other.into()),
            }
        }
        Err(ChainError::ConcurrencyConflict {
            business_id: business_id.clone(),
            attempts: MAX_APPEND_ATTEMPTS,
        })
    }

    /// Operator retry: move an `error` record back to `pending` with its
    /// attempt counter reset.
    pub fn requeue(&self, business_id: &BusinessId, sequence: u64) -> Result<ChainRecord, ChainError> {
        let (record, _) = self.apply(
            business_id,
            sequence,
            TransmissionEvent::Requeue,
            &RetryPolicy::default(),
            Utc::now(),
        )?;
        tracing::info!(business_id = %business_id, sequence, "chain record requeued");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryInvoiceSource;
    use crate::verify::MismatchKind;
    use chrono::NaiveDate;
    use vfx_core::{Amount, InvoiceLine, InvoiceTotals, PartyProfile, Quantity, TaxRate};

    fn biz() -> BusinessId {
        BusinessId::new("acme").unwrap()
    }

    fn snapshot(id: &str, cents: i64) -> InvoiceSnapshot {
        let tax = (cents * 21 + 50) / 100;
        InvoiceSnapshot {
            invoice_id: InvoiceId::new(id).unwrap(),
            invoice_number: format!("F-{id}"),
            direction: InvoiceDirection::Issued,
            issue_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            currency: "EUR".to_string(),
            issuer: PartyProfile {
                legal_id: "B12345678".to_string(),
                name: "Acme".to_string(),
                address: None,
            },
            counterparty: PartyProfile {
                legal_id: "A87654321".to_string(),
                name: "Widgets".to_string(),
                address: None,
            },
            lines: vec![InvoiceLine {
                description: "Service".to_string(),
                quantity: Quantity::units(1),
                unit_price: Amount::from_minor(cents),
                tax_rate: TaxRate::from_basis_points(2100),
            }],
            totals: InvoiceTotals {
                subtotal: Amount::from_minor(cents),
                tax: Amount::from_minor(tax),
                total: Amount::from_minor(cents + tax),
            },
        }
    }

    fn setup() -> (ChainRegistry, InMemoryInvoiceSource) {
        let source = InMemoryInvoiceSource::new();
        let registry = ChainRegistry::new(ChainStore::new(), Arc::new(source.clone()), QrSettings::default());
        registry
            .configure(
                &biz(),
                ConfigUpdate {
                    enabled: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        (registry, source)
    }

    fn register(registry: &ChainRegistry, source: &InMemoryInvoiceSource, id: &str) -> ChainRecord {
        source.upsert(biz(), snapshot(id, 10000));
        registry
            .get_or_create(&biz(), &InvoiceId::new(id).unwrap(), InvoiceDirection::Issued)
            .unwrap()
    }

    #[test]
    fn first_record_links_to_genesis() {
        let (registry, source) = setup();
        let r = register(&registry, &source, "inv-1");
        assert_eq!(r.sequence_number, 1);
        assert!(r.previous_hash.is_genesis());
        assert_eq!(r.status(), TransmissionStatus::Pending);
        assert!(!r.transmission.is_legally_verifiable);
        assert!(r.qr_payload.contains(&format!("huella={}", r.current_hash.fragment(16))));
    }

    #[test]
    fn records_link_in_sequence() {
        let (registry, source) = setup();
        let a = register(&registry, &source, "inv-1");
        let b = register(&registry, &source, "inv-2");
        assert_eq!(b.sequence_number, 2);
        assert_eq!(b.previous_hash, a.current_hash);
        assert_eq!(registry.config(&biz()).unwrap().last_sequence_number, 2);
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let (registry, source) = setup();
        let a = register(&registry, &source, "inv-1");
        let again = register(&registry, &source, "inv-1");
        assert_eq!(a, again);
        assert_eq!(registry.records(&biz()).len(), 1);
        assert_eq!(registry.config(&biz()).unwrap().last_sequence_number, 1);
    }

    #[test]
    fn unconfigured_business_is_rejected() {
        let source = InMemoryInvoiceSource::new();
        let registry = ChainRegistry::new(ChainStore::new(), Arc::new(source), QrSettings::default());
        let err = registry
            .get_or_create(&biz(), &InvoiceId::new("x").unwrap(), InvoiceDirection::Issued)
            .unwrap_err();
        assert!(matches!(err, ChainError::NotConfigured(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn disabled_business_is_rejected() {
        let (registry, source) = setup();
        registry
            .configure(
                &biz(),
                ConfigUpdate {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        source.upsert(biz(), snapshot("inv-1", 100));
        let err = registry
            .get_or_create(&biz(), &InvoiceId::new("inv-1").unwrap(), InvoiceDirection::Issued)
            .unwrap_err();
        assert!(matches!(err, ChainError::Disabled(_)));
    }

    #[test]
    fn invalid_snapshot_creates_no_record() {
        let (registry, source) = setup();
        let mut s = snapshot("inv-1", 100);
        s.counterparty.legal_id.clear();
        source.upsert(biz(), s);
        let err = registry
            .get_or_create(&biz(), &InvoiceId::new("inv-1").unwrap(), InvoiceDirection::Issued)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(registry.records(&biz()).is_empty());
        assert_eq!(registry.config(&biz()).unwrap().last_sequence_number, 0);
    }

    #[test]
    fn direction_mismatch_is_rejected() {
        let (registry, source) = setup();
        source.upsert(biz(), snapshot("inv-1", 100));
        let err = registry
            .get_or_create(&biz(), &InvoiceId::new("inv-1").unwrap(), InvoiceDirection::Received)
            .unwrap_err();
        assert!(matches!(err, ChainError::DirectionMismatch { .. }));
    }

    #[test]
    fn missing_snapshot_is_rejected() {
        let (registry, _source) = setup();
        let err = registry
            .get_or_create(&biz(), &InvoiceId::new("ghost").unwrap(), InvoiceDirection::Issued)
            .unwrap_err();
        assert!(matches!(err, ChainError::InvoiceNotFound { .. }));
    }

    #[test]
    fn self_verifiable_records_are_verifiable_at_creation() {
        let (registry, source) = setup();
        registry
            .configure(
                &biz(),
                ConfigUpdate {
                    mode: Some(ComplianceMode::SelfVerifiable),
                    ..Default::default()
                },
            )
            .unwrap();
        let r = register(&registry, &source, "inv-1");
        assert!(r.transmission.is_legally_verifiable);
    }

    #[test]
    fn intact_chain_verifies() {
        let (registry, source) = setup();
        for i in 1..=5 {
            register(&registry, &source, &format!("inv-{i}"));
        }
        let report = registry.verify_chain(&biz()).unwrap();
        assert!(report.is_intact());
        assert_eq!(report.records_checked, 5);
    }

    #[test]
    fn edited_invoice_is_detected() {
        let (registry, source) = setup();
        for i in 1..=3 {
            register(&registry, &source, &format!("inv-{i}"));
        }
        source.upsert(biz(), snapshot("inv-2", 20000));
        let report = registry.verify_chain(&biz()).unwrap();
        let mismatch = report.first_mismatch.clone().unwrap();
        assert_eq!(mismatch.sequence, 2);
        assert_eq!(mismatch.kind, MismatchKind::HashMismatch);
        assert_eq!(report.records_checked, 1);
        assert!(matches!(
            report.into_result(),
            Err(ChainError::Integrity { sequence: 2, .. })
        ));
    }

    #[test]
    fn deleted_invoice_is_detected() {
        let (registry, source) = setup();
        register(&registry, &source, "inv-1");
        source.remove(&biz(), &InvoiceId::new("inv-1").unwrap());
        let report = registry.verify_chain(&biz()).unwrap();
        assert_eq!(
            report.first_mismatch.unwrap().kind,
            MismatchKind::MissingSourceInvoice
        );
    }

    #[test]
    fn cache_drift_is_detected() {
        let (registry, source) = setup();
        register(&registry, &source, "inv-1");
        registry.store().set_sequence_cache(&biz(), 7);
        let report = registry.verify_chain(&biz()).unwrap();
        let m = report.first_mismatch.unwrap();
        assert_eq!(m.kind, MismatchKind::CacheDrift);
        assert_eq!(m.sequence, 7);
    }

    #[test]
    fn broken_link_is_detected_after_restore() {
        let (registry, source) = setup();
        let a = register(&registry, &source, "inv-1");
        let mut b = register(&registry, &source, "inv-2");
        b.previous_hash = vfx_core::ChainHash::genesis();
        registry
            .store()
            .restore(registry.config(&biz()).unwrap(), vec![a, b]);
        let m = registry.verify_chain(&biz()).unwrap().first_mismatch.unwrap();
        assert_eq!(m.kind, MismatchKind::BrokenLink);
        assert_eq!(m.sequence, 2);
    }

    #[test]
    fn status_counts_reflect_records() {
        let (registry, source) = setup();
        register(&registry, &source, "inv-1");
        register(&registry, &source, "inv-2");
        let counts = registry.status_counts(&biz());
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn requeue_only_from_error() {
        let (registry, source) = setup();
        register(&registry, &source, "inv-1");
        assert!(matches!(
            registry.requeue(&biz(), 1),
            Err(ChainError::Transition(_))
        ));

        registry
            .apply(
                &biz(),
                1,
                TransmissionEvent::CertificateBlocked {
                    reason: "certificate expired".into(),
                },
                &RetryPolicy::default(),
                Utc::now(),
            )
            .unwrap();
        let r = registry.requeue(&biz(), 1).unwrap();
        assert_eq!(r.status(), TransmissionStatus::Pending);
        assert_eq!(r.transmission.attempts, 0);
    }

    #[test]
    fn requeue_unknown_record() {
        let (registry, _) = setup();
        assert!(matches!(
            registry.requeue(&biz(), 42),
            Err(ChainError::RecordNotFound { sequence: 42, .. })
        ));
    }

    #[test]
    fn concurrent_creation_yields_contiguous_sequences() {
        let (registry, source) = setup();
        let registry = Arc::new(registry);
        for i in 0..32 {
            source.upsert(biz(), snapshot(&format!("c-{i}"), 100 + i));
        }
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .get_or_create(
                            &biz(),
                            &InvoiceId::new(format!("c-{i}")).unwrap(),
                            InvoiceDirection::Issued,
                        )
                        .unwrap()
                        .sequence_number
                })
            })
            .collect();
        let mut seqs: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=32).collect::<Vec<_>>());
        assert!(registry.verify_chain(&biz()).unwrap().is_intact());
    }
}
