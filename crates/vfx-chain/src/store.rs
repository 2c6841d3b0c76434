//! # Chain Store
//!
//! In-memory ledger of compliance configs and chain records. Each business
//! owns a [`Ledger`] behind its own `parking_lot::RwLock`, and the ledgers
//! sit in a `DashMap`. Appends and transmission swaps lock only the ledger
//! they touch, so one business's writers never wait on another's.
//!
//! ## Append discipline
//!
//! [`ChainStore::append`] is a conditional write: it succeeds only if the
//! caller's `expected_last` sequence still matches the ledger head, and it
//! advances `ComplianceConfig::last_sequence_number` inside the same write
//! lock. Two writers that read the same head cannot both append.
//!
//! A ledger handle is cloned out of the map before its lock is taken, so no
//! map shard guard is held while a ledger lock is held.
//!
//! Transmission updates are compare-and-swap against the state the caller
//! read, so a worker and an operator requeue cannot overwrite each other.
//!
//! Locks are never held across `.await`; every method here is synchronous.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;
use vfx_core::{BusinessId, ChainHash, InvoiceId};

use crate::record::{ChainRecord, ComplianceConfig, TransmissionStatus};
use crate::transmission::TransmissionState;

/// Errors from store writes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another writer advanced the chain since the caller read its head.
    #[error("append conflict for {business_id}: expected last sequence {expected}, found {actual}")]
    Conflict {
        business_id: BusinessId,
        expected: u64,
        actual: u64,
    },

    /// The record does not carry the next sequence after `expected_last`.
    #[error("record sequence {actual} does not follow {expected_last} for {business_id}")]
    SequenceMismatch {
        business_id: BusinessId,
        expected_last: u64,
        actual: u64,
    },

    /// The invoice is already registered.
    #[error("invoice {invoice_id} already registered as {business_id}#{sequence}")]
    DuplicateInvoice {
        business_id: BusinessId,
        invoice_id: InvoiceId,
        sequence: u64,
    },

    #[error("business {0} has no compliance configuration")]
    UnknownBusiness(BusinessId),

    #[error("chain record {business_id}#{sequence} not found")]
    RecordNotFound { business_id: BusinessId, sequence: u64 },

    /// Compare-and-swap lost: the record changed since it was read.
    #[error("transmission state of {business_id}#{sequence} changed concurrently")]
    StaleTransmission { business_id: BusinessId, sequence: u64 },
}

/// Last sequence number and hash of a business's chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    pub last_sequence: u64,
    pub last_hash: ChainHash,
}

impl ChainHead {
    fn genesis() -> Self {
        Self {
            last_sequence: 0,
            last_hash: ChainHash::genesis(),
        }
    }
}

/// One business's configuration and records.
#[derive(Debug)]
struct Ledger {
    config: ComplianceConfig,
    /// Index `i` holds sequence `i + 1`.
    records: Vec<ChainRecord>,
    by_invoice: HashMap<InvoiceId, u64>,
}

impl Ledger {
    fn new(config: ComplianceConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
            by_invoice: HashMap::new(),
        }
    }

    fn head(&self) -> ChainHead {
        self.records.last().map_or_else(ChainHead::genesis, |r| ChainHead {
            last_sequence: r.sequence_number,
            last_hash: r.current_hash.clone(),
        })
    }

    /// Direct index for intact chains, linear scan for restored ones with gaps.
    fn position(&self, sequence: u64) -> Option<usize> {
        let idx = usize::try_from(sequence.checked_sub(1)?).ok()?;
        if self
            .records
            .get(idx)
            .is_some_and(|r| r.sequence_number == sequence)
        {
            return Some(idx);
        }
        self.records.iter().position(|r| r.sequence_number == sequence)
    }

    fn get(&self, sequence: u64) -> Option<&ChainRecord> {
        self.position(sequence).map(|i| &self.records[i])
    }

    fn get_mut(&mut self, sequence: u64) -> Option<&mut ChainRecord> {
        self.position(sequence).map(|i| &mut self.records[i])
    }
}

type SharedLedger = Arc<RwLock<Ledger>>;

/// Thread-safe in-memory chain store.
#[derive(Debug, Clone, Default)]
pub struct ChainStore {
    ledgers: Arc<DashMap<BusinessId, SharedLedger>>,
}

impl ChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self, business_id: &BusinessId) -> Option<SharedLedger> {
        self.ledgers.get(business_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Ledger handles ordered by business id.
    fn sorted_ledgers(&self) -> Vec<(BusinessId, SharedLedger)> {
        let mut ledgers: Vec<_> = self
            .ledgers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        ledgers.sort_by(|a, b| a.0.cmp(&b.0));
        ledgers
    }

    // -- Configuration --------------------------------------------------

    pub fn config(&self, business_id: &BusinessId) -> Option<ComplianceConfig> {
        self.ledger(business_id).map(|l| l.read().config.clone())
    }

    /// All configurations, ordered by business id.
    pub fn configs(&self) -> Vec<ComplianceConfig> {
        self.sorted_ledgers()
            .into_iter()
            .map(|(_, l)| l.read().config.clone())
            .collect()
    }

    /// Update a business's config, creating a default one first if absent.
    ///
    /// The closure cannot move `last_sequence_number`; the cache is owned by
    /// [`Self::append`].
    pub fn upsert_config<E>(
        &self,
        business_id: &BusinessId,
        f: impl FnOnce(&mut ComplianceConfig) -> Result<(), E>,
    ) -> Result<ComplianceConfig, E> {
        let shared = Arc::clone(
            self.ledgers
                .entry(business_id.clone())
                .or_insert_with(|| {
                    Arc::new(RwLock::new(Ledger::new(ComplianceConfig::new(
                        business_id.clone(),
                    ))))
                })
                .value(),
        );
        let mut ledger = shared.write();
        let mut draft = ledger.config.clone();
        f(&mut draft)?;
        draft.business_id = business_id.clone();
        draft.last_sequence_number = ledger.config.last_sequence_number;
        ledger.config = draft.clone();
        Ok(draft)
    }

    /// Update an existing business's config. Returns `None` if unknown.
    pub fn update_config(
        &self,
        business_id: &BusinessId,
        f: impl FnOnce(&mut ComplianceConfig),
    ) -> Option<ComplianceConfig> {
        let shared = self.ledger(business_id)?;
        let mut ledger = shared.write();
        let cached = ledger.config.last_sequence_number;
        f(&mut ledger.config);
        ledger.config.last_sequence_number = cached;
        Some(ledger.config.clone())
    }

    // -- Records --------------------------------------------------------

    pub fn head(&self, business_id: &BusinessId) -> Option<ChainHead> {
        self.ledger(business_id).map(|l| l.read().head())
    }

    pub fn find_by_invoice(&self, business_id: &BusinessId, invoice_id: &InvoiceId) -> Option<ChainRecord> {
        let shared = self.ledger(business_id)?;
        let ledger = shared.read();
        let seq = *ledger.by_invoice.get(invoice_id)?;
        ledger.get(seq).cloned()
    }

    pub fn record(&self, business_id: &BusinessId, sequence: u64) -> Option<ChainRecord> {
        self.ledger(business_id)?.read().get(sequence).cloned()
    }

    /// All records of a business in ascending sequence order.
    pub fn records(&self, business_id: &BusinessId) -> Vec<ChainRecord> {
        self.ledger(business_id)
            .map(|l| l.read().records.clone())
            .unwrap_or_default()
    }

    /// Up to `limit` records with `status`, in ascending sequence order.
    pub fn records_with_status(
        &self,
        business_id: &BusinessId,
        status: TransmissionStatus,
        limit: usize,
    ) -> Vec<ChainRecord> {
        self.ledger(business_id)
            .map(|l| {
                l.read()
                    .records
                    .iter()
                    .filter(|r| r.status() == status)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Conditionally append `record` as the successor of `expected_last`.
    pub fn append(&self, record: ChainRecord, expected_last: u64) -> Result<(), StoreError> {
        let business_id = record.business_id.clone();
        let shared = self
            .ledger(&business_id)
            .ok_or_else(|| StoreError::UnknownBusiness(business_id.clone()))?;
        let mut ledger = shared.write();

        if let Some(&sequence) = ledger.by_invoice.get(&record.invoice_id) {
            return Err(StoreError::DuplicateInvoice {
                business_id,
                invoice_id: record.invoice_id,
                sequence,
            });
        }
        let head = ledger.head();
        if head.last_sequence != expected_last {
            return Err(StoreError::Conflict {
                business_id,
                expected: expected_last,
                actual: head.last_sequence,
            });
        }
        if record.sequence_number != expected_last + 1 || record.previous_hash != head.last_hash {
            return Err(StoreError::SequenceMismatch {
                business_id,
                expected_last,
                actual: record.sequence_number,
            });
        }

        ledger
            .by_invoice
            .insert(record.invoice_id.clone(), record.sequence_number);
        ledger.config.last_sequence_number = record.sequence_number;
        ledger.records.push(record);
        Ok(())
    }

    /// Replace a record's transmission state if it still equals `expected`.
    pub fn swap_transmission(
        &self,
        business_id: &BusinessId,
        sequence: u64,
        expected: &TransmissionState,
        next: TransmissionState,
    ) -> Result<ChainRecord, StoreError> {
        let not_found = || StoreError::RecordNotFound {
            business_id: business_id.clone(),
            sequence,
        };
        let shared = self.ledger(business_id).ok_or_else(not_found)?;
        let mut ledger = shared.write();
        let record = ledger.get_mut(sequence).ok_or_else(not_found)?;
        if &record.transmission != expected {
            return Err(StoreError::StaleTransmission {
                business_id: business_id.clone(),
                sequence,
            });
        }
        record.transmission = next;
        Ok(record.clone())
    }

    /// Load a business's persisted state, replacing anything in memory.
    ///
    /// Records are stored as given (sorted by sequence) so that a damaged
    /// chain is kept for audit rather than rejected; run a verification
    /// afterwards. The config cache is restored verbatim for the same reason.
    /// Meant for startup; a writer still holding the old ledger handle
    /// writes into the replaced ledger.
    pub fn restore(&self, config: ComplianceConfig, mut records: Vec<ChainRecord>) {
        records.sort_by_key(|r| r.sequence_number);
        let mut ledger = Ledger::new(config);
        for r in &records {
            ledger.by_invoice.insert(r.invoice_id.clone(), r.sequence_number);
        }
        ledger.records = records;
        self.ledgers.insert(
            ledger.config.business_id.clone(),
            Arc::new(RwLock::new(ledger)),
        );
    }

    /// Overwrite the cached last sequence number without touching records.
    ///
    /// Only for restoring persisted state that disagrees with its records.
    pub fn set_sequence_cache(&self, business_id: &BusinessId, value: u64) -> bool {
        match self.ledger(business_id) {
            Some(ledger) => {
                ledger.write().config.last_sequence_number = value;
                true
            }
            None => false,
        }
    }

    pub fn business_ids(&self) -> Vec<BusinessId> {
        let mut ids: Vec<_> = self.ledgers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}
