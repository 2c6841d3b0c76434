//! Writes that reached memory but not yet the database.
//!
//! Every persist marks its business (and the record sequences it touched)
//! here first, and the mark is cleared only once the write commits. A
//! failed write leaves the mark in place for the next flush, so a database
//! outage delays durability instead of dropping it.
//!
//! An entry with no sequences still means the business's config is dirty.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use vfx_core::BusinessId;

#[derive(Debug, Clone, Default)]
pub struct PendingWrites {
    dirty: Arc<DashMap<BusinessId, BTreeSet<u64>>>,
    /// Serializes flushes of one business so a caller never returns while
    /// another caller's write of its records is still in flight.
    flush_locks: Arc<DashMap<BusinessId, Arc<tokio::sync::Mutex<()>>>>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, business_id: &BusinessId, sequences: impl IntoIterator<Item = u64>) {
        self.dirty.entry(business_id.clone()).or_default().extend(sequences);
    }

    /// Remove and return everything pending for a business.
    pub fn take(&self, business_id: &BusinessId) -> Option<BTreeSet<u64>> {
        self.dirty.remove(business_id).map(|(_, sequences)| sequences)
    }

    pub fn is_pending(&self, business_id: &BusinessId, sequence: u64) -> bool {
        self.dirty
            .get(business_id)
            .is_some_and(|sequences| sequences.contains(&sequence))
    }

    pub fn contains_business(&self, business_id: &BusinessId) -> bool {
        self.dirty.contains_key(business_id)
    }

    /// Businesses with pending writes, sorted.
    pub fn businesses(&self) -> Vec<BusinessId> {
        let mut ids: Vec<_> = self.dirty.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    pub(crate) fn flush_lock(&self, business_id: &BusinessId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.flush_locks.entry(business_id.clone()).or_default().value())
    }
}
