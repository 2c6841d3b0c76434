//! Read-only access to invoice snapshots owned by the invoicing module.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use vfx_core::{BusinessId, InvoiceId, InvoiceSnapshot};

/// Supplies the current snapshot of an invoice.
///
/// The chain registry calls this at registration and during verification.
/// Implementations must be cheap and non-blocking; a remote invoicing
/// service should be fronted by a cache that implements this trait.
pub trait InvoiceSource: Send + Sync {
    fn snapshot(&self, business_id: &BusinessId, invoice_id: &InvoiceId) -> Option<InvoiceSnapshot>;
}

/// In-memory invoice feed. Also the backing store of the API's snapshot
/// upsert endpoint.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInvoiceSource {
    snapshots: Arc<RwLock<HashMap<(BusinessId, InvoiceId), InvoiceSnapshot>>>,
}

impl InMemoryInvoiceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a snapshot. Returns the previous one, if any.
    pub fn upsert(&self, business_id: BusinessId, snapshot: InvoiceSnapshot) -> Option<InvoiceSnapshot> {
        self.snapshots
            .write()
            .insert((business_id, snapshot.invoice_id.clone()), snapshot)
    }

    pub fn remove(&self, business_id: &BusinessId, invoice_id: &InvoiceId) -> Option<InvoiceSnapshot> {
        self.snapshots
            .write()
            .remove(&(business_id.clone(), invoice_id.clone()))
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

impl InvoiceSource for InMemoryInvoiceSource {
    fn snapshot(&self, business_id: &BusinessId, invoice_id: &InvoiceId) -> Option<InvoiceSnapshot> {
        self.snapshots
            .read()
            .get(&(business_id.clone(), invoice_id.clone()))
            .cloned()
    }
}
