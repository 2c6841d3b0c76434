//! # Application State
//!
//! Shared state for the Axum application: the chain registry and its
//! invoice feed, the certificate monitor, the transmission worker, and the
//! optional database pool and metrics handle.
//!
//! Database writes go through [`AppState::persist`], which keeps failed
//! writes in [`PendingWrites`] until a later flush commits them.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use vfx_cert::{CertificateMonitor, FsCertificateStore};
use vfx_chain::{ChainRegistry, ChainStore, InMemoryInvoiceSource};
use vfx_core::{BusinessId, InvoiceSnapshot};
use vfx_transmit::{AuthorityAdapter, MockAuthorityAdapter, TransmissionWorker};

use crate::config::AppConfig;
use crate::db::PendingWrites;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ChainRegistry>,
    /// Snapshot feed standing in for the invoicing module.
    pub invoices: InMemoryInvoiceSource,
    pub monitor: CertificateMonitor,
    pub worker: TransmissionWorker,
    pub db_pool: Option<PgPool>,
    /// Writes that have not reached the database yet.
    pub pending: PendingWrites,
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("worker", &self.worker)
            .field("db", &self.db_pool.is_some())
            .field("pending_writes", &self.pending.businesses().len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// In-memory state with default configuration and the mock authority.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), Arc::new(MockAuthorityAdapter::new()), None)
    }

    pub fn with_config(config: AppConfig, adapter: Arc<dyn AuthorityAdapter>, db_pool: Option<PgPool>) -> Self {
        let invoices = InMemoryInvoiceSource::new();
        let registry = Arc::new(ChainRegistry::new(
            ChainStore::new(),
            Arc::new(invoices.clone()),
            config.qr.clone(),
        ));
        let monitor = CertificateMonitor::new(
            Arc::clone(&registry),
            Arc::new(FsCertificateStore::new(config.cert_dir.clone())),
            config.monitor,
        );
        let worker = TransmissionWorker::new(Arc::clone(&registry), monitor.clone(), adapter, config.worker);
        Self {
            config: Arc::new(config),
            registry,
            invoices,
            monitor,
            worker,
            db_pool,
            pending: PendingWrites::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Write a business's config and the given records through to the
    /// database, when one is configured.
    ///
    /// Anything still pending for the business from an earlier failure is
    /// written in the same flush. On failure the writes stay pending.
    pub async fn persist(&self, business_id: &BusinessId, sequences: &[u64]) -> Result<(), AppError> {
        let Some(pool) = &self.db_pool else {
            return Ok(());
        };
        self.pending.mark(business_id, sequences.iter().copied());
        self.flush(pool, business_id).await
    }

    /// Retry every pending write. Returns the number of businesses whose
    /// writes are still pending afterwards.
    pub async fn flush_pending(&self) -> usize {
        let Some(pool) = &self.db_pool else {
            return 0;
        };
        let mut still_pending = 0;
        for business_id in self.pending.businesses() {
            if self.flush(pool, &business_id).await.is_err() {
                still_pending += 1;
            }
        }
        if still_pending > 0 {
            tracing::warn!(businesses = still_pending, "database writes still pending after retry");
        }
        still_pending
    }

    async fn flush(&self, pool: &PgPool, business_id: &BusinessId) -> Result<(), AppError> {
        let lock = self.pending.flush_lock(business_id);
        let _guard = lock.lock().await;
        let Some(sequences) = self.pending.take(business_id) else {
            return Ok(());
        };
        let batch: Vec<u64> = sequences.iter().copied().collect();
        match crate::db::persist(pool, &self.registry, business_id, &batch).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.pending.mark(business_id, sequences);
                metrics::counter!("vfx_persist_failures_total").increment(1);
                tracing::error!(
                    business_id = %business_id,
                    records = batch.len(),
                    error = %e,
                    "failed to persist chain state; kept for retry"
                );
                Err(AppError::Internal(format!(
                    "chain state updated in memory but database persist failed: {e}"
                )))
            }
        }
    }

    /// Store an invoice snapshot, writing it to the database first when one
    /// is configured so a failed write leaves memory unchanged.
    pub async fn save_snapshot(
        &self,
        business_id: &BusinessId,
        snapshot: InvoiceSnapshot,
    ) -> Result<Option<InvoiceSnapshot>, AppError> {
        if let Some(pool) = &self.db_pool {
            crate::db::snapshots::save(pool, business_id, &snapshot)
                .await
                .map_err(|e| {
                    metrics::counter!("vfx_persist_failures_total").increment(1);
                    tracing::error!(
                        business_id = %business_id,
                        invoice_id = %snapshot.invoice_id,
                        error = %e,
                        "failed to persist invoice snapshot"
                    );
                    AppError::Internal(format!("invoice snapshot not stored: {e}"))
                })?;
        }
        Ok(self.invoices.upsert(business_id.clone(), snapshot))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
