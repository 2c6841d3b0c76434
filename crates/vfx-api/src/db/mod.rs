//! # Database Persistence Layer
//!
//! Optional PostgreSQL write-through for chain records, compliance
//! configurations and invoice snapshots via SQLx.
//!
//! When `DATABASE_URL` is set, every mutation the API or the scheduler
//! performs is upserted, and the in-memory store and invoice feed are
//! hydrated from the database at startup. Hydrated chains are verified
//! immediately; a mismatch is logged as an integrity failure and left as
//! found. Without `DATABASE_URL` the service runs in-memory only.
//!
//! Failed writes stay marked in [`PendingWrites`] and are retried on the
//! next persist of the business or the next scheduler tick.

pub mod chain_records;
pub mod configs;
pub mod pending;
pub mod snapshots;

pub use pending::PendingWrites;

use sqlx::postgres::{PgPool, PgPoolOptions};
use vfx_chain::{ChainRecord, ChainRegistry, ComplianceConfig, InMemoryInvoiceSource};
use vfx_core::{BusinessId, InvoiceSnapshot};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set: running in-memory only. \
                 Chains will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Outcome of loading persisted state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HydrationSummary {
    pub businesses: usize,
    pub records: usize,
    pub broken_chains: usize,
}

/// Everything stored for one business.
#[derive(Debug, Clone)]
pub struct PersistedBusiness {
    pub config: ComplianceConfig,
    pub records: Vec<ChainRecord>,
    pub snapshots: Vec<InvoiceSnapshot>,
}

/// Put one business's stored state back into memory and verify its chain.
///
/// Snapshots go into the invoice feed before verification so hashes are
/// recomputed from the stored invoice content. Returns whether the
/// chain is intact.
pub fn restore_business(
    registry: &ChainRegistry,
    invoices: &InMemoryInvoiceSource,
    business: PersistedBusiness,
) -> bool {
    let business_id = business.config.business_id.clone();
    for snapshot in business.snapshots {
        invoices.upsert(business_id.clone(), snapshot);
    }
    registry.store().restore(business.config, business.records);

    match registry.verify_chain(&business_id) {
        Ok(report) => report.is_intact(),
        Err(e) => {
            tracing::error!(business_id = %business_id, error = %e, "chain verification failed after hydration");
            false
        }
    }
}

/// Load every business, its chain and its invoice snapshots into memory,
/// then verify each chain.
pub async fn hydrate(
    pool: &PgPool,
    registry: &ChainRegistry,
    invoices: &InMemoryInvoiceSource,
) -> Result<HydrationSummary, sqlx::Error> {
    let mut summary = HydrationSummary::default();
    for config in configs::load_all(pool).await? {
        let business_id = config.business_id.clone();
        let records = chain_records::load_for_business(pool, &business_id).await?;
        let snapshots = snapshots::load_for_business(pool, &business_id).await?;
        summary.businesses += 1;
        summary.records += records.len();
        let intact = restore_business(
            registry,
            invoices,
            PersistedBusiness {
                config,
                records,
                snapshots,
            },
        );
        if !intact {
            summary.broken_chains += 1;
        }
    }
    tracing::info!(
        businesses = summary.businesses,
        records = summary.records,
        broken_chains = summary.broken_chains,
        "hydrated chain state from database"
    );
    Ok(summary)
}

/// Write a business's config and the given records through to the
/// database. Each record's current invoice snapshot is saved before the
/// record itself.
pub async fn persist(
    pool: &PgPool,
    registry: &ChainRegistry,
    business_id: &BusinessId,
    sequences: &[u64],
) -> Result<(), sqlx::Error> {
    if let Some(config) = registry.config(business_id) {
        configs::save(pool, &config).await?;
    }
    for &sequence in sequences {
        if let Some(record) = registry.record_by_sequence(business_id, sequence) {
            if let Some(snapshot) = registry.snapshot(business_id, &record.invoice_id) {
                snapshots::save(pool, business_id, &snapshot).await?;
            }
            chain_records::save(pool, &record).await?;
        }
    }
    Ok(())
}
