//! Invoice snapshot persistence.

use sqlx::types::Json;
use sqlx::PgPool;
use vfx_core::{BusinessId, InvoiceSnapshot};

/// Save the current snapshot of an invoice (upsert).
pub async fn save(pool: &PgPool, business_id: &BusinessId, snapshot: &InvoiceSnapshot) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO invoice_snapshots (business_id, invoice_id, snapshot, updated_at)
         VALUES ($1, $2, $3, now())
         ON CONFLICT (business_id, invoice_id) DO UPDATE SET
            snapshot = EXCLUDED.snapshot,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(business_id.as_str())
    .bind(snapshot.invoice_id.as_str())
    .bind(Json(snapshot))
    .execute(pool)
    .await?;
    Ok(())
}

/// Load every snapshot stored for a business.
pub async fn load_for_business(pool: &PgPool, business_id: &BusinessId) -> Result<Vec<InvoiceSnapshot>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SnapshotRow>(
        "SELECT snapshot FROM invoice_snapshots WHERE business_id = $1 ORDER BY invoice_id",
    )
    .bind(business_id.as_str())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|row| row.snapshot.0).collect())
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    snapshot: Json<InvoiceSnapshot>,
}
