//! Chain record persistence operations.
//!
//! Hash and identity columns are written once; the upsert only refreshes
//! transmission state, so a write-through can never rewrite history.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use vfx_chain::{ChainRecord, TransmissionState};
use vfx_core::{BusinessId, ChainHash, InvoiceId};

/// Save a chain record (insert, or refresh its transmission state).
pub async fn save(pool: &PgPool, record: &ChainRecord) -> Result<(), sqlx::Error> {
    let sequence = i64::try_from(record.sequence_number)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query(
        "INSERT INTO chain_records (id, business_id, sequence_number, invoice_id, invoice_direction,
            previous_hash, current_hash, qr_payload, qr_image_ref, created_at, status, transmission, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
         ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            transmission = EXCLUDED.transmission,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(record.id)
    .bind(record.business_id.as_str())
    .bind(sequence)
    .bind(record.invoice_id.as_str())
    .bind(record.invoice_direction.as_str())
    .bind(record.previous_hash.as_str())
    .bind(record.current_hash.as_str())
    .bind(&record.qr_payload)
    .bind(&record.qr_image_ref)
    .bind(record.created_at)
    .bind(record.status().as_str())
    .bind(Json(&record.transmission))
    .execute(pool)
    .await?;
    Ok(())
}

/// Load all records of a business in sequence order.
pub async fn load_for_business(pool: &PgPool, business_id: &BusinessId) -> Result<Vec<ChainRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ChainRecordRow>(
        "SELECT id, business_id, sequence_number, invoice_id, invoice_direction, previous_hash,
                current_hash, qr_payload, qr_image_ref, created_at, transmission
         FROM chain_records WHERE business_id = $1 ORDER BY sequence_number",
    )
    .bind(business_id.as_str())
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(ChainRecordRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct ChainRecordRow {
    id: Uuid,
    business_id: String,
    sequence_number: i64,
    invoice_id: String,
    invoice_direction: String,
    previous_hash: String,
    current_hash: String,
    qr_payload: String,
    qr_image_ref: String,
    created_at: DateTime<Utc>,
    transmission: Json<TransmissionState>,
}

fn corrupt(id: Uuid, what: &str, e: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Protocol(format!("corrupt {what} in chain record {id}: {e}"))
}

impl ChainRecordRow {
    fn into_record(self) -> Result<ChainRecord, sqlx::Error> {
        let id = self.id;
        Ok(ChainRecord {
            id,
            business_id: BusinessId::new(self.business_id).map_err(|e| corrupt(id, "business_id", e))?,
            invoice_id: InvoiceId::new(self.invoice_id).map_err(|e| corrupt(id, "invoice_id", e))?,
            invoice_direction: self
                .invoice_direction
                .parse()
                .map_err(|e| corrupt(id, "invoice_direction", e))?,
            sequence_number: u64::try_from(self.sequence_number).map_err(|e| corrupt(id, "sequence_number", e))?,
            previous_hash: ChainHash::from_hex(self.previous_hash.trim())
                .map_err(|e| corrupt(id, "previous_hash", e))?,
            current_hash: ChainHash::from_hex(self.current_hash.trim())
                .map_err(|e| corrupt(id, "current_hash", e))?,
            qr_payload: self.qr_payload,
            qr_image_ref: self.qr_image_ref,
            created_at: self.created_at,
            transmission: self.transmission.0,
        })
    }
}
