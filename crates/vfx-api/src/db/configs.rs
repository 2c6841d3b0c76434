//! Compliance configuration persistence.

use sqlx::types::Json;
use sqlx::PgPool;
use vfx_chain::ComplianceConfig;

/// Save a configuration (upsert).
pub async fn save(pool: &PgPool, config: &ComplianceConfig) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO compliance_configs (business_id, config, updated_at)
         VALUES ($1, $2, now())
         ON CONFLICT (business_id) DO UPDATE SET
            config = EXCLUDED.config,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(config.business_id.as_str())
    .bind(Json(config))
    .execute(pool)
    .await?;
    Ok(())
}

/// Load every configuration for hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ComplianceConfig>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ConfigRow>(
        "SELECT config FROM compliance_configs ORDER BY business_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|row| row.config.0).collect())
}

#[derive(sqlx::FromRow)]
struct ConfigRow {
    config: Json<ComplianceConfig>,
}
