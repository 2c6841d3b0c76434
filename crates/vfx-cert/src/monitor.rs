//! # Certificate Lifecycle Monitor
//!
//! Classifies each business's signing certificate by days remaining:
//!
//! | Class           | Condition                         | Blocks submission |
//! |-----------------|-----------------------------------|-------------------|
//! | `expired`       | days < 0                          | yes               |
//! | `expiring_soon` | 0 ≤ days ≤ threshold              | no                |
//! | `healthy`       | days > threshold                  | no                |
//! | `missing`       | no reference or no known validity | yes               |
//!
//! Days are floored, so any instant past `validUntil` is expired.
//! Classification reads only the stored config; [`CertificateMonitor::refresh`]
//! is the only operation that touches the certificate itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vfx_chain::{ChainRegistry, ComplianceConfig};
use vfx_core::BusinessId;

use crate::error::CertError;
use crate::store::CertificateStore;
use crate::window::parse_validity_bounded;

pub const DEFAULT_EXPIRY_THRESHOLD_DAYS: i64 = 30;
pub const DEFAULT_PARSE_TIMEOUT: Duration = Duration::from_secs(10);

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateHealth {
    Healthy,
    ExpiringSoon,
    Expired,
    Missing,
}

impl CertificateHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::ExpiringSoon => "expiring_soon",
            Self::Expired => "expired",
            Self::Missing => "missing",
        }
    }

    /// Whether the transmission worker must refuse to submit.
    pub fn blocks_submission(&self) -> bool {
        matches!(self, Self::Expired | Self::Missing)
    }
}

impl std::fmt::Display for CertificateHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole days from `now` to `valid_until`, rounded toward negative infinity.
pub fn days_until_expiration(valid_until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (valid_until - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Classify a validity end against `now`.
pub fn classify(valid_until: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold_days: i64) -> CertificateHealth {
    match valid_until {
        None => CertificateHealth::Missing,
        Some(until) => {
            let days = days_until_expiration(until, now);
            if days < 0 {
                CertificateHealth::Expired
            } else if days <= threshold_days {
                CertificateHealth::ExpiringSoon
            } else {
                CertificateHealth::Healthy
            }
        }
    }
}

/// Certificate state of one business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateStatus {
    pub business_id: BusinessId,
    pub certificate_ref: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub days_until_expiration: Option<i64>,
    pub health: CertificateHealth,
    pub is_expired: bool,
    pub is_expiring_soon: bool,
    pub checked_at: Option<DateTime<Utc>>,
}

impl CertificateStatus {
    /// Status derived from a stored configuration.
    pub fn from_config(config: &ComplianceConfig, now: DateTime<Utc>, threshold_days: i64) -> Self {
        let valid_until = config
            .certificate_ref
            .as_ref()
            .and(config.certificate_valid_until);
        let health = classify(valid_until, now, threshold_days);
        Self {
            business_id: config.business_id.clone(),
            certificate_ref: config.certificate_ref.clone(),
            valid_until,
            days_until_expiration: valid_until.map(|until| days_until_expiration(until, now)),
            health,
            is_expired: health == CertificateHealth::Expired,
            is_expiring_soon: health == CertificateHealth::ExpiringSoon,
            checked_at: config.certificate_checked_at,
        }
    }

    /// Human-readable reason used when the certificate blocks submission.
    pub fn block_reason(&self) -> Option<String> {
        match self.health {
            CertificateHealth::Expired => Some(format!(
                "signing certificate expired on {}",
                self.valid_until
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "an unknown date".to_string())
            )),
            CertificateHealth::Missing => Some(match &self.certificate_ref {
                None => "no signing certificate configured".to_string(),
                Some(reference) => format!("validity of signing certificate {reference} is unknown"),
            }),
            CertificateHealth::Healthy | CertificateHealth::ExpiringSoon => None,
        }
    }
}

/// Counts per class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub total: usize,
    pub healthy: usize,
    pub expiring_soon: usize,
    pub expired: usize,
    pub missing: usize,
}

impl CheckSummary {
    fn bump(&mut self, health: CertificateHealth) {
        self.total += 1;
        match health {
            CertificateHealth::Healthy => self.healthy += 1,
            CertificateHealth::ExpiringSoon => self.expiring_soon += 1,
            CertificateHealth::Expired => self.expired += 1,
            CertificateHealth::Missing => self.missing += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckAllReport {
    pub checked_at: DateTime<Utc>,
    pub certificates: Vec<CertificateStatus>,
    pub summary: CheckSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshFailure {
    pub business_id: BusinessId,
    pub reason: String,
}

/// Outcome of [`CertificateMonitor::refresh_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub refreshed: Vec<CertificateStatus>,
    pub failures: Vec<RefreshFailure>,
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub threshold_days: i64,
    pub parse_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            threshold_days: DEFAULT_EXPIRY_THRESHOLD_DAYS,
            parse_timeout: DEFAULT_PARSE_TIMEOUT,
        }
    }
}

/// Reads certificates from a [`CertificateStore`] and records their
/// validity on the business configuration.
#[derive(Clone)]
pub struct CertificateMonitor {
    registry: Arc<ChainRegistry>,
    store: Arc<dyn CertificateStore>,
    settings: MonitorSettings,
}

impl std::fmt::Debug for CertificateMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateMonitor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CertificateMonitor {
    pub fn new(registry: Arc<ChainRegistry>, store: Arc<dyn CertificateStore>, settings: MonitorSettings) -> Self {
        Self {
            registry,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> MonitorSettings {
        self.settings
    }

    /// Classification of one business from its stored config.
    pub fn status(&self, business_id: &BusinessId, now: DateTime<Utc>) -> Result<CertificateStatus, CertError> {
        let config = self
            .registry
            .config(business_id)
            .ok_or_else(|| CertError::NotConfigured(business_id.clone()))?;
        Ok(CertificateStatus::from_config(&config, now, self.settings.threshold_days))
    }

    /// Classification of every configured business plus counts per class.
    pub fn check_all(&self, now: DateTime<Utc>) -> CheckAllReport {
        let mut summary = CheckSummary::default();
        let certificates: Vec<CertificateStatus> = self
            .registry
            .configs()
            .iter()
            .map(|config| {
                let status = CertificateStatus::from_config(config, now, self.settings.threshold_days);
                summary.bump(status.health);
                log_status(&status);
                status
            })
            .collect();
        CheckAllReport {
            checked_at: now,
            certificates,
            summary,
        }
    }

    /// Re-read a business's certificate and store its validity end.
    ///
    /// Loading and parsing run on the blocking pool under the configured
    /// timeout.
    pub async fn refresh(&self, business_id: &BusinessId) -> Result<CertificateStatus, CertError> {
        let config = self
            .registry
            .config(business_id)
            .ok_or_else(|| CertError::NotConfigured(business_id.clone()))?;
        let reference = config
            .certificate_ref
            .clone()
            .ok_or_else(|| CertError::NoCertificate(business_id.clone()))?;

        let store = Arc::clone(&self.store);
        let load_ref = reference.clone();
        let load = tokio::task::spawn_blocking(move || store.load(&load_ref));
        let material = match tokio::time::timeout(self.settings.parse_timeout, load).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join)) => return Err(CertError::Task(join.to_string())),
            Err(_) => {
                return Err(CertError::Timeout {
                    secs: self.settings.parse_timeout.as_secs(),
                })
            }
        };
        let window = parse_validity_bounded(material.blob, self.settings.parse_timeout).await?;

        let now = Utc::now();
        let updated = self
            .registry
            .store()
            .update_config(business_id, |cfg| {
                // The reference may have changed while we were parsing.
                if cfg.certificate_ref.as_deref() == Some(reference.as_str()) {
                    cfg.certificate_valid_until = Some(window.not_after);
                    cfg.certificate_checked_at = Some(now);
                }
            })
            .ok_or_else(|| CertError::NotConfigured(business_id.clone()))?;

        tracing::info!(
            business_id = %business_id,
            certificate = %reference,
            not_before = %window.not_before,
            not_after = %window.not_after,
            "certificate validity refreshed"
        );
        let status = CertificateStatus::from_config(&updated, now, self.settings.threshold_days);
        log_status(&status);
        Ok(status)
    }

    /// Refresh every business that has a certificate reference. Failures
    /// are collected per business and never abort the pass.
    pub async fn refresh_all(&self) -> RefreshReport {
        let mut refreshed = Vec::new();
        let mut failures = Vec::new();
        for config in self.registry.configs() {
            if config.certificate_ref.is_none() {
                continue;
            }
            match self.refresh(&config.business_id).await {
                Ok(status) => refreshed.push(status),
                Err(e) => {
                    tracing::warn!(
                        business_id = %config.business_id,
                        error = %e,
                        "certificate refresh failed"
                    );
                    failures.push(RefreshFailure {
                        business_id: config.business_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        RefreshReport { refreshed, failures }
    }
}

fn log_status(status: &CertificateStatus) {
    match status.health {
        CertificateHealth::Expired => tracing::warn!(
            business_id = %status.business_id,
            days = status.days_until_expiration,
            "signing certificate expired"
        ),
        CertificateHealth::ExpiringSoon => tracing::warn!(
            business_id = %status.business_id,
            days = status.days_until_expiration,
            "signing certificate expiring soon"
        ),
        CertificateHealth::Missing | CertificateHealth::Healthy => tracing::debug!(
            business_id = %status.business_id,
            health = %status.health,
            "certificate classified"
        ),
    }
}
