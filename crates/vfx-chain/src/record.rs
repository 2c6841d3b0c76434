//! # Chain Records and Compliance Configuration
//!
//! [`ChainRecord`] is one hash-linked registration per invoice. Its identity
//! and chain fields are fixed at creation; only the embedded
//! [`TransmissionState`] changes afterwards, and only through
//! [`crate::transmission::transition`].
//!
//! [`ComplianceConfig`] holds the per-business settings plus the
//! `last_sequence_number` cache, which the store keeps equal to the highest
//! stored sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vfx_core::{BusinessId, ChainHash, InvoiceDirection, InvoiceId, ValidationError};

use crate::transmission::TransmissionState;

// ---------------------------------------------------------------------------
// TransmissionStatus
// ---------------------------------------------------------------------------

/// Submission lifecycle status of a chain record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionStatus {
    /// Waiting to be submitted.
    Pending,
    /// Claimed by a worker; submission in flight.
    Processing,
    /// Accepted by the tax authority.
    Sent,
    /// Failed permanently until requeued by an operator.
    Error,
}

impl TransmissionStatus {
    pub const ALL: [TransmissionStatus; 4] = [Self::Pending, Self::Processing, Self::Sent, Self::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Sent => "sent",
            Self::Error => "error",
        }
    }

    /// `Sent` never changes again. `Error` only changes through a requeue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Error)
    }
}

impl std::fmt::Display for TransmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransmissionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::invalid("status", format!("unknown status \"{s}\"")))
    }
}

// ---------------------------------------------------------------------------
// ChainRecord
// ---------------------------------------------------------------------------

/// One link of a business's invoice chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRecord {
    pub id: Uuid,
    pub business_id: BusinessId,
    pub invoice_id: InvoiceId,
    pub invoice_direction: InvoiceDirection,
    /// Strictly increasing per business, starting at 1, no gaps.
    pub sequence_number: u64,
    pub previous_hash: ChainHash,
    pub current_hash: ChainHash,
    pub qr_payload: String,
    pub qr_image_ref: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub transmission: TransmissionState,
}

impl ChainRecord {
    pub fn status(&self) -> TransmissionStatus {
        self.transmission.status
    }

    /// `business#sequence`, for logs and error messages.
    pub fn label(&self) -> String {
        format!("{}#{}", self.business_id, self.sequence_number)
    }
}

// ---------------------------------------------------------------------------
// ComplianceConfig
// ---------------------------------------------------------------------------

/// How records of a business are made legally verifiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceMode {
    /// Records are submitted to the tax authority.
    #[default]
    Verifactu,
    /// Records are retained locally and never submitted.
    SelfVerifiable,
}

impl ComplianceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verifactu => "verifactu",
            Self::SelfVerifiable => "self_verifiable",
        }
    }
}

/// Tax-authority environment a business reports to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Testing,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default minimum spacing between submissions for one business.
pub const DEFAULT_FLOW_CONTROL_INTERVAL_SECS: u64 = 60;
/// Default and maximum number of records selected per worker run.
pub const DEFAULT_MAX_RECORDS_PER_BATCH: u32 = 1000;

/// Per-business compliance settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceConfig {
    pub business_id: BusinessId,
    pub enabled: bool,
    pub mode: ComplianceMode,
    pub environment: Environment,
    /// Name of the signing certificate in the certificate store.
    pub certificate_ref: Option<String>,
    pub certificate_valid_until: Option<DateTime<Utc>>,
    pub certificate_checked_at: Option<DateTime<Utc>>,
    /// Cache of the highest stored sequence number. Maintained by the store.
    pub last_sequence_number: u64,
    pub flow_control_interval_seconds: u64,
    pub max_records_per_batch: u32,
    pub auto_submit: bool,
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl ComplianceConfig {
    /// A disabled configuration with default settings.
    pub fn new(business_id: BusinessId) -> Self {
        Self {
            business_id,
            enabled: false,
            mode: ComplianceMode::default(),
            environment: Environment::default(),
            certificate_ref: None,
            certificate_valid_until: None,
            certificate_checked_at: None,
            last_sequence_number: 0,
            flow_control_interval_seconds: DEFAULT_FLOW_CONTROL_INTERVAL_SECS,
            max_records_per_batch: DEFAULT_MAX_RECORDS_PER_BATCH,
            auto_submit: true,
            last_processed_at: None,
        }
    }

    /// Whether the worker should submit this business's records.
    pub fn submits(&self) -> bool {
        self.enabled && self.mode == ComplianceMode::Verifactu
    }

    /// Apply an update, validating the resulting settings.
    pub fn apply(&mut self, update: ConfigUpdate) -> Result<(), ValidationError> {
        if let Some(batch) = update.max_records_per_batch {
            if batch == 0 || batch > DEFAULT_MAX_RECORDS_PER_BATCH {
                return Err(ValidationError::invalid(
                    "max_records_per_batch",
                    format!("must be between 1 and {DEFAULT_MAX_RECORDS_PER_BATCH}"),
                ));
            }
        }
        if let Some(Some(cert)) = &update.certificate_ref {
            let ok = !cert.is_empty()
                && !cert.contains("..")
                && cert
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
            if !ok {
                return Err(ValidationError::invalid(
                    "certificate_ref",
                    "expected a file name from [A-Za-z0-9._-]",
                ));
            }
        }

        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(environment) = update.environment {
            self.environment = environment;
        }
        if let Some(cert) = update.certificate_ref {
            if cert != self.certificate_ref {
                // A new certificate invalidates the known validity window.
                self.certificate_valid_until = None;
                self.certificate_checked_at = None;
            }
            self.certificate_ref = cert;
        }
        if let Some(valid_until) = update.certificate_valid_until {
            self.certificate_valid_until = Some(valid_until);
        }
        if let Some(interval) = update.flow_control_interval_seconds {
            self.flow_control_interval_seconds = interval;
        }
        if let Some(batch) = update.max_records_per_batch {
            self.max_records_per_batch = batch;
        }
        if let Some(auto_submit) = update.auto_submit {
            self.auto_submit = auto_submit;
        }
        Ok(())
    }
}

/// Partial update of a [`ComplianceConfig`]. Absent fields are left unchanged.
///
/// `certificate_ref: Some(None)` clears the certificate reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub mode: Option<ComplianceMode>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default, with = "double_option")]
    pub certificate_ref: Option<Option<String>>,
    /// Manually recorded validity end, for certificates the service cannot read.
    #[serde(default)]
    pub certificate_valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub flow_control_interval_seconds: Option<u64>,
    #[serde(default)]
    pub max_records_per_batch: Option<u32>,
    #[serde(default)]
    pub auto_submit: Option<bool>,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Option<String>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<String>>, D::Error> {
        Option::<String>::deserialize(d).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn biz() -> BusinessId {
        BusinessId::new("acme").unwrap()
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in TransmissionStatus::ALL {
            assert_eq!(status.as_str().parse::<TransmissionStatus>().unwrap(), status);
        }
        assert!("done".parse::<TransmissionStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TransmissionStatus::Sent.is_terminal());
        assert!(TransmissionStatus::Error.is_terminal());
        assert!(!TransmissionStatus::Pending.is_terminal());
        assert!(!TransmissionStatus::Processing.is_terminal());
    }

    #[test]
    fn config_defaults() {
        let c = ComplianceConfig::new(biz());
        assert!(!c.enabled);
        assert_eq!(c.mode, ComplianceMode::Verifactu);
        assert_eq!(c.environment, Environment::Testing);
        assert_eq!(c.flow_control_interval_seconds, 60);
        assert_eq!(c.max_records_per_batch, 1000);
        assert!(c.auto_submit);
        assert_eq!(c.last_sequence_number, 0);
    }

    #[test]
    fn apply_partial_update() {
        let mut c = ComplianceConfig::new(biz());
        c.apply(ConfigUpdate {
            enabled: Some(true),
            max_records_per_batch: Some(50),
            ..Default::default()
        })
        .unwrap();
        assert!(c.enabled);
        assert_eq!(c.max_records_per_batch, 50);
        assert!(c.auto_submit);
        assert!(c.submits());
    }

    #[test]
    fn self_verifiable_does_not_submit() {
        let mut c = ComplianceConfig::new(biz());
        c.enabled = true;
        c.mode = ComplianceMode::SelfVerifiable;
        assert!(!c.submits());
    }

    #[test]
    fn apply_rejects_zero_batch() {
        let mut c = ComplianceConfig::new(biz());
        let err = c
            .apply(ConfigUpdate {
                max_records_per_batch: Some(0),
                enabled: Some(true),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.field(), Some("max_records_per_batch"));
        assert!(!c.enabled, "rejected update must not partially apply");
    }

    #[test]
    fn apply_rejects_path_traversal_certificate_ref() {
        let mut c = ComplianceConfig::new(biz());
        let err = c
            .apply(ConfigUpdate {
                certificate_ref: Some(Some("../etc/passwd".to_string())),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.field(), Some("certificate_ref"));
    }

    #[test]
    fn changing_certificate_resets_validity() {
        let mut c = ComplianceConfig::new(biz());
        c.certificate_ref = Some("old.pem".to_string());
        c.certificate_valid_until = Some(Utc::now());
        c.apply(ConfigUpdate {
            certificate_ref: Some(Some("new.pem".to_string())),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(c.certificate_ref.as_deref(), Some("new.pem"));
        assert!(c.certificate_valid_until.is_none());
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let absent: ConfigUpdate = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.certificate_ref, None);
        let cleared: ConfigUpdate = serde_json::from_str(r#"{"certificate_ref":null}"#).unwrap();
        assert_eq!(cleared.certificate_ref, Some(None));
        let set: ConfigUpdate = serde_json::from_str(r#"{"certificate_ref":"a.pem"}"#).unwrap();
        assert_eq!(set.certificate_ref, Some(Some("a.pem".to_string())));
    }
}
