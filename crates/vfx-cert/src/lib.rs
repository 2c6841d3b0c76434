//! # vfx-cert: Certificate Lifecycle Monitor
//!
//! Tracks the validity of each business's signing certificate and decides
//! whether it blocks submission. An expired or missing certificate stops
//! the transmission worker for that business only; invoice registration is
//! never affected.
//!
//! - [`window`]: X.509 (PEM or DER) validity parsing, bounded by a timeout.
//! - [`store`]: the [`CertificateStore`] seam and its filesystem
//!   implementation.
//! - [`monitor`]: classification, batch checks, and refresh.

pub mod error;
pub mod monitor;
pub mod store;
pub mod window;

pub use error::CertError;
pub use monitor::{
    classify, days_until_expiration, CertificateHealth, CertificateMonitor, CertificateStatus,
    CheckAllReport, CheckSummary, MonitorSettings, RefreshFailure, RefreshReport,
    DEFAULT_EXPIRY_THRESHOLD_DAYS, DEFAULT_PARSE_TIMEOUT,
};
pub use store::{CertificateMaterial, CertificateStore, FsCertificateStore};
pub use window::{parse_validity, parse_validity_bounded, ValidityWindow};
