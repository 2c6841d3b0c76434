//! # Service Configuration
//!
//! Everything the binary reads from the environment, parsed once at
//! startup. Per-business settings are not here; they live in
//! `ComplianceConfig` and change through the admin API.
//!
//! | Variable                        | Default     |
//! |---------------------------------|-------------|
//! | `PORT`                          | 8080        |
//! | `LOG_FORMAT`                    | text (`json` for JSON lines) |
//! | `VFX_WORKER_INTERVAL_SECS`      | 60          |
//! | `VFX_CERT_CHECK_INTERVAL_SECS`  | 3600        |
//! | `VFX_CERT_THRESHOLD_DAYS`       | 30          |
//! | `VFX_CERT_DIR`                  | `./certs`   |
//! | `VFX_CERT_TIMEOUT_SECS`         | 10          |
//! | `VFX_QR_BASE_URL_TESTING`       | authority testing validator |
//! | `VFX_QR_BASE_URL_PRODUCTION`    | authority production validator |
//!
//! Worker and authority variables are documented on
//! [`WorkerSettings::from_env`] and [`AuthorityConfig::from_env`].

use std::path::PathBuf;
use std::time::Duration;

use vfx_cert::MonitorSettings;
use vfx_chain::QrSettings;
use vfx_transmit::config::env_or;
use vfx_transmit::{AuthorityConfig, ConfigError, WorkerSettings};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_WORKER_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_CERT_CHECK_INTERVAL: Duration = Duration::from_secs(3600);
pub const DEFAULT_CERT_DIR: &str = "./certs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub log_format: LogFormat,
    pub worker_interval: Duration,
    pub cert_check_interval: Duration,
    pub cert_dir: PathBuf,
    pub monitor: MonitorSettings,
    pub worker: WorkerSettings,
    /// `None` runs against the mock authority.
    pub authority: Option<AuthorityConfig>,
    pub qr: QrSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log_format: LogFormat::Text,
            worker_interval: DEFAULT_WORKER_INTERVAL,
            cert_check_interval: DEFAULT_CERT_CHECK_INTERVAL,
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
            monitor: MonitorSettings::default(),
            worker: WorkerSettings::default(),
            authority: None,
            qr: QrSettings::default(),
        }
    }
}

fn positive_secs(var: &str, default: Duration) -> Result<Duration, ConfigError> {
    let secs: u64 = env_or(var, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var: var.to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let log_format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let qr = QrSettings {
            testing_base_url: env_or("VFX_QR_BASE_URL_TESTING", defaults.qr.testing_base_url)?,
            production_base_url: env_or("VFX_QR_BASE_URL_PRODUCTION", defaults.qr.production_base_url)?,
        };
        Ok(Self {
            port: env_or("PORT", DEFAULT_PORT)?,
            log_format,
            worker_interval: positive_secs("VFX_WORKER_INTERVAL_SECS", DEFAULT_WORKER_INTERVAL)?,
            cert_check_interval: positive_secs("VFX_CERT_CHECK_INTERVAL_SECS", DEFAULT_CERT_CHECK_INTERVAL)?,
            cert_dir: env_or("VFX_CERT_DIR", defaults.cert_dir)?,
            monitor: MonitorSettings {
                threshold_days: env_or("VFX_CERT_THRESHOLD_DAYS", defaults.monitor.threshold_days)?,
                parse_timeout: positive_secs("VFX_CERT_TIMEOUT_SECS", defaults.monitor.parse_timeout)?,
            },
            worker: WorkerSettings::from_env()?,
            authority: AuthorityConfig::from_env()?,
            qr,
        })
    }
}
