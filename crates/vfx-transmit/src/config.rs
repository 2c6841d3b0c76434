//! Worker and authority configuration.
//!
//! Loaded once at startup from environment variables. Unset variables fall
//! back to defaults; set but unparsable values are errors.

use std::str::FromStr;
use std::time::Duration;

use url::Url;
use vfx_chain::{Environment, RetryPolicy};
use zeroize::Zeroizing;

pub const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_AUTHORITY_URL_TESTING: &str = "https://prewww1.aeat.es/wlpl/TIKE-CONT/ws/SistemaFacturacion";
pub const DEFAULT_AUTHORITY_URL_PRODUCTION: &str = "https://www1.agenciatributaria.gob.es/wlpl/TIKE-CONT/ws/SistemaFacturacion";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

/// Parse `var` if set, otherwise return `default`.
pub fn env_or<T>(var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: var.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn env_secs(var: &str, default: Duration) -> Result<Duration, ConfigError> {
    env_or(var, default.as_secs()).map(Duration::from_secs)
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Worker tuning shared by every business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub retry: RetryPolicy,
    /// Bound on one submission call.
    pub submission_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            submission_timeout: DEFAULT_SUBMISSION_TIMEOUT,
        }
    }
}

impl WorkerSettings {
    /// Variables:
    /// - `VFX_SUBMISSION_TIMEOUT_SECS` (default: 30)
    /// - `VFX_MAX_RETRIES` (default: 3)
    /// - `VFX_BACKOFF_BASE_SECS` (default: 30)
    /// - `VFX_BACKOFF_MAX_SECS` (default: 3600)
    /// - `VFX_PROCESSING_TIMEOUT_SECS` (default: 600)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = RetryPolicy::default();
        Ok(Self {
            retry: RetryPolicy {
                max_retries: env_or("VFX_MAX_RETRIES", defaults.max_retries)?,
                backoff_base: env_secs("VFX_BACKOFF_BASE_SECS", defaults.backoff_base)?,
                backoff_max: env_secs("VFX_BACKOFF_MAX_SECS", defaults.backoff_max)?,
                processing_timeout: env_secs("VFX_PROCESSING_TIMEOUT_SECS", defaults.processing_timeout)?,
            },
            submission_timeout: env_secs("VFX_SUBMISSION_TIMEOUT_SECS", DEFAULT_SUBMISSION_TIMEOUT)?,
        })
    }
}

/// Settings of the HTTP authority adapter.
///
/// Custom `Debug` redacts the token.
#[derive(Clone)]
pub struct AuthorityConfig {
    pub testing_url: Url,
    pub production_url: Url,
    pub token: Zeroizing<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for AuthorityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityConfig")
            .field("testing_url", &self.testing_url)
            .field("production_url", &self.production_url)
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AuthorityConfig {
    /// Variables:
    /// - `VFX_AUTHORITY_TOKEN` (absent: returns `Ok(None)`, the caller
    ///   falls back to the mock adapter)
    /// - `VFX_AUTHORITY_URL_TESTING`, `VFX_AUTHORITY_URL_PRODUCTION`
    /// - `VFX_SUBMISSION_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(token) = std::env::var("VFX_AUTHORITY_TOKEN") else {
            return Ok(None);
        };
        Ok(Some(Self {
            testing_url: env_url("VFX_AUTHORITY_URL_TESTING", DEFAULT_AUTHORITY_URL_TESTING)?,
            production_url: env_url("VFX_AUTHORITY_URL_PRODUCTION", DEFAULT_AUTHORITY_URL_PRODUCTION)?,
            token: Zeroizing::new(token),
            timeout: env_secs("VFX_SUBMISSION_TIMEOUT_SECS", DEFAULT_SUBMISSION_TIMEOUT)?,
        }))
    }

    pub fn base_url(&self, environment: Environment) -> &Url {
        match environment {
            Environment::Testing => &self.testing_url,
            Environment::Production => &self.production_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_uses_default_when_unset() {
        assert_eq!(env_or("VFX_TEST_UNSET_VAR_8841", 7u32).unwrap(), 7);
    }

    #[test]
    fn env_or_rejects_garbage() {
        std::env::set_var("VFX_TEST_BAD_NUMBER_8841", "ten");
        let result = env_or("VFX_TEST_BAD_NUMBER_8841", 1u64);
        std::env::remove_var("VFX_TEST_BAD_NUMBER_8841");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn debug_redacts_token() {
        let config = AuthorityConfig {
            testing_url: Url::parse("http://127.0.0.1:9000").unwrap(),
            production_url: Url::parse("http://127.0.0.1:9001").unwrap(),
            token: Zeroizing::new("top-secret".to_string()),
            timeout: Duration::from_secs(5),
        };
        let shown = format!("{config:?}");
        assert!(!shown.contains("top-secret"));
        assert_eq!(config.base_url(Environment::Production).port(), Some(9001));
    }
}
