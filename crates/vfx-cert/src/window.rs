//! X.509 validity window extraction.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use x509_parser::certificate::X509Certificate;
use x509_parser::pem::parse_x509_pem;

use crate::error::CertError;

/// `notBefore` / `notAfter` of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl ValidityWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, CertError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| CertError::Parse(format!("validity timestamp {secs} out of range")))
}

fn window_of(cert: &X509Certificate<'_>) -> Result<ValidityWindow, CertError> {
    let validity = cert.validity();
    Ok(ValidityWindow {
        not_before: timestamp(validity.not_before.timestamp())?,
        not_after: timestamp(validity.not_after.timestamp())?,
    })
}

/// Parse the validity window of a PEM or DER certificate.
///
/// PEM is detected by its armor line; anything else is treated as DER.
pub fn parse_validity(blob: &[u8]) -> Result<ValidityWindow, CertError> {
    if blob.windows(11).any(|w| w == b"-----BEGIN ") {
        let (_, pem) = parse_x509_pem(blob).map_err(|e| CertError::Parse(format!("PEM: {e}")))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| CertError::Parse(format!("X.509: {e}")))?;
        window_of(&cert)
    } else {
        let (_, cert) = x509_parser::parse_x509_certificate(blob)
            .map_err(|e| CertError::Parse(format!("DER: {e}")))?;
        window_of(&cert)
    }
}

/// [`parse_validity`] on the blocking pool, abandoned after `limit`.
pub async fn parse_validity_bounded(blob: Vec<u8>, limit: Duration) -> Result<ValidityWindow, CertError> {
    let task = tokio::task::spawn_blocking(move || parse_validity(&blob));
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(CertError::Task(join.to_string())),
        Err(_) => Err(CertError::Timeout {
            secs: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod test_certs {
    use rcgen::{date_time_ymd, CertificateParams, KeyPair};

    /// Self-signed certificate valid between the two dates, as (PEM, DER).
    pub fn self_signed(from: (i32, u8, u8), until: (i32, u8, u8)) -> (String, Vec<u8>) {
        let mut params = CertificateParams::new(vec!["vfx.test".to_string()]).unwrap();
        params.not_before = date_time_ymd(from.0, from.1, from.2);
        params.not_after = date_time_ymd(until.0, until.1, until.2);
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        (cert.pem(), cert.der().to_vec())
    }
}
