//! # Verification QR Payload
//!
//! Builds the URL printed as a QR code on every registered invoice. Scanning
//! it lets the recipient check the registration with the tax authority:
//!
//! ```text
//! <base>?nif=<issuer>&numserie=<number>&fecha=<DD-MM-YYYY>&importe=<total>&huella=<fragment>
//! ```
//!
//! `huella` is the first [`QR_HASH_FRAGMENT_LEN`] hex characters of the
//! record's chain hash, upper-cased. The image itself is rendered elsewhere;
//! this module only names it (`qr/<sha256>.png`).

use serde::{Deserialize, Serialize};
use url::Url;
use vfx_core::{normalize_legal_id, sha256_digest, CanonicalBytes, ChainHash, InvoiceSnapshot};

use crate::record::Environment;

/// Number of chain-hash characters embedded in the QR payload.
pub const QR_HASH_FRAGMENT_LEN: usize = 16;

pub const DEFAULT_QR_BASE_URL_TESTING: &str = "https://prewww2.aeat.es/wlpl/TIKE-CONT/ValidarQR";
pub const DEFAULT_QR_BASE_URL_PRODUCTION: &str = "https://www2.agenciatributaria.gob.es/wlpl/TIKE-CONT/ValidarQR";

/// Per-environment verification endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrSettings {
    pub testing_base_url: String,
    pub production_base_url: String,
}

impl Default for QrSettings {
    fn default() -> Self {
        Self {
            testing_base_url: DEFAULT_QR_BASE_URL_TESTING.to_string(),
            production_base_url: DEFAULT_QR_BASE_URL_PRODUCTION.to_string(),
        }
    }
}

impl QrSettings {
    pub fn base_url(&self, environment: Environment) -> &str {
        match environment {
            Environment::Testing => &self.testing_base_url,
            Environment::Production => &self.production_base_url,
        }
    }
}

/// QR payload and the reference under which its image is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCode {
    pub payload: String,
    pub image_ref: String,
}

/// Errors building a QR payload.
#[derive(thiserror::Error, Debug)]
pub enum QrError {
    #[error("invalid QR base URL \"{url}\": {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("canonicalization of QR payload failed: {0}")]
    Canonicalization(#[from] vfx_core::CanonicalizationError),
}

/// Build the QR payload for a registered invoice.
pub fn build_qr(base_url: &str, snapshot: &InvoiceSnapshot, current_hash: &ChainHash) -> Result<QrCode, QrError> {
    let nif = normalize_legal_id(&snapshot.issuer.legal_id)
        .unwrap_or_else(|| snapshot.issuer.legal_id.trim().to_string());
    let fecha = snapshot.issue_date.format("%d-%m-%Y").to_string();
    let importe = snapshot.totals.total.to_string();
    let huella = current_hash.fragment(QR_HASH_FRAGMENT_LEN);

    let url = Url::parse_with_params(
        base_url,
        &[
            ("nif", nif.as_str()),
            ("numserie", snapshot.invoice_number.trim()),
            ("fecha", fecha.as_str()),
            ("importe", importe.as_str()),
            ("huella", huella.as_str()),
        ],
    )
    .map_err(|source| QrError::InvalidBaseUrl {
        url: base_url.to_string(),
        source,
    })?;

    let payload = url.to_string();
    let digest = sha256_digest(&CanonicalBytes::new(&payload)?);
    Ok(QrCode {
        image_ref: format!("qr/{}.png", digest.to_hex()),
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use vfx_core::{Amount, InvoiceDirection, InvoiceId, InvoiceTotals, PartyProfile};

    fn snapshot() -> InvoiceSnapshot {
        InvoiceSnapshot {
            invoice_id: InvoiceId::new("inv-1").unwrap(),
            invoice_number: "F 2026/7".to_string(),
            direction: InvoiceDirection::Issued,
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            currency: "EUR".to_string(),
            issuer: PartyProfile {
                legal_id: "b12345678".to_string(),
                name: "Acme".to_string(),
                address: None,
            },
            counterparty: PartyProfile::default(),
            lines: Vec::new(),
            totals: InvoiceTotals {
                subtotal: Amount::from_minor(10000),
                tax: Amount::from_minor(2100),
                total: Amount::from_minor(12100),
            },
        }
    }

    fn hash() -> ChainHash {
        ChainHash::from_hex(&format!("{}{}", "ab12cd34ef56ab78", "0".repeat(48))).unwrap()
    }

    #[test]
    fn payload_contains_all_parameters() {
        let qr = build_qr("https://verify.example/qr", &snapshot(), &hash()).unwrap();
        assert_eq!(
            qr.payload,
            "https://verify.example/qr?nif=B12345678&numserie=F+2026%2F7&fecha=04-03-2026&importe=121.00&huella=AB12CD34EF56AB78"
        );
    }

    #[test]
    fn image_ref_is_content_addressed() {
        let a = build_qr("https://verify.example/qr", &snapshot(), &hash()).unwrap();
        let b = build_qr("https://verify.example/qr", &snapshot(), &hash()).unwrap();
        assert_eq!(a.image_ref, b.image_ref);
        assert!(a.image_ref.starts_with("qr/"));
        assert!(a.image_ref.ends_with(".png"));
        assert_eq!(a.image_ref.len(), "qr/".len() + 64 + ".png".len());
    }

    #[test]
    fn invalid_base_url_is_reported() {
        assert!(matches!(
            build_qr("not a url", &snapshot(), &hash()),
            Err(QrError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn settings_select_environment() {
        let s = QrSettings::default();
        assert_eq!(s.base_url(Environment::Testing), DEFAULT_QR_BASE_URL_TESTING);
        assert_eq!(s.base_url(Environment::Production), DEFAULT_QR_BASE_URL_PRODUCTION);
    }
}
