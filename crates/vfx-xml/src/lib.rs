//! # vfx-xml: Registration XML Codec
//!
//! Renders invoice snapshots into the standardized registration document
//! and checks documents before release.
//!
//! - [`encode`] / [`encode_snapshot`]: snapshot → [`InvoiceDocument`]
//!   (infallible, deterministic).
//! - [`validate`]: presence, format, and total consistency, reported per
//!   element path.
//! - [`encode_envelope`]: batch of validated documents plus chain data for
//!   submission.
//!
//! A document that fails validation must not leave the process, whether as
//! a download or a submission.

pub mod codec;
pub mod document;
pub mod envelope;
pub mod validate;

pub use codec::{encode, encode_snapshot};
pub use document::{
    xml_escape, AddressElement, InvoiceDocument, InvoiceElement, LineElement, PartyElement,
    TotalsElement, CONTENT_TYPE, SCHEMA_VERSION, XML_NAMESPACE,
};
pub use envelope::{encode_envelope, EnvelopeEntry, EnvelopeError, EnvelopeHeader};
pub use validate::{validate, FieldError, ValidationReport};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use vfx_core::{
        Address, Amount, InvoiceDirection, InvoiceId, InvoiceLine, InvoiceSnapshot, InvoiceTotals,
        PartyProfile, Quantity, TaxRate,
    };

    pub fn sample_snapshot() -> InvoiceSnapshot {
        InvoiceSnapshot {
            invoice_id: InvoiceId::new("inv-0001").unwrap(),
            invoice_number: "F2026-0001".to_string(),
            direction: InvoiceDirection::Issued,
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            currency: "EUR".to_string(),
            issuer: PartyProfile {
                legal_id: "B12345678".to_string(),
                name: "Acme Tools SL".to_string(),
                address: None,
            },
            counterparty: PartyProfile {
                legal_id: "A87654321".to_string(),
                name: "Widgets SA".to_string(),
                address: Some(Address {
                    line1: "Calle Mayor 1".to_string(),
                    line2: None,
                    city: "Madrid".to_string(),
                    postal_code: "28013".to_string(),
                    country_code: "ES".to_string(),
                }),
            },
            lines: vec![
                InvoiceLine {
                    description: "Hammer".to_string(),
                    quantity: Quantity::units(2),
                    unit_price: Amount::from_minor(1250),
                    tax_rate: TaxRate::from_basis_points(2100),
                },
                InvoiceLine {
                    description: "Nails (box)".to_string(),
                    quantity: Quantity::from_milli(1500),
                    unit_price: Amount::from_minor(399),
                    tax_rate: TaxRate::from_basis_points(1000),
                },
            ],
            totals: InvoiceTotals {
                subtotal: Amount::from_minor(3099),
                tax: Amount::from_minor(585),
                total: Amount::from_minor(3684),
            },
        }
    }
}
