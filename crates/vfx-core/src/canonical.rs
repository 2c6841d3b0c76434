//! # Canonical Serialization: JCS-Compatible Byte Production
//!
//! [`canonicalize_invoice`] turns an [`InvoiceSnapshot`] into the bytes that
//! get chained. Hashing functions accept only `&CanonicalBytes`, and the
//! inner vector is private, so every chain hash goes through the same
//! float check and `serde_jcs` (RFC 8785) pass.
//!
//! ## Invoice canonical view
//!
//! | Key | Format |
//! |-----|--------|
//! | `schema_version` | `"1"` |
//! | `issue_date` | `YYYY-MM-DD` |
//! | amounts | minor units rendered `"<units>.<2 digits>"` |
//! | `quantity` | thousandths rendered with 3 decimals |
//! | `tax_rate` | basis points rendered with 2 decimals |
//! | `legal_id` | trimmed, upper-case |
//! | other strings | trimmed |
//!
//! Addresses are presentation data and are left out of the view.

use serde::Serialize;
use serde_json::Value;

use crate::error::{CanonicalizationError, ValidationError};
use crate::identity::normalize_legal_id;
use crate::invoice::InvoiceSnapshot;

/// Version tag embedded in every canonical invoice view.
pub const CANONICAL_SCHEMA_VERSION: &str = "1";

/// JCS output of a float-free value. Built only through [`CanonicalBytes::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Fails with `FloatRejected` on any non-integer number; money and
    /// quantities must already be rendered as strings.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        Ok(Self(serde_jcs::to_string(&value)?.into_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The canonical form as UTF-8 text. JCS output is always valid UTF-8.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Number(n) if n.is_f64() => Err(CanonicalizationError::FloatRejected(n.as_f64().unwrap_or(f64::NAN))),
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Invoice canonical view
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CanonicalParty {
    legal_id: String,
    name: String,
}

#[derive(Serialize)]
struct CanonicalLine {
    description: String,
    quantity: String,
    unit_price: String,
    tax_rate: String,
    line_total: String,
    tax_amount: String,
}

#[derive(Serialize)]
struct CanonicalInvoice<'a> {
    schema_version: &'static str,
    invoice_id: &'a str,
    invoice_number: String,
    direction: &'static str,
    issue_date: String,
    currency: String,
    issuer: CanonicalParty,
    counterparty: CanonicalParty,
    lines: Vec<CanonicalLine>,
    subtotal: String,
    tax_total: String,
    total: String,
}

fn canonical_party(prefix: &str, legal_id: &str, name: &str) -> Result<CanonicalParty, ValidationError> {
    let legal_id = normalize_legal_id(legal_id).ok_or_else(|| {
        ValidationError::invalid(format!("{prefix}.legal_id"), "expected 5-20 alphanumeric characters")
    })?;
    Ok(CanonicalParty {
        legal_id,
        name: name.trim().to_string(),
    })
}

/// Deterministically serialize the legally relevant fields of an invoice.
///
/// The snapshot is validated first; an incomplete or inconsistent snapshot
/// fails with [`CanonicalizationError::InvalidSnapshot`] naming the field.
///
/// # Errors
///
/// `InvalidSnapshot` for validation failures, `SerializationFailed` if JCS
/// serialization fails.
pub fn canonicalize_invoice(snapshot: &InvoiceSnapshot) -> Result<CanonicalBytes, CanonicalizationError> {
    snapshot.validate()?;

    let mut lines = Vec::with_capacity(snapshot.lines.len());
    for (i, line) in snapshot.lines.iter().enumerate() {
        let overflow = || ValidationError::invalid(format!("lines[{i}]"), "amount overflow");
        let line_total = line.line_total().ok_or_else(overflow)?;
        let tax_amount = line.tax_amount().ok_or_else(overflow)?;
        lines.push(CanonicalLine {
            description: line.description.trim().to_string(),
            quantity: line.quantity.to_string(),
            unit_price: line.unit_price.to_string(),
            tax_rate: line.tax_rate.to_string(),
            line_total: line_total.to_string(),
            tax_amount: tax_amount.to_string(),
        });
    }

    let view = CanonicalInvoice {
        schema_version: CANONICAL_SCHEMA_VERSION,
        invoice_id: snapshot.invoice_id.as_str(),
        invoice_number: snapshot.invoice_number.trim().to_string(),
        direction: snapshot.direction.as_str(),
        issue_date: snapshot.issue_date.format("%Y-%m-%d").to_string(),
        currency: snapshot.currency.trim().to_string(),
        issuer: canonical_party("issuer", &snapshot.issuer.legal_id, &snapshot.issuer.name)?,
        counterparty: canonical_party(
            "counterparty",
            &snapshot.counterparty.legal_id,
            &snapshot.counterparty.name,
        )?,
        lines,
        subtotal: snapshot.totals.subtotal.to_string(),
        tax_total: snapshot.totals.tax.to_string(),
        total: snapshot.totals.total.to_string(),
    };
    CanonicalBytes::new(&view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::fixtures::sample_snapshot;
    use serde_json::json;

    #[test]
    fn canonical_bytes_sorted_keys() {
        let cb = CanonicalBytes::new(&json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(cb.as_str(), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn canonical_bytes_rejects_float() {
        let result = CanonicalBytes::new(&json!({"amount": 3.15}));
        assert!(matches!(result, Err(CanonicalizationError::FloatRejected(_))));
    }

    #[test]
    fn canonical_bytes_rejects_nested_float() {
        let result = CanonicalBytes::new(&json!({"lines": [{"qty": 1.5}]}));
        assert!(result.is_err());
    }

    #[test]
    fn canonical_bytes_empty_object() {
        let cb = CanonicalBytes::new(&json!({})).unwrap();
        assert_eq!(cb.as_bytes(), b"{}");
        assert_eq!(cb.len(), 2);
        assert!(!cb.is_empty());
    }

    #[test]
    fn invoice_golden_value() {
        let cb = canonicalize_invoice(&sample_snapshot()).unwrap();
        let expected = concat!(
            r#"{"counterparty":{"legal_id":"A87654321","name":"Widgets SA"},"#,
            r#""currency":"EUR","direction":"issued","#,
            r#""invoice_id":"inv-0001","invoice_number":"F2026-0001","#,
            r#""issue_date":"2026-03-14","#,
            r#""issuer":{"legal_id":"B12345678","name":"Acme Tools SL"},"#,
            r#""lines":[{"description":"Hammer","line_total":"25.00","quantity":"2.000","tax_amount":"5.25","tax_rate":"21.00","unit_price":"12.50"},"#,
            r#"{"description":"Nails (box)","line_total":"5.99","quantity":"1.500","tax_amount":"0.60","tax_rate":"10.00","unit_price":"3.99"}],"#,
            r#""schema_version":"1","subtotal":"30.99","tax_total":"5.85","total":"36.84"}"#,
        );
        assert_eq!(cb.as_str(), expected);
    }

    #[test]
    fn whitespace_and_case_normalized() {
        let mut s = sample_snapshot();
        s.issuer.legal_id = " b12345678 ".to_string();
        s.invoice_number = "  F2026-0001\t".to_string();
        s.issuer.name = "Acme Tools SL ".to_string();
        assert_eq!(
            canonicalize_invoice(&s).unwrap(),
            canonicalize_invoice(&sample_snapshot()).unwrap()
        );
    }

    #[test]
    fn address_does_not_affect_canonical_form() {
        let mut s = sample_snapshot();
        s.counterparty.address = None;
        assert_eq!(
            canonicalize_invoice(&s).unwrap(),
            canonicalize_invoice(&sample_snapshot()).unwrap()
        );
    }

    #[test]
    fn legally_relevant_change_alters_bytes() {
        let mut s = sample_snapshot();
        s.lines[0].unit_price = crate::amount::Amount::from_minor(1251);
        s.totals.subtotal = crate::amount::Amount::from_minor(3101);
        s.totals.total = crate::amount::Amount::from_minor(3686);
        assert_ne!(
            canonicalize_invoice(&s).unwrap(),
            canonicalize_invoice(&sample_snapshot()).unwrap()
        );
    }

    #[test]
    fn invalid_snapshot_names_field() {
        let mut s = sample_snapshot();
        s.counterparty.legal_id = String::new();
        match canonicalize_invoice(&s) {
            Err(CanonicalizationError::InvalidSnapshot(e)) => {
                assert_eq!(e.field(), Some("counterparty.legal_id"));
            }
            other => panic!("expected InvalidSnapshot, got {other:?}"),
        }
    }

    #[test]
    fn blank_address_city_refused_before_hashing() {
        let mut s = sample_snapshot();
        if let Some(address) = s.counterparty.address.as_mut() {
            address.city = String::new();
        }
        match canonicalize_invoice(&s) {
            Err(CanonicalizationError::InvalidSnapshot(e)) => {
                assert_eq!(e.field(), Some("counterparty.address.city"));
            }
            other => panic!("expected InvalidSnapshot, got {other:?}"),
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn json_value_no_floats() -> impl Strategy<Value = serde_json::Value> {
            let leaf = prop_oneof![
                Just(serde_json::Value::Null),
                any::<bool>().prop_map(serde_json::Value::Bool),
                any::<i64>().prop_map(|n| serde_json::Value::Number(n.into())),
                "[a-zA-Z0-9 ]{0,20}".prop_map(serde_json::Value::String),
            ];
            leaf.prop_recursive(3, 24, 6, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..6).prop_map(serde_json::Value::Array),
                    prop::collection::btree_map("[a-z]{1,6}", inner, 0..6).prop_map(|m| {
                        serde_json::Value::Object(m.into_iter().collect())
                    }),
                ]
            })
        }

        proptest! {
            #[test]
            fn canonicalization_is_deterministic(value in json_value_no_floats()) {
                let a = CanonicalBytes::new(&value).unwrap();
                let b = CanonicalBytes::new(&value.clone()).unwrap();
                prop_assert_eq!(a, b);
            }

            #[test]
            fn canonicalization_is_idempotent(value in json_value_no_floats()) {
                let once = CanonicalBytes::new(&value).unwrap();
                let reparsed: serde_json::Value = serde_json::from_slice(once.as_bytes()).unwrap();
                let twice = CanonicalBytes::new(&reparsed).unwrap();
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn invoice_canonical_form_ignores_padding(pad in "[ \t]{0,4}") {
                let mut s = sample_snapshot();
                s.counterparty.name = format!("{pad}Widgets SA{pad}");
                prop_assert_eq!(
                    canonicalize_invoice(&s).unwrap(),
                    canonicalize_invoice(&sample_snapshot()).unwrap()
                );
            }
        }
    }
}
