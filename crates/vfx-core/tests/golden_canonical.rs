//! Golden values for the canonical invoice form and the first chain link.
//!
//! These bytes are a legal artifact: if this test fails, previously stored
//! chains no longer verify.

use vfx_core::{canonicalize_invoice, chain_digest, ChainHash, InvoiceSnapshot};

fn snapshot_from_json() -> InvoiceSnapshot {
    // Field order and padding deliberately differ from the canonical form.
    serde_json::from_value(serde_json::json!({
        "totals": {"total": "36.84", "tax": "5.85", "subtotal": "30.99"},
        "lines": [
            {"unit_price": "12.5", "tax_rate": "21", "quantity": "2", "description": "Hammer"},
            {"description": " Nails (box) ", "quantity": "1.5", "unit_price": "3.99", "tax_rate": "10"}
        ],
        "counterparty": {
            "name": "Widgets SA",
            "legal_id": "a87654321",
            "address": {"line1": "Calle Mayor 1", "city": "Madrid", "postal_code": "28013", "country_code": "ES"}
        },
        "issuer": {"legal_id": "B12345678", "name": "Acme Tools SL"},
        "currency": "EUR",
        "issue_date": "2026-03-14",
        "direction": "issued",
        "invoice_number": "F2026-0001",
        "invoice_id": "inv-0001"
    }))
    .expect("fixture deserializes")
}

#[test]
fn canonical_form_is_stable() {
    let bytes = canonicalize_invoice(&snapshot_from_json()).unwrap();
    assert_eq!(
        bytes.as_str(),
        "{\"counterparty\":{\"legal_id\":\"A87654321\",\"name\":\"Widgets SA\"},\
         \"currency\":\"EUR\",\"direction\":\"issued\",\"invoice_id\":\"inv-0001\",\
         \"invoice_number\":\"F2026-0001\",\"issue_date\":\"2026-03-14\",\
         \"issuer\":{\"legal_id\":\"B12345678\",\"name\":\"Acme Tools SL\"},\
         \"lines\":[{\"description\":\"Hammer\",\"line_total\":\"25.00\",\"quantity\":\"2.000\",\
         \"tax_amount\":\"5.25\",\"tax_rate\":\"21.00\",\"unit_price\":\"12.50\"},\
         {\"description\":\"Nails (box)\",\"line_total\":\"5.99\",\"quantity\":\"1.500\",\
         \"tax_amount\":\"0.60\",\"tax_rate\":\"10.00\",\"unit_price\":\"3.99\"}],\
         \"schema_version\":\"1\",\"subtotal\":\"30.99\",\"tax_total\":\"5.85\",\"total\":\"36.84\"}"
    );
}

#[test]
fn first_link_hash_is_stable() {
    let bytes = canonicalize_invoice(&snapshot_from_json()).unwrap();
    let hash = chain_digest(&ChainHash::genesis(), &bytes);
    assert_eq!(
        hash.as_str(),
        "6fa3f24e422be7e01f055947ef0b0291d66545f66beda92cd7564e1fd9138255"
    );
}
