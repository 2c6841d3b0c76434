//! Encoding of invoice snapshots into registration documents.
//!
//! Encoding never fails and is deterministic: the same inputs always yield
//! the same document and the same XML bytes. Missing data is carried as
//! absent elements for [`crate::validate`] to report.

use vfx_core::{normalize_legal_id, Address, InvoiceSnapshot, PartyProfile};

use crate::document::{
    AddressElement, InvoiceDocument, InvoiceElement, LineElement, PartyElement, TotalsElement,
    SCHEMA_VERSION,
};

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn party(profile: &PartyProfile) -> PartyElement {
    PartyElement {
        legal_id: normalize_legal_id(&profile.legal_id).or_else(|| non_blank(&profile.legal_id)),
        name: non_blank(&profile.name),
        address: profile.address.as_ref().map(address),
    }
}

fn address(a: &Address) -> AddressElement {
    AddressElement {
        line1: a.line1.trim().to_string(),
        line2: a.line2.as_deref().and_then(non_blank),
        city: a.city.trim().to_string(),
        postal_code: a.postal_code.trim().to_string(),
        country_code: a.country_code.trim().to_ascii_uppercase(),
    }
}

/// Encode an invoice with explicit issuer and counterparty profiles.
///
/// The profiles supply the party elements (identifier, name, address);
/// everything else comes from the snapshot.
pub fn encode(
    snapshot: &InvoiceSnapshot,
    business_profile: &PartyProfile,
    counterparty_profile: &PartyProfile,
) -> InvoiceDocument {
    let lines = snapshot
        .lines
        .iter()
        .map(|line| LineElement {
            description: non_blank(&line.description),
            quantity: Some(line.quantity.to_string()),
            unit_price: Some(line.unit_price.to_string()),
            tax_rate: Some(line.tax_rate.to_string()),
            line_total: line.line_total().map(|a| a.to_string()),
            tax_amount: line.tax_amount().map(|a| a.to_string()),
        })
        .collect();

    InvoiceDocument {
        schema_version: SCHEMA_VERSION.to_string(),
        issuer: party(business_profile),
        invoice: InvoiceElement {
            invoice_id: snapshot.invoice_id.to_string(),
            invoice_number: non_blank(&snapshot.invoice_number),
            issue_date: Some(snapshot.issue_date.format("%Y-%m-%d").to_string()),
            direction: snapshot.direction.as_str().to_string(),
            currency: non_blank(&snapshot.currency),
        },
        recipient: party(counterparty_profile),
        lines,
        totals: TotalsElement {
            subtotal: Some(snapshot.totals.subtotal.to_string()),
            tax_total: Some(snapshot.totals.tax.to_string()),
            total: Some(snapshot.totals.total.to_string()),
        },
    }
}

/// Encode using the parties recorded on the snapshot itself.
pub fn encode_snapshot(snapshot: &InvoiceSnapshot) -> InvoiceDocument {
    encode(snapshot, &snapshot.issuer, &snapshot.counterparty)
}
