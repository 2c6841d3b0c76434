//! # Document Validation
//!
//! Structural checks run before any external release of a document
//! (download or submission):
//!
//! 1. **Presence**: every required element is present and non-blank.
//! 2. **Format**: identifiers, dates, currency codes, and decimals follow
//!    their fixed formats (amounts 2 decimals, quantities 3, rates 2).
//! 3. **Consistency**: each line's total and tax match quantity × price and
//!    rate within one minor unit; the line sums match the declared subtotal
//!    and tax within one minor unit per line; and subtotal + tax equals the
//!    total exactly.
//!
//! Errors carry the element path, e.g. `Recipient/LegalId` or
//! `Lines/Line[2]/UnitPrice` (lines are numbered from 1).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use vfx_core::amount::{line_total, parse_fixed, tax_amount};
use vfx_core::{normalize_legal_id, Amount, Quantity, TaxRate, ROUNDING_TOLERANCE_PER_LINE};

use crate::document::{InvoiceDocument, PartyElement, SCHEMA_VERSION};

/// One validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Result of validating a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    /// Whether any error refers to `path`.
    pub fn has_error_at(&self, path: &str) -> bool {
        self.errors.iter().any(|e| e.path == path)
    }

    /// All errors joined into one line, for status fields and logs.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Default)]
struct Collector {
    errors: Vec<FieldError>,
}

impl Collector {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Report a missing element and return the present, non-blank value.
    fn require<'a>(&mut self, path: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.push(path, "required element is missing");
                None
            }
        }
    }

    fn decimal(&mut self, path: &str, value: Option<&str>, scale: u32) -> Option<i64> {
        let raw = self.require(path, value)?;
        let well_formed = raw
            .split_once('.')
            .is_some_and(|(_, frac)| frac.len() == scale as usize);
        match parse_fixed(raw, scale) {
            Ok(v) if well_formed => Some(v),
            _ => {
                self.push(path, format!("expected a decimal with exactly {scale} fractional digits"));
                None
            }
        }
    }
}

fn validate_party(c: &mut Collector, tag: &str, party: &PartyElement) {
    let path = format!("{tag}/LegalId");
    if let Some(id) = c.require(&path, party.legal_id.as_deref()) {
        if normalize_legal_id(id).as_deref() != Some(id) {
            c.push(&path, "expected 5-20 upper-case alphanumeric characters");
        }
    }
    c.require(&format!("{tag}/Name"), party.name.as_deref());
    if let Some(address) = &party.address {
        let a = format!("{tag}/Address");
        c.require(&format!("{a}/Line1"), Some(&address.line1));
        c.require(&format!("{a}/City"), Some(&address.city));
        c.require(&format!("{a}/PostalCode"), Some(&address.postal_code));
        let cc = address.country_code.as_str();
        if cc.len() != 2 || !cc.bytes().all(|b| b.is_ascii_uppercase()) {
            c.push(format!("{a}/CountryCode"), "expected an ISO 3166-1 alpha-2 code");
        }
    }
}

/// Validate a registration document.
pub fn validate(doc: &InvoiceDocument) -> ValidationReport {
    let mut c = Collector::default();

    if doc.schema_version != SCHEMA_VERSION {
        c.push(
            "@SchemaVersion",
            format!("expected {SCHEMA_VERSION}, found {}", doc.schema_version),
        );
    }

    validate_party(&mut c, "Issuer", &doc.issuer);
    validate_party(&mut c, "Recipient", &doc.recipient);

    c.require("Invoice/InvoiceId", Some(&doc.invoice.invoice_id));
    c.require("Invoice/InvoiceNumber", doc.invoice.invoice_number.as_deref());
    if let Some(date) = c.require("Invoice/IssueDate", doc.invoice.issue_date.as_deref()) {
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() || date.len() != 10 {
            c.push("Invoice/IssueDate", "expected a date formatted YYYY-MM-DD");
        }
    }
    if !matches!(doc.invoice.direction.as_str(), "issued" | "received") {
        c.push("Invoice/Direction", "expected issued or received");
    }
    if let Some(cur) = c.require("Invoice/Currency", doc.invoice.currency.as_deref()) {
        if cur.len() != 3 || !cur.bytes().all(|b| b.is_ascii_uppercase()) {
            c.push("Invoice/Currency", "expected a 3-letter ISO 4217 code");
        }
    }

    if doc.lines.is_empty() {
        c.push("Lines", "at least one line is required");
    }

    // Line sums; `None` once any line value is unusable.
    let mut sums: Option<(Amount, Amount)> = Some((Amount::ZERO, Amount::ZERO));
    for (i, line) in doc.lines.iter().enumerate() {
        let p = format!("Lines/Line[{}]", i + 1);
        c.require(&format!("{p}/Description"), line.description.as_deref());
        let qty = c.decimal(&format!("{p}/Quantity"), line.quantity.as_deref(), 3);
        let price = c.decimal(&format!("{p}/UnitPrice"), line.unit_price.as_deref(), 2);
        let rate = c.decimal(&format!("{p}/TaxRate"), line.tax_rate.as_deref(), 2);
        let total = c.decimal(&format!("{p}/LineTotal"), line.line_total.as_deref(), 2);
        let tax = c.decimal(&format!("{p}/TaxAmount"), line.tax_amount.as_deref(), 2);

        if qty == Some(0) {
            c.push(format!("{p}/Quantity"), "must be non-zero");
        }
        if let Some(r) = rate {
            if !(0..=10_000).contains(&r) {
                c.push(format!("{p}/TaxRate"), "must be between 0.00 and 100.00");
            }
        }

        if let (Some(q), Some(pr), Some(t)) = (qty, price, total) {
            let expected = line_total(Quantity::from_milli(q), Amount::from_minor(pr));
            if expected.map_or(true, |e| e.abs_diff(Amount::from_minor(t)) > ROUNDING_TOLERANCE_PER_LINE) {
                c.push(format!("{p}/LineTotal"), "does not equal quantity × unit price");
            }
        }
        if let (Some(t), Some(r), Some(x)) = (total, rate, tax) {
            let expected = tax_amount(Amount::from_minor(t), TaxRate::from_basis_points(r));
            if expected.map_or(true, |e| e.abs_diff(Amount::from_minor(x)) > ROUNDING_TOLERANCE_PER_LINE) {
                c.push(format!("{p}/TaxAmount"), "does not equal line total × tax rate");
            }
        }

        sums = match (sums, total, tax) {
            (Some((s, x)), Some(t), Some(tx)) => s
                .checked_add(Amount::from_minor(t))
                .zip(x.checked_add(Amount::from_minor(tx))),
            _ => None,
        };
    }

    let subtotal = c.decimal("Totals/Subtotal", doc.totals.subtotal.as_deref(), 2);
    let tax_total = c.decimal("Totals/TaxTotal", doc.totals.tax_total.as_deref(), 2);
    let total = c.decimal("Totals/Total", doc.totals.total.as_deref(), 2);

    if let Some((line_sum, tax_sum)) = sums.filter(|_| !doc.lines.is_empty()) {
        let tolerance = ROUNDING_TOLERANCE_PER_LINE * doc.lines.len() as u64;
        if let Some(s) = subtotal {
            if Amount::from_minor(s).abs_diff(line_sum) > tolerance {
                c.push(
                    "Totals/Subtotal",
                    format!("declared {} but lines sum to {line_sum}", Amount::from_minor(s)),
                );
            }
        }
        if let Some(t) = tax_total {
            if Amount::from_minor(t).abs_diff(tax_sum) > tolerance {
                c.push(
                    "Totals/TaxTotal",
                    format!("declared {} but line taxes sum to {tax_sum}", Amount::from_minor(t)),
                );
            }
        }
    }
    if let (Some(s), Some(t), Some(g)) = (subtotal, tax_total, total) {
        if s.checked_add(t) != Some(g) {
            c.push("Totals/Total", "does not equal subtotal + tax total");
        }
    }

    ValidationReport {
        valid: c.errors.is_empty(),
        errors: c.errors,
    }
}
