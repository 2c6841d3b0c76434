//! # Invoice Snapshot
//!
//! The single, read-only representation of an invoice consumed by the chain
//! registry, the XML codec, and the transmission worker. It is produced by
//! the invoicing module and never mutated here.
//!
//! [`InvoiceSnapshot::validate`] is the boundary check: every downstream
//! component may assume a validated snapshot has all legally required fields
//! and internally consistent totals.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::amount::{self, Amount, Quantity, TaxRate};
use crate::error::ValidationError;
use crate::identity::{normalize_legal_id, InvoiceId};

/// Whether the invoice was issued by the business or received from a supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceDirection {
    /// Issued by the business (sales invoice).
    Issued,
    /// Received by the business (purchase invoice).
    Received,
}

impl InvoiceDirection {
    /// Wire and storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Received => "received",
        }
    }
}

impl std::fmt::Display for InvoiceDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issued" => Ok(Self::Issued),
            "received" => Ok(Self::Received),
            other => Err(ValidationError::invalid(
                "direction",
                format!("unknown direction \"{other}\""),
            )),
        }
    }
}

/// Postal address. Presentation data only; not part of the hashed form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2.
    pub country_code: String,
}

/// A party to the invoice: the issuing business or its counterparty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyProfile {
    /// Tax identifier (NIF / VAT number). Normalized at canonicalization.
    #[serde(default)]
    pub legal_id: String,
    /// Registered legal name.
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// One invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: Quantity,
    pub unit_price: Amount,
    pub tax_rate: TaxRate,
}

impl InvoiceLine {
    /// `quantity × unit_price`, rounded to the cent.
    pub fn line_total(&self) -> Option<Amount> {
        amount::line_total(self.quantity, self.unit_price)
    }

    /// Tax on [`Self::line_total`] at the line's rate.
    pub fn tax_amount(&self) -> Option<Amount> {
        self.line_total()
            .and_then(|base| amount::tax_amount(base, self.tax_rate))
    }
}

/// Declared totals, as computed by the invoicing module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Amount,
    pub tax: Amount,
    pub total: Amount,
}

/// Maximum tolerated difference, in minor units per line, between declared
/// totals and the sum of line-derived values.
pub const ROUNDING_TOLERANCE_PER_LINE: u64 = 1;

/// Immutable view of an invoice at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub direction: InvoiceDirection,
    pub issue_date: NaiveDate,
    /// ISO 4217 code.
    pub currency: String,
    pub issuer: PartyProfile,
    pub counterparty: PartyProfile,
    pub lines: Vec<InvoiceLine>,
    pub totals: InvoiceTotals,
}

impl InvoiceSnapshot {
    /// Check that every legally relevant field is present and consistent.
    ///
    /// Reports the first problem found, naming the field by path.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("invoice_number", &self.invoice_number)?;
        let currency = self.currency.trim();
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ValidationError::invalid(
                "currency",
                "expected a 3-letter upper-case ISO 4217 code",
            ));
        }
        validate_party("issuer", &self.issuer)?;
        validate_party("counterparty", &self.counterparty)?;

        if self.lines.is_empty() {
            return Err(ValidationError::MissingField("lines".to_string()));
        }
        for (i, line) in self.lines.iter().enumerate() {
            require(&format!("lines[{i}].description"), &line.description)?;
            if line.quantity.milli() == 0 {
                return Err(ValidationError::invalid(
                    format!("lines[{i}].quantity"),
                    "must be non-zero",
                ));
            }
            if line.tax_rate.basis_points() < 0 || line.tax_rate.basis_points() > 10_000 {
                return Err(ValidationError::invalid(
                    format!("lines[{i}].tax_rate"),
                    "must be between 0 and 100",
                ));
            }
            if line.tax_amount().is_none() {
                return Err(ValidationError::invalid(
                    format!("lines[{i}]"),
                    "amount overflow",
                ));
            }
        }

        let derived = self.derived_totals().ok_or_else(|| {
            ValidationError::invalid("totals", "amount overflow while summing lines")
        })?;
        let tolerance = ROUNDING_TOLERANCE_PER_LINE * self.lines.len() as u64;
        if self.totals.subtotal.abs_diff(derived.subtotal) > tolerance {
            return Err(ValidationError::invalid(
                "totals.subtotal",
                format!(
                    "declared {} but lines sum to {}",
                    self.totals.subtotal, derived.subtotal
                ),
            ));
        }
        if self.totals.tax.abs_diff(derived.tax) > tolerance {
            return Err(ValidationError::invalid(
                "totals.tax",
                format!("declared {} but lines sum to {}", self.totals.tax, derived.tax),
            ));
        }
        let expected_total = self
            .totals
            .subtotal
            .checked_add(self.totals.tax)
            .ok_or_else(|| ValidationError::invalid("totals.total", "amount overflow"))?;
        if self.totals.total != expected_total {
            return Err(ValidationError::invalid(
                "totals.total",
                format!(
                    "declared {} but subtotal + tax is {}",
                    self.totals.total, expected_total
                ),
            ));
        }
        Ok(())
    }

    /// Totals recomputed from the lines. `None` on overflow.
    pub fn derived_totals(&self) -> Option<InvoiceTotals> {
        let subtotal = Amount::sum(
            self.lines
                .iter()
                .map(InvoiceLine::line_total)
                .collect::<Option<Vec<_>>>()?,
        )?;
        let tax = Amount::sum(
            self.lines
                .iter()
                .map(InvoiceLine::tax_amount)
                .collect::<Option<Vec<_>>>()?,
        )?;
        Some(InvoiceTotals {
            subtotal,
            tax,
            total: subtotal.checked_add(tax)?,
        })
    }
}

fn require(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field.to_string()))
    } else {
        Ok(())
    }
}

fn validate_party(prefix: &str, party: &PartyProfile) -> Result<(), ValidationError> {
    let field = format!("{prefix}.legal_id");
    require(&field, &party.legal_id)?;
    if normalize_legal_id(&party.legal_id).is_none() {
        return Err(ValidationError::invalid(
            field,
            "expected 5-20 alphanumeric characters",
        ));
    }
    require(&format!("{prefix}.name"), &party.name)?;
    match &party.address {
        Some(address) => validate_address(&format!("{prefix}.address"), address),
        None => Ok(()),
    }
}

/// Mirrors what the XML document requires of an `Address` element.
fn validate_address(prefix: &str, address: &Address) -> Result<(), ValidationError> {
    require(&format!("{prefix}.line1"), &address.line1)?;
    require(&format!("{prefix}.city"), &address.city)?;
    require(&format!("{prefix}.postal_code"), &address.postal_code)?;
    let field = format!("{prefix}.country_code");
    require(&field, &address.country_code)?;
    let code = address.country_code.trim();
    if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ValidationError::invalid(field, "expected an ISO 3166-1 alpha-2 code"));
    }
    Ok(())
}
