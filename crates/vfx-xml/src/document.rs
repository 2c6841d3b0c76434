//! # Registration Document Model
//!
//! [`InvoiceDocument`] is the typed form of one invoice registration XML
//! document. Every leaf is optional or textual so that an incomplete invoice
//! still encodes, and [`crate::validate`] can name each problem by path.
//!
//! ## XML structure (schema version 1.0)
//!
//! ```text
//! InvoiceRegistration  xmlns="urn:verifactu:invoice:1.0" SchemaVersion="1.0"
//! ├── Issuer     LegalId, Name, Address?
//! ├── Invoice    InvoiceId, InvoiceNumber, IssueDate, Direction, Currency
//! ├── Recipient  LegalId, Name, Address?
//! ├── Lines      Line[n]: Description, Quantity, UnitPrice, TaxRate, LineTotal, TaxAmount
//! └── Totals     Subtotal, TaxTotal, Total
//! ```

use serde::{Deserialize, Serialize};

/// Namespace of the registration schema.
pub const XML_NAMESPACE: &str = "urn:verifactu:invoice:1.0";
/// Schema version rendered in every document.
pub const SCHEMA_VERSION: &str = "1.0";
/// MIME type for downloads and submissions.
pub const CONTENT_TYPE: &str = "application/xml";

/// Escape a string for safe inclusion in XML text content or attributes.
///
/// Replaces the five XML special characters with their entity references.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressElement {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country_code: String,
}

/// `Issuer` or `Recipient`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyElement {
    pub legal_id: Option<String>,
    pub name: Option<String>,
    pub address: Option<AddressElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceElement {
    pub invoice_id: String,
    pub invoice_number: Option<String>,
    /// `YYYY-MM-DD`.
    pub issue_date: Option<String>,
    pub direction: String,
    pub currency: Option<String>,
}

/// Numeric fields are pre-formatted decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineElement {
    pub description: Option<String>,
    pub quantity: Option<String>,
    pub unit_price: Option<String>,
    pub tax_rate: Option<String>,
    pub line_total: Option<String>,
    pub tax_amount: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsElement {
    pub subtotal: Option<String>,
    pub tax_total: Option<String>,
    pub total: Option<String>,
}

/// One invoice registration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDocument {
    pub schema_version: String,
    pub issuer: PartyElement,
    pub invoice: InvoiceElement,
    pub recipient: PartyElement,
    pub lines: Vec<LineElement>,
    pub totals: TotalsElement,
}

impl InvoiceDocument {
    /// Download file name: `<issuerLegalId>_<invoiceNumber>.xml`, with any
    /// character outside `[A-Za-z0-9._-]` replaced by `_`.
    pub fn file_name(&self) -> String {
        let raw = format!(
            "{}_{}",
            self.issuer.legal_id.as_deref().unwrap_or("UNKNOWN"),
            self.invoice.invoice_number.as_deref().unwrap_or("UNNUMBERED"),
        );
        let safe: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{safe}.xml")
    }

    /// Render as a standalone UTF-8 XML document.
    pub fn to_xml(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}\n",
            self.render(0)
        )
    }

    /// Render the `InvoiceRegistration` element at the given indent depth.
    pub(crate) fn render(&self, depth: usize) -> String {
        let pad = "  ".repeat(depth);
        let lines: String = self
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| render_line(i + 1, line, depth + 2))
            .collect();
        format!(
            r#"{pad}<InvoiceRegistration xmlns="{ns}" SchemaVersion="{version}">
{issuer}{pad}  <Invoice>
{invoice_id}{invoice_number}{issue_date}{direction}{currency}{pad}  </Invoice>
{recipient}{pad}  <Lines>
{lines}{pad}  </Lines>
{pad}  <Totals>
{subtotal}{tax_total}{total}{pad}  </Totals>
{pad}</InvoiceRegistration>"#,
            ns = XML_NAMESPACE,
            version = xml_escape(&self.schema_version),
            issuer = render_party("Issuer", &self.issuer, depth + 1),
            invoice_id = leaf("InvoiceId", Some(&self.invoice.invoice_id), depth + 2),
            invoice_number = leaf("InvoiceNumber", self.invoice.invoice_number.as_deref(), depth + 2),
            issue_date = leaf("IssueDate", self.invoice.issue_date.as_deref(), depth + 2),
            direction = leaf("Direction", Some(&self.invoice.direction), depth + 2),
            currency = leaf("Currency", self.invoice.currency.as_deref(), depth + 2),
            recipient = render_party("Recipient", &self.recipient, depth + 1),
            subtotal = leaf("Subtotal", self.totals.subtotal.as_deref(), depth + 2),
            tax_total = leaf("TaxTotal", self.totals.tax_total.as_deref(), depth + 2),
            total = leaf("Total", self.totals.total.as_deref(), depth + 2),
        )
    }
}

/// `<Name>value</Name>\n` at `depth`, or an empty `<Name/>` when absent.
pub(crate) fn leaf(name: &str, value: Option<&str>, depth: usize) -> String {
    let pad = "  ".repeat(depth);
    match value {
        Some(v) => format!("{pad}<{name}>{}</{name}>\n", xml_escape(v)),
        None => format!("{pad}<{name}/>\n"),
    }
}

fn render_party(tag: &str, party: &PartyElement, depth: usize) -> String {
    let pad = "  ".repeat(depth);
    let address = party
        .address
        .as_ref()
        .map(|a| {
            let inner = "  ".repeat(depth + 1);
            format!(
                "{inner}<Address>\n{}{}{}{}{}{inner}</Address>\n",
                leaf("Line1", Some(&a.line1), depth + 2),
                a.line2
                    .as_deref()
                    .map(|l| leaf("Line2", Some(l), depth + 2))
                    .unwrap_or_default(),
                leaf("City", Some(&a.city), depth + 2),
                leaf("PostalCode", Some(&a.postal_code), depth + 2),
                leaf("CountryCode", Some(&a.country_code), depth + 2),
            )
        })
        .unwrap_or_default();
    format!(
        "{pad}<{tag}>\n{}{}{address}{pad}</{tag}>\n",
        leaf("LegalId", party.legal_id.as_deref(), depth + 1),
        leaf("Name", party.name.as_deref(), depth + 1),
    )
}

fn render_line(number: usize, line: &LineElement, depth: usize) -> String {
    let pad = "  ".repeat(depth);
    format!(
        "{pad}<Line Number=\"{number}\">\n{}{}{}{}{}{}{pad}</Line>\n",
        leaf("Description", line.description.as_deref(), depth + 1),
        leaf("Quantity", line.quantity.as_deref(), depth + 1),
        leaf("UnitPrice", line.unit_price.as_deref(), depth + 1),
        leaf("TaxRate", line.tax_rate.as_deref(), depth + 1),
        leaf("LineTotal", line.line_total.as_deref(), depth + 1),
        leaf("TaxAmount", line.tax_amount.as_deref(), depth + 1),
    )
}
