//! # Fixed-Point Amounts
//!
//! Monetary amounts, quantities, and tax rates as scaled integers. Floats never
//! appear in invoice data: every value parses from and renders to a decimal
//! string at a fixed precision, which is what makes the canonical form
//! locale-independent and byte-stable.
//!
//! | Type | Unit | Scale | Example |
//! |------|------|-------|---------|
//! | [`Amount`] | minor currency unit | 2 | `"1234.50"` = 123450 |
//! | [`Quantity`] | thousandths | 3 | `"2.5"` = 2500 |
//! | [`TaxRate`] | basis points | 2 | `"21"` = 2100 |

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Parse a decimal string into an integer scaled by `10^scale`.
///
/// Accepts an optional leading `-`, digits, and at most `scale` fractional
/// digits. Rejects exponents, grouping separators, and excess precision
/// rather than silently rounding.
pub fn parse_fixed(s: &str, scale: u32) -> Result<i64, ValidationError> {
    let err = || ValidationError::InvalidDecimal {
        value: s.to_string(),
        scale,
    };
    let trimmed = s.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) || frac_part.len() > scale as usize {
        return Err(err());
    }
    if digits.ends_with('.') {
        return Err(err());
    }

    let factor = 10_i64.checked_pow(scale).ok_or_else(err)?;
    let whole: i64 = int_part.parse().map_err(|_| err())?;
    let mut frac: i64 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().map_err(|_| err())?
    };
    for _ in frac_part.len()..scale as usize {
        frac *= 10;
    }
    let magnitude = whole
        .checked_mul(factor)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(err)?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Render a scaled integer with exactly `scale` fractional digits.
pub fn format_fixed(value: i64, scale: u32) -> String {
    let factor = 10_u64.pow(scale);
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    if scale == 0 {
        return format!("{sign}{abs}");
    }
    format!(
        "{sign}{}.{:0width$}",
        abs / factor,
        abs % factor,
        width = scale as usize
    )
}

/// Divide with rounding half away from zero.
fn div_round(numerator: i128, denominator: i128) -> i128 {
    let q = numerator / denominator;
    let r = numerator % denominator;
    if r.abs() * 2 >= denominator.abs() {
        if (numerator < 0) != (denominator < 0) {
            q - 1
        } else {
            q + 1
        }
    } else {
        q
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// Monetary amount in minor currency units (two decimals).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(i64);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// Construct from minor units.
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Value in minor units.
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Parse `"1234.5"` / `"1234.50"` / `"-3"`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        parse_fixed(s, 2).map(Self)
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Absolute difference in minor units.
    pub fn abs_diff(self, other: Amount) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Sum an iterator of amounts, failing on overflow.
    pub fn sum<I: IntoIterator<Item = Amount>>(iter: I) -> Option<Amount> {
        iter.into_iter().try_fold(Amount::ZERO, Amount::checked_add)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_fixed(self.0, 2))
    }
}

impl TryFrom<String> for Amount {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Amount> for String {
    fn from(a: Amount) -> Self {
        a.to_string()
    }
}

// ---------------------------------------------------------------------------
// Quantity
// ---------------------------------------------------------------------------

/// Line quantity in thousandths of a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity(i64);

impl Quantity {
    /// Construct from thousandths.
    pub const fn from_milli(milli: i64) -> Self {
        Self(milli)
    }

    /// Construct from whole units.
    pub const fn units(n: i64) -> Self {
        Self(n * 1000)
    }

    /// Value in thousandths.
    pub const fn milli(self) -> i64 {
        self.0
    }

    /// Parse `"2"` / `"2.5"` / `"0.125"`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        parse_fixed(s, 3).map(Self)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_fixed(self.0, 3))
    }
}

impl TryFrom<String> for Quantity {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.to_string()
    }
}

// ---------------------------------------------------------------------------
// TaxRate
// ---------------------------------------------------------------------------

/// Tax rate in basis points (`2100` = 21.00 %).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxRate(i64);

impl TaxRate {
    /// Construct from basis points.
    pub const fn from_basis_points(bp: i64) -> Self {
        Self(bp)
    }

    /// Value in basis points.
    pub const fn basis_points(self) -> i64 {
        self.0
    }

    /// Parse a percentage: `"21"` / `"10.5"` / `"0"`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        parse_fixed(s, 2).map(Self)
    }
}

impl std::fmt::Display for TaxRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_fixed(self.0, 2))
    }
}

impl TryFrom<String> for TaxRate {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaxRate> for String {
    fn from(r: TaxRate) -> Self {
        r.to_string()
    }
}

/// Line total: `quantity × unit price`, rounded half away from zero to the cent.
///
/// Returns `None` on overflow.
pub fn line_total(quantity: Quantity, unit_price: Amount) -> Option<Amount> {
    let raw = i128::from(quantity.milli()) * i128::from(unit_price.minor());
    i64::try_from(div_round(raw, 1000)).ok().map(Amount)
}

/// Tax on a base amount at `rate`, rounded half away from zero to the cent.
pub fn tax_amount(base: Amount, rate: TaxRate) -> Option<Amount> {
    let raw = i128::from(base.minor()) * i128::from(rate.basis_points());
    i64::try_from(div_round(raw, 10_000)).ok().map(Amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_amount_variants() {
        assert_eq!(Amount::parse("1234.50").unwrap().minor(), 123450);
        assert_eq!(Amount::parse("1234.5").unwrap().minor(), 123450);
        assert_eq!(Amount::parse("7").unwrap().minor(), 700);
        assert_eq!(Amount::parse("-0.01").unwrap().minor(), -1);
        assert_eq!(Amount::parse(" 0.10 ").unwrap().minor(), 10);
    }

    #[test]
    fn parse_amount_rejects_malformed() {
        assert!(Amount::parse("").is_err());
        assert!(Amount::parse("1,000.00").is_err());
        assert!(Amount::parse("1e3").is_err());
        assert!(Amount::parse("1.234").is_err());
        assert!(Amount::parse("1.").is_err());
        assert!(Amount::parse(".5").is_err());
        assert!(Amount::parse("abc").is_err());
        assert!(Amount::parse("99999999999999999999").is_err());
    }

    #[test]
    fn amount_formats_two_decimals() {
        assert_eq!(Amount::from_minor(123450).to_string(), "1234.50");
        assert_eq!(Amount::from_minor(5).to_string(), "0.05");
        assert_eq!(Amount::from_minor(-5).to_string(), "-0.05");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn quantity_and_rate_format() {
        assert_eq!(Quantity::parse("2.5").unwrap().to_string(), "2.500");
        assert_eq!(Quantity::units(3).to_string(), "3.000");
        assert_eq!(TaxRate::parse("21").unwrap().to_string(), "21.00");
        assert_eq!(TaxRate::parse("10.5").unwrap().basis_points(), 1050);
    }

    #[test]
    fn amount_serde_is_string() {
        let a = Amount::from_minor(1999);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"19.99\"");
        let back: Amount = serde_json::from_str("\"19.99\"").unwrap();
        assert_eq!(back, a);
        assert!(serde_json::from_str::<Amount>("19.99").is_err());
    }

    #[test]
    fn line_total_rounds_half_away_from_zero() {
        // 0.333 × 0.10 = 0.0333 -> 0.03
        assert_eq!(
            line_total(Quantity::from_milli(333), Amount::from_minor(10)),
            Some(Amount::from_minor(3))
        );
        // 1.5 × 0.01 = 0.015 -> 0.02
        assert_eq!(
            line_total(Quantity::from_milli(1500), Amount::from_minor(1)),
            Some(Amount::from_minor(2))
        );
        // -1.5 × 0.01 = -0.015 -> -0.02
        assert_eq!(
            line_total(Quantity::from_milli(-1500), Amount::from_minor(1)),
            Some(Amount::from_minor(-2))
        );
    }

    #[test]
    fn tax_amount_at_standard_rate() {
        // 100.00 at 21% = 21.00
        assert_eq!(
            tax_amount(Amount::from_minor(10000), TaxRate::from_basis_points(2100)),
            Some(Amount::from_minor(2100))
        );
        // 0.10 at 21% = 0.021 -> 0.02
        assert_eq!(
            tax_amount(Amount::from_minor(10), TaxRate::from_basis_points(2100)),
            Some(Amount::from_minor(2))
        );
    }

    #[test]
    fn amount_sum_detects_overflow() {
        assert_eq!(
            Amount::sum([Amount::from_minor(1), Amount::from_minor(2)]),
            Some(Amount::from_minor(3))
        );
        assert_eq!(Amount::sum([Amount::from_minor(i64::MAX), Amount::from_minor(1)]), None);
    }
}
