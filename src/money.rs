//! Fixed-point monetary values.
//!
//! Wraps `rust_decimal` so balances are summed without floating-point drift.
//! Full precision is kept while accumulating; rounding to two places only
//! happens when a value is rendered for output.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A monetary amount in the statement currency.
///
/// # Examples
///
/// ```
/// use expense_consolidator::Money;
///
/// let amount = Money::parse_regional("4.212.815,67");
/// assert_eq!(amount.to_string(), "4212815.67");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Money(Decimal);

impl Money {
    /// Number of decimal places used when rendering.
    pub const OUTPUT_SCALE: u32 = 2;

    /// Zero value.
    pub const ZERO: Self = Money(Decimal::ZERO);

    /// Parses a value written with regional (pt-BR) formatting.
    ///
    /// Every `.` is a thousands separator and is dropped, every `,` becomes the
    /// decimal point, and anything that is not a digit, `.` or `-` (currency
    /// symbols, spaces) is stripped. Empty or unparseable input yields zero.
    pub fn parse_regional(raw: &str) -> Self {
        let cleaned: String = raw
            .replace('.', "")
            .replace(',', ".")
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();

        let cleaned = cleaned.strip_suffix('.').unwrap_or(&cleaned);
        if cleaned.is_empty() {
            return Money::ZERO;
        }

        Decimal::from_str(cleaned)
            .map(Money)
            .unwrap_or(Money::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` for strictly negative values.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Sum of two amounts, or `None` when it overflows or can no longer be
    /// rendered with [`Money::OUTPUT_SCALE`] places.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .filter(Money::fits_output_scale)
    }

    /// Difference of two amounts, with the same limits as
    /// [`Money::checked_add`].
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0
            .checked_sub(rhs.0)
            .map(Money)
            .filter(Money::fits_output_scale)
    }

    /// Whether the value keeps exactly [`Money::OUTPUT_SCALE`] places once
    /// rounded. Values from about 7.9e26 upward in magnitude do not.
    pub fn fits_output_scale(&self) -> bool {
        self.rounded().scale() == Self::OUTPUT_SCALE
    }

    /// The value rounded half away from zero to [`Money::OUTPUT_SCALE`] places.
    ///
    /// Rescaling is best effort: a value too wide for the extra places keeps
    /// a smaller scale (see [`Money::fits_output_scale`]).
    pub fn rounded(&self) -> Decimal {
        let mut value = self
            .0
            .round_dp_with_strategy(Self::OUTPUT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        value.rescale(Self::OUTPUT_SCALE);
        value
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Money(Decimal::from(value))
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    /// Parses a plain decimal literal (`-1234.5`), without regional rules.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.rounded();
        if value.is_zero() && value.is_sign_negative() {
            // -0.004 rounds to "-0.00"; print it as plain zero.
            return write!(f, "{}", value.abs());
        }
        write!(f, "{}", value)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
