//! Row normalization: one mapped row in, one expense entry (or a discard) out.

use crate::money::Money;
use crate::operators::OperatorDirectory;
use crate::schema::{ColumnRole, ColumnRoleMap};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// A normalized, accepted row.
///
/// Transient: produced by [`RecordNormalizer::normalize`] and handed straight
/// to the consolidator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseEntry {
    /// Regulator-assigned operator code, trimmed.
    pub operator_id: String,

    /// Display name from the operator directory, or the synthesized fallback.
    pub operator_name: String,

    pub year: i32,

    /// Fiscal quarter, 1 to 4.
    pub quarter: u8,

    /// Magnitude of the balance movement. Never zero.
    pub amount: Money,
}

/// Why a data row was not turned into an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiscardReason {
    /// Date cell absent or blank.
    MissingDate,
    /// Operator id cell absent or blank.
    MissingId,
    /// Date in an unrecognized shape, or month outside 1-12.
    BadDate,
    /// Opening and closing balances are equal.
    ZeroMovement,
    /// The row could not be read, or its balance movement does not fit.
    ParseFailure,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardReason::MissingDate => "missing_date",
            DiscardReason::MissingId => "missing_id",
            DiscardReason::BadDate => "bad_date",
            DiscardReason::ZeroMovement => "zero_movement",
            DiscardReason::ParseFailure => "parse_failure",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn competence_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(concat!(
                r"^(?:",
                r"(?P<iso_year>[0-9]{4})-(?P<iso_month>[0-9]{2})-[0-9]{2}",
                r"|[0-9]{2}/(?P<br_month>[0-9]{2})/(?P<br_year>[0-9]{4})",
                r"|(?P<ym_year>[0-9]{4})(?P<ym_month>[0-9]{2})",
                r")$"
            ))
            .ok()
        })
        .as_ref()
}

/// Extracts `(year, month)` from a competence date.
///
/// Accepts exactly `YYYY-MM-DD`, `DD/MM/YYYY` and `YYYYMM`. The day is not
/// validated and the month is returned as written, so it may be out of range.
pub fn parse_year_month(raw: &str) -> Option<(i32, u32)> {
    let caps = competence_pattern()?.captures(raw.trim())?;

    let (year, month) = if let (Some(y), Some(m)) = (caps.name("iso_year"), caps.name("iso_month")) {
        (y, m)
    } else if let (Some(y), Some(m)) = (caps.name("br_year"), caps.name("br_month")) {
        (y, m)
    } else {
        (caps.name("ym_year")?, caps.name("ym_month")?)
    };

    Some((year.as_str().parse().ok()?, month.as_str().parse().ok()?))
}

/// Fiscal quarter of a month, or `None` outside 1-12.
pub fn quarter_of(month: u32) -> Option<u8> {
    match month {
        1..=12 => Some(((month - 1) / 3 + 1) as u8),
        _ => None,
    }
}

/// Turns data rows of one file into [`ExpenseEntry`] values.
///
/// Holds the file's column map and the operator directory; cheap to build
/// once per file.
pub struct RecordNormalizer<'a> {
    columns: &'a ColumnRoleMap,
    operators: &'a OperatorDirectory,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(columns: &'a ColumnRoleMap, operators: &'a OperatorDirectory) -> Self {
        RecordNormalizer { columns, operators }
    }

    /// Normalizes one data row.
    ///
    /// Checks run in order: blank date, blank operator id, unrecognized date,
    /// balance movement too large to represent, zero movement. The first
    /// failing check is the reported reason.
    pub fn normalize(&self, row: &[String]) -> Result<ExpenseEntry, DiscardReason> {
        let date = self.columns.cell(row, ColumnRole::Date);
        if date.is_empty() {
            return Err(DiscardReason::MissingDate);
        }

        let operator_id = self.columns.cell(row, ColumnRole::OperatorId);
        if operator_id.is_empty() {
            return Err(DiscardReason::MissingId);
        }

        let (year, month) = parse_year_month(date).ok_or(DiscardReason::BadDate)?;
        let quarter = quarter_of(month).ok_or(DiscardReason::BadDate)?;

        let opening = Money::parse_regional(self.columns.cell(row, ColumnRole::OpeningBalance));
        let closing = Money::parse_regional(self.columns.cell(row, ColumnRole::ClosingBalance));
        let amount = closing
            .checked_sub(opening)
            .ok_or(DiscardReason::ParseFailure)?
            .abs();
        if amount.is_zero() {
            return Err(DiscardReason::ZeroMovement);
        }

        Ok(ExpenseEntry {
            operator_id: operator_id.to_string(),
            operator_name: self.operators.resolve(operator_id),
            year,
            quarter,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn header() -> ColumnRoleMap {
        ColumnRoleMap::from_header(&[
            "DATA",
            "REG_ANS",
            "CD_CONTA_CONTABIL",
            "DESCRICAO",
            "VL_SALDO_INICIAL",
            "VL_SALDO_FINAL",
        ])
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn normalize(cells: &[&str]) -> Result<ExpenseEntry, DiscardReason> {
        let columns = header();
        let operators = OperatorDirectory::builtin();
        RecordNormalizer::new(&columns, &operators).normalize(&row(cells))
    }

    #[test]
    fn test_parse_year_month_iso() {
        assert_eq!(parse_year_month("2025-01-01"), Some((2025, 1)));
        assert_eq!(parse_year_month(" 2024-12-31 "), Some((2024, 12)));
    }

    #[test]
    fn test_parse_year_month_brazilian() {
        assert_eq!(parse_year_month("31/03/2025"), Some((2025, 3)));
    }

    #[test]
    fn test_parse_year_month_compact() {
        assert_eq!(parse_year_month("202507"), Some((2025, 7)));
    }

    #[test]
    fn test_parse_year_month_rejects_other_shapes() {
        assert_eq!(parse_year_month("2025/01/01"), None);
        assert_eq!(parse_year_month("1/3/2025"), None);
        assert_eq!(parse_year_month("2025-1-01"), None);
        assert_eq!(parse_year_month("2025-01-01 00:00:00"), None);
        assert_eq!(parse_year_month("20250101"), None);
        assert_eq!(parse_year_month("Wed Jan 01 00:00:00 BRT 2025"), None);
        assert_eq!(parse_year_month(""), None);
    }

    #[test]
    fn test_parse_year_month_does_not_validate_range() {
        assert_eq!(parse_year_month("2025-13-01"), Some((2025, 13)));
        assert_eq!(parse_year_month("202500"), Some((2025, 0)));
    }

    #[test]
    fn test_quarter_derivation() {
        assert_eq!(quarter_of(1), Some(1));
        assert_eq!(quarter_of(3), Some(1));
        assert_eq!(quarter_of(4), Some(2));
        assert_eq!(quarter_of(7), Some(3));
        assert_eq!(quarter_of(10), Some(4));
        assert_eq!(quarter_of(12), Some(4));
        assert_eq!(quarter_of(0), None);
        assert_eq!(quarter_of(13), None);
    }

    #[test]
    fn test_normalize_accepts_valid_row() {
        let entry = normalize(&["2025-01-01", "316458", "46411", "PUBLICIDADE", "0", "1070"]).unwrap();

        assert_eq!(entry.operator_id, "316458");
        assert_eq!(entry.operator_name, "Operadora 316458");
        assert_eq!(entry.year, 2025);
        assert_eq!(entry.quarter, 1);
        assert_eq!(entry.amount.to_string(), "1070.00");
    }

    #[test]
    fn test_normalize_amount_is_absolute_delta() {
        let entry = normalize(&[
            "01/05/2025",
            "421723",
            "4",
            "x",
            "3.094.590,67",
            "4.212.815,67",
        ])
        .unwrap();
        assert_eq!(entry.amount, Money::from_str("1118225.00").unwrap());
        assert_eq!(entry.quarter, 2);

        let reversed = normalize(&[
            "01/05/2025",
            "421723",
            "4",
            "x",
            "4.212.815,67",
            "3.094.590,67",
        ])
        .unwrap();
        assert_eq!(reversed.amount, entry.amount);
    }

    #[test]
    fn test_normalize_unknown_operator_uses_fallback_name() {
        let entry = normalize(&["202510", " 123 ", "", "", "", "5"]).unwrap();
        assert_eq!(entry.operator_id, "123");
        assert_eq!(entry.operator_name, "REG_ANS_123");
        assert_eq!(entry.quarter, 4);
    }

    #[test]
    fn test_normalize_discards_in_order() {
        assert_eq!(
            normalize(&["", "", "", "", "0", "0"]),
            Err(DiscardReason::MissingDate)
        );
        assert_eq!(
            normalize(&["garbage", " ", "", "", "0", "0"]),
            Err(DiscardReason::MissingId)
        );
        assert_eq!(
            normalize(&["garbage", "1", "", "", "0", "0"]),
            Err(DiscardReason::BadDate)
        );
        assert_eq!(
            normalize(&["2025-01-01", "1", "", "", "10", "10"]),
            Err(DiscardReason::ZeroMovement)
        );
    }

    #[test]
    fn test_normalize_invalid_month_is_bad_date() {
        assert_eq!(
            normalize(&["2025-13-01", "1", "", "", "0", "10"]),
            Err(DiscardReason::BadDate)
        );
        assert_eq!(
            normalize(&["202500", "1", "", "", "0", "10"]),
            Err(DiscardReason::BadDate)
        );
    }

    #[test]
    fn test_normalize_short_row() {
        assert_eq!(normalize(&["2025-01-01"]), Err(DiscardReason::MissingId));
        assert_eq!(
            normalize(&["2025-01-01", "1"]),
            Err(DiscardReason::ZeroMovement)
        );
    }

    #[test]
    fn test_normalize_overflowing_movement_is_parse_failure() {
        assert_eq!(
            normalize(&[
                "2025-01-01",
                "1",
                "",
                "",
                "-79228162514264337593543950335",
                "79228162514264337593543950335",
            ]),
            Err(DiscardReason::ParseFailure)
        );
    }

    #[test]
    fn test_normalize_movement_too_wide_for_cents_is_parse_failure() {
        assert_eq!(
            normalize(&["2025-01-01", "1", "", "", "0", "12345678901234567890123456789,5"]),
            Err(DiscardReason::ParseFailure)
        );
    }

    #[test]
    fn test_normalize_unparseable_balances_count_as_zero() {
        let entry = normalize(&["2025-01-01", "1", "", "", "n/a", "R$ 1.000,50"]).unwrap();
        assert_eq!(entry.amount, Money::from_str("1000.50").unwrap());
    }
}
