//! Header inference: which column carries which meaning.
//!
//! Source files from different quarters name their columns differently
//! (`DATA` vs `DT_COMPETENCIA`, `REG_ANS` vs `REGISTRO_ANS`, ...). The mapper
//! recognizes the variants and records the first column that matches each
//! role.

use std::fmt;

/// Semantic role of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    Date,
    OperatorId,
    OpeningBalance,
    ClosingBalance,
}

impl ColumnRole {
    /// All roles, in the order they are tested for each header cell.
    pub const ALL: [ColumnRole; 4] = [
        ColumnRole::Date,
        ColumnRole::OperatorId,
        ColumnRole::OpeningBalance,
        ColumnRole::ClosingBalance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ColumnRole::Date => "date",
            ColumnRole::OperatorId => "operator_id",
            ColumnRole::OpeningBalance => "opening_balance",
            ColumnRole::ClosingBalance => "closing_balance",
        }
    }

    /// Tests an already-normalized (trimmed, uppercased) header cell.
    fn matches(&self, header: &str) -> bool {
        match self {
            ColumnRole::Date => {
                header == "DATA" || header == "DT_COMPETENCIA" || header.starts_with("DT_")
            }
            ColumnRole::OperatorId => header == "REG_ANS" || header == "REGISTRO_ANS",
            ColumnRole::OpeningBalance => {
                header == "VL_SALDO_INICIAL"
                    || (header.contains("SALDO")
                        && header.contains("INICIAL")
                        && !header.contains("FINAL"))
            }
            ColumnRole::ClosingBalance => {
                header == "VL_SALDO_FINAL"
                    || (header.contains("SALDO")
                        && header.contains("FINAL")
                        && !header.contains("INICIAL"))
            }
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Uppercases and trims a header cell, dropping a leading byte-order mark.
pub fn normalize_header(cell: &str) -> String {
    cell.trim_start_matches('\u{feff}').trim().to_uppercase()
}

/// Column index for each role, as found in one file's header.
///
/// Built once per file by [`ColumnRoleMap::from_header`] and never changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRoleMap {
    date: Option<usize>,
    operator_id: Option<usize>,
    opening_balance: Option<usize>,
    closing_balance: Option<usize>,
}

impl ColumnRoleMap {
    /// Infers roles from a header row.
    ///
    /// Each column is claimed by the first role it matches, in
    /// [`ColumnRole::ALL`] order. Later matches for a role already assigned
    /// are ignored.
    pub fn from_header<S: AsRef<str>>(header: &[S]) -> Self {
        let mut map = ColumnRoleMap::default();

        for (idx, cell) in header.iter().enumerate() {
            let normalized = normalize_header(cell.as_ref());
            // A column belongs to its first matching role only.
            if let Some(role) = ColumnRole::ALL.into_iter().find(|r| r.matches(&normalized)) {
                let slot = map.slot_mut(role);
                if slot.is_none() {
                    *slot = Some(idx);
                }
            }
        }

        map
    }

    /// Column index assigned to `role`, if any.
    pub fn get(&self, role: ColumnRole) -> Option<usize> {
        match role {
            ColumnRole::Date => self.date,
            ColumnRole::OperatorId => self.operator_id,
            ColumnRole::OpeningBalance => self.opening_balance,
            ColumnRole::ClosingBalance => self.closing_balance,
        }
    }

    fn slot_mut(&mut self, role: ColumnRole) -> &mut Option<usize> {
        match role {
            ColumnRole::Date => &mut self.date,
            ColumnRole::OperatorId => &mut self.operator_id,
            ColumnRole::OpeningBalance => &mut self.opening_balance,
            ColumnRole::ClosingBalance => &mut self.closing_balance,
        }
    }

    /// Roles with no matching column.
    pub fn missing_roles(&self) -> Vec<ColumnRole> {
        ColumnRole::ALL
            .into_iter()
            .filter(|role| self.get(*role).is_none())
            .collect()
    }

    /// A file is usable only when every role resolved.
    pub fn is_complete(&self) -> bool {
        self.missing_roles().is_empty()
    }

    /// Trimmed cell for `role` in `row`; empty when the role is unmapped or
    /// the row is too short.
    pub fn cell<'a>(&self, row: &'a [String], role: ColumnRole) -> &'a str {
        self.get(role)
            .and_then(|idx| row.get(idx))
            .map(|s| s.trim())
            .unwrap_or("")
    }
}

impl fmt::Display for ColumnRoleMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_idx = |idx: Option<usize>| idx.map_or_else(|| "-".to_string(), |i| i.to_string());
        write!(
            f,
            "date={}, operator_id={}, opening_balance={}, closing_balance={}",
            fmt_idx(self.date),
            fmt_idx(self.operator_id),
            fmt_idx(self.opening_balance),
            fmt_idx(self.closing_balance)
        )
    }
}
