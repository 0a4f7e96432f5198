//! Aggregation of expense entries into one record per operator and quarter.
//!
//! # Status rules
//!
//! - A record's status is decided from the sign of its *first* amount:
//!   negative gives [`RecordStatus::NegativeAmount`], anything else
//!   [`RecordStatus::Ok`]. Later amounts change the sum, never the sign flag.
//! - Any later entry whose name differs (ignoring case) from the stored name
//!   sets [`RecordStatus::NameConflict`]. The flag overrides the sign flag
//!   and is never cleared.
//!
//! Name-conflict detection is the only order-dependent part: the stored name
//! is the one carried by the first entry for a key.

use crate::money::Money;
use crate::normalizer::ExpenseEntry;
use log::{debug, warn};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one output record.
///
/// Ordered by operator id, then year, then quarter; this is the export order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsolidationKey {
    pub operator_id: String,
    pub year: i32,
    pub quarter: u8,
}

impl ConsolidationKey {
    pub fn new(operator_id: impl Into<String>, year: i32, quarter: u8) -> Self {
        ConsolidationKey {
            operator_id: operator_id.into(),
            year,
            quarter,
        }
    }
}

impl fmt::Display for ConsolidationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}Q{}", self.operator_id, self.year, self.quarter)
    }
}

/// Data-quality flag on a consolidated record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    Ok,
    /// The first amount seen for the key was negative.
    NegativeAmount,
    /// Entries for the key carried different operator names.
    NameConflict,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Ok => "OK",
            RecordStatus::NegativeAmount => "NEGATIVE_AMOUNT",
            RecordStatus::NameConflict => "NAME_CONFLICT",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running total for one operator in one quarter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedRecord {
    pub operator_id: String,
    pub operator_name: String,
    pub year: i32,
    pub quarter: u8,

    /// Signed sum of every amount added for this key.
    pub amount: Money,

    pub status: RecordStatus,
}

impl ConsolidatedRecord {
    fn first(key: &ConsolidationKey, operator_name: &str, amount: Money) -> Self {
        ConsolidatedRecord {
            operator_id: key.operator_id.clone(),
            operator_name: operator_name.to_string(),
            year: key.year,
            quarter: key.quarter,
            amount,
            status: if amount.is_negative() {
                RecordStatus::NegativeAmount
            } else {
                RecordStatus::Ok
            },
        }
    }

    pub fn key(&self) -> ConsolidationKey {
        ConsolidationKey::new(self.operator_id.clone(), self.year, self.quarter)
    }

    /// Adds an amount to the sum and checks the name.
    ///
    /// An amount whose sum would overflow is dropped; the name is still
    /// checked.
    fn accumulate(&mut self, operator_name: &str, amount: Money) {
        match self.amount.checked_add(amount) {
            Some(sum) => self.amount = sum,
            None => warn!(
                "{}: adding {} to {} overflows; amount dropped",
                self.key(),
                amount,
                self.amount
            ),
        }
        if !self.name_matches(operator_name) {
            self.status = RecordStatus::NameConflict;
        }
    }

    fn name_matches(&self, other: &str) -> bool {
        self.operator_name.to_lowercase() == other.to_lowercase()
    }

    pub fn is_flagged(&self) -> bool {
        self.status != RecordStatus::Ok
    }
}

/// Owns every consolidated record of a run.
///
/// Records are kept in key order so iteration and export are deterministic.
#[derive(Debug, Default, Clone)]
pub struct Consolidator {
    records: BTreeMap<ConsolidationKey, ConsolidatedRecord>,
}

impl Consolidator {
    pub fn new() -> Self {
        Consolidator {
            records: BTreeMap::new(),
        }
    }

    /// Adds one accepted amount.
    ///
    /// Input with an empty operator id, a quarter outside 1-4, a zero amount
    /// or an amount too large to report is ignored without error. An amount
    /// that would overflow the running sum is dropped with a warning.
    pub fn add(
        &mut self,
        operator_id: &str,
        operator_name: &str,
        year: i32,
        quarter: u8,
        amount: Money,
    ) {
        if operator_id.is_empty() {
            debug!("Ignoring entry without operator id");
            return;
        }
        if !(1..=4).contains(&quarter) {
            debug!("Ignoring entry for {} with quarter {}", operator_id, quarter);
            return;
        }
        if amount.is_zero() {
            debug!("Ignoring zero amount for {}", operator_id);
            return;
        }
        if !amount.fits_output_scale() {
            warn!("Ignoring amount for {} too large to report", operator_id);
            return;
        }

        let key = ConsolidationKey::new(operator_id, year, quarter);
        match self.records.entry(key) {
            Entry::Vacant(slot) => {
                let record = ConsolidatedRecord::first(slot.key(), operator_name, amount);
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                record.accumulate(operator_name, amount);
                if record.status == RecordStatus::NameConflict {
                    debug!(
                        "{}: name '{}' conflicts with '{}'",
                        slot.key(),
                        operator_name,
                        slot.get().operator_name
                    );
                }
            }
        }
    }

    /// Adds a normalized entry.
    pub fn add_entry(&mut self, entry: &ExpenseEntry) {
        self.add(
            &entry.operator_id,
            &entry.operator_name,
            entry.year,
            entry.quarter,
            entry.amount,
        );
    }

    /// Folds another consolidator into this one, record by record.
    ///
    /// Keys new to `self` are taken over unchanged. For existing keys the
    /// amounts are summed, differing names set `NameConflict`, and a
    /// `NameConflict` already on the incoming record is kept. Merging
    /// partials in input order gives the same result as adding every entry
    /// to a single consolidator.
    pub fn merge(&mut self, other: Consolidator) {
        for (key, incoming) in other.records {
            match self.records.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(incoming);
                }
                Entry::Occupied(mut slot) => {
                    let record = slot.get_mut();
                    record.accumulate(&incoming.operator_name, incoming.amount);
                    if incoming.status == RecordStatus::NameConflict {
                        record.status = RecordStatus::NameConflict;
                    }
                }
            }
        }
    }

    /// Number of distinct keys held.
    pub fn total_records(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &ConsolidationKey) -> Option<&ConsolidatedRecord> {
        self.records.get(key)
    }

    /// Records in key order.
    pub fn records(&self) -> impl Iterator<Item = &ConsolidatedRecord> {
        self.records.values()
    }

    /// Number of records whose status is not `OK`.
    pub fn flagged_records(&self) -> usize {
        self.records().filter(|r| r.is_flagged()).count()
    }
}
