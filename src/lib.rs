//! # Expense Consolidator
//!
//! Reads quarterly financial-statement files published by the health
//! regulator (ANS) in whatever shape they come, and reduces them to one
//! expense record per operator per quarter.
//!
//! ## Pipeline
//!
//! - **Reader**: delimited text (`.csv`, `.txt`, delimiter inferred) and
//!   spreadsheets (`.xlsx`, first sheet) as uniform string rows
//! - **Schema**: header names mapped to the date, operator and balance columns
//! - **Normalizer**: dates, regional money formats and fiscal quarters
//! - **Consolidator**: sums per operator/year/quarter and flags anomalies
//! - **Exporter**: canonical CSV, sorted by key, packaged in a `.zip`
//!
//! ## Example
//!
//! ```no_run
//! use expense_consolidator::ExpenseEngine;
//! use std::io::Cursor;
//!
//! let csv = "DATA;REG_ANS;VL_SALDO_INICIAL;VL_SALDO_FINAL\n2025-01-01;316458;0;1070\n";
//! let mut engine = ExpenseEngine::default();
//! engine.process_csv(Cursor::new(csv)).unwrap();
//! engine.write_output(std::io::stdout()).unwrap();
//! ```

pub mod archive;
pub mod consolidator;
pub mod engine;
pub mod error;
pub mod exporter;
pub mod money;
pub mod normalizer;
pub mod operators;
pub mod reader;
pub mod schema;
pub mod walk;

pub use consolidator::{ConsolidatedRecord, ConsolidationKey, Consolidator, RecordStatus};
pub use engine::{ExpenseEngine, FileOutcome, FileSummary, RunSummary};
pub use error::{ExpenseError, Result};
pub use exporter::Exporter;
pub use money::Money;
pub use normalizer::{DiscardReason, ExpenseEntry, RecordNormalizer};
pub use operators::OperatorDirectory;
pub use reader::{SourceFormat, TabularReader};
pub use schema::{ColumnRole, ColumnRoleMap};
