//! Error types for the consolidation run.
//!
//! Only I/O on the output side is fatal to a run. Everything raised while
//! reading a single input file is caught by the engine and turned into a
//! per-file failure.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for consolidation operations
pub type Result<T> = std::result::Result<T, ExpenseError>;

#[derive(Error, Debug)]
pub enum ExpenseError {
    /// Failed to open, read or write a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited text could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet could not be opened or has no readable sheet
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    /// The workbook has no worksheet to read
    #[error("spreadsheet {0} has no worksheets")]
    EmptyWorkbook(PathBuf),

    /// Archive could not be read or written
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Extension is neither delimited text nor spreadsheet
    #[error("unsupported file type: {0}")]
    UnsupportedFile(PathBuf),

    /// Output directory could not be prepared
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
