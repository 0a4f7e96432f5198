//! Uniform row access over delimited text and spreadsheet files.
//!
//! Every source yields the same shape: a header row followed by data rows,
//! each row a `Vec<String>`. Rows are produced one at a time; a source can be
//! read again by calling [`TabularReader::open`] a second time.

use crate::error::{ExpenseError, Result};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::NaiveDate;
use csv::{ByteRecord, ByteRecordsIntoIter, ReaderBuilder, Trim};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Candidate field delimiters, in tie-breaking priority order.
pub const DELIMITER_CANDIDATES: [u8; 4] = [b';', b',', b'|', b'\t'];

/// Delimiter used when the first line gives no evidence.
pub const DEFAULT_DELIMITER: u8 = b',';

/// A raw row, aligned by position with the header row of its file.
pub type RawRow = Vec<String>;

/// Physical layout of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// `.csv` or `.txt`
    Delimited,
    /// `.xlsx`, first sheet only
    Spreadsheet,
}

impl SourceFormat {
    /// Classifies a path by extension. Returns `None` for files to ignore.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(SourceFormat::Delimited),
            "xlsx" => Some(SourceFormat::Spreadsheet),
            _ => None,
        }
    }
}

/// Picks the delimiter for a header line.
///
/// The candidate with the strictly highest count wins; on a tie the earlier
/// candidate in [`DELIMITER_CANDIDATES`] is kept. A line without any
/// candidate falls back to [`DEFAULT_DELIMITER`].
pub fn delimiter_for_line(line: &[u8]) -> u8 {
    let mut best = DEFAULT_DELIMITER;
    let mut max = 0;

    for candidate in DELIMITER_CANDIDATES {
        let count = line.iter().filter(|b| **b == candidate).count();
        if count > max {
            max = count;
            best = candidate;
        }
    }

    best
}

/// Reads only the first line of `reader` and infers its delimiter.
pub fn detect_delimiter<R: BufRead>(mut reader: R) -> io::Result<u8> {
    let mut first_line = Vec::new();
    reader.read_until(b'\n', &mut first_line)?;
    Ok(delimiter_for_line(&first_line))
}

/// CSV reader settings shared by every delimited source: no implicit header,
/// ragged rows allowed, fields trimmed.
pub fn delimited_builder(delimiter: u8) -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All);
    builder
}

/// Decodes a raw record, replacing bytes that are not valid UTF-8.
pub fn decode_record(record: &ByteRecord) -> RawRow {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

/// Renders one spreadsheet cell the way a delimited file would carry it.
///
/// Whole numbers print without a fraction so identifiers survive intact.
/// Other numbers use `,` as the decimal mark, matching the regional text
/// files, so [`Money::parse_regional`](crate::Money::parse_regional) reads them
/// back unchanged. Date cells become `YYYY-MM-DD`.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) => iso_date_prefix(s).unwrap_or_else(|| s.clone()),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    value.to_string().replace('.', ",")
}

fn iso_date_prefix(s: &str) -> Option<String> {
    let prefix = s.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()?;
    Some(prefix.to_string())
}

/// A re-openable tabular source.
#[derive(Debug, Clone)]
pub struct TabularReader {
    path: PathBuf,
    format: SourceFormat,
}

impl TabularReader {
    /// Creates a reader for `path`, failing for unsupported extensions.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format =
            SourceFormat::from_path(&path).ok_or_else(|| ExpenseError::UnsupportedFile(path.clone()))?;
        Ok(TabularReader { path, format })
    }

    /// Opens the source and returns its rows, header first.
    ///
    /// Each call starts from the beginning of the file.
    pub fn open(&self) -> Result<Rows> {
        match self.format {
            SourceFormat::Delimited => self.open_delimited(),
            SourceFormat::Spreadsheet => self.open_spreadsheet(),
        }
    }

    fn open_delimited(&self) -> Result<Rows> {
        let delimiter = detect_delimiter(BufReader::new(File::open(&self.path)?))?;

        let records = delimited_builder(delimiter)
            .from_reader(BufReader::new(File::open(&self.path)?))
            .into_byte_records();

        Ok(Rows {
            inner: RowsInner::Delimited { records, delimiter },
        })
    }

    fn open_spreadsheet(&self) -> Result<Rows> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ExpenseError::EmptyWorkbook(self.path.clone()))??;

        Ok(Rows {
            inner: RowsInner::Spreadsheet { range, next_row: 0 },
        })
    }
}

/// Row iterator returned by [`TabularReader::open`].
pub struct Rows {
    inner: RowsInner,
}

enum RowsInner {
    Delimited {
        records: ByteRecordsIntoIter<BufReader<File>>,
        delimiter: u8,
    },
    Spreadsheet {
        range: Range<Data>,
        next_row: usize,
    },
}

impl Rows {
    /// Delimiter in use, for delimited sources.
    pub fn delimiter(&self) -> Option<u8> {
        match &self.inner {
            RowsInner::Delimited { delimiter, .. } => Some(*delimiter),
            RowsInner::Spreadsheet { .. } => None,
        }
    }
}

impl Iterator for Rows {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            RowsInner::Delimited { records, .. } => {
                let record = records.next()?;
                Some(record.map(|r| decode_record(&r)).map_err(ExpenseError::from))
            }
            RowsInner::Spreadsheet { range, next_row } => {
                let (height, width) = range.get_size();
                if *next_row >= height {
                    return None;
                }
                let row = (0..width)
                    .map(|col| {
                        range
                            .get((*next_row, col))
                            .map(cell_to_string)
                            .unwrap_or_default()
                    })
                    .collect();
                *next_row += 1;
                Some(Ok(row))
            }
        }
    }
}
