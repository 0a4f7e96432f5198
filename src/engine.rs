//! The consolidation run.
//!
//! Walks an input tree, reads every recognized file, maps its header once,
//! normalizes its rows and feeds the accepted entries into the run's
//! consolidator. Problems with a single file never stop the run; they end up
//! in that file's [`FileSummary`].

use crate::consolidator::Consolidator;
use crate::error::{ExpenseError, Result};
use crate::exporter::write_records;
use crate::normalizer::{DiscardReason, RecordNormalizer};
use crate::operators::OperatorDirectory;
use crate::reader::{
    decode_record, delimited_builder, detect_delimiter, RawRow, SourceFormat, TabularReader,
};
use crate::schema::{ColumnRole, ColumnRoleMap};
use crate::walk::collect_files;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};

/// How processing of one file ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Header mapped; every data row was either accepted or discarded.
    Processed,
    /// Header lacks the listed roles; no row was read.
    StructuralMismatch(Vec<ColumnRole>),
    /// The file could not be opened or read.
    Failed(String),
}

/// Per-file counters.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub file: PathBuf,
    pub processed: usize,
    pub discarded: usize,
    pub discards: BTreeMap<DiscardReason, usize>,
    pub outcome: FileOutcome,
}

impl FileSummary {
    fn new(file: impl Into<PathBuf>) -> Self {
        FileSummary {
            file: file.into(),
            processed: 0,
            discarded: 0,
            discards: BTreeMap::new(),
            outcome: FileOutcome::Processed,
        }
    }

    fn failed(file: impl Into<PathBuf>, error: &ExpenseError) -> Self {
        let mut summary = Self::new(file);
        summary.outcome = FileOutcome::Failed(error.to_string());
        summary
    }

    fn discard(&mut self, reason: DiscardReason) {
        self.discarded += 1;
        *self.discards.entry(reason).or_insert(0) += 1;
    }

    /// Rows discarded for `reason`.
    pub fn discarded_for(&self, reason: DiscardReason) -> usize {
        self.discards.get(&reason).copied().unwrap_or(0)
    }

    fn discard_breakdown(&self) -> String {
        self.discards
            .iter()
            .map(|(reason, count)| format!("{}={}", reason, count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Totals over every file of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files: Vec<FileSummary>,

    /// Files under the input root with an unrecognized extension.
    pub ignored: usize,
}

impl RunSummary {
    pub fn processed_rows(&self) -> usize {
        self.files.iter().map(|f| f.processed).sum()
    }

    pub fn discarded_rows(&self) -> usize {
        self.files.iter().map(|f| f.discarded).sum()
    }

    pub fn skipped_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::StructuralMismatch(_)))
            .count()
    }

    pub fn failed_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed(_)))
            .count()
    }
}

/// Drives normalization and consolidation over many files.
pub struct ExpenseEngine {
    operators: OperatorDirectory,
    consolidator: Consolidator,
}

impl ExpenseEngine {
    pub fn new(operators: OperatorDirectory) -> Self {
        ExpenseEngine {
            operators,
            consolidator: Consolidator::new(),
        }
    }

    /// Processes every recognized file under `root`, in sorted path order.
    ///
    /// Only failing to list `root` itself is an error.
    pub fn process_tree(&mut self, root: &Path) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for path in collect_files(root)? {
            if SourceFormat::from_path(&path).is_none() {
                debug!("Ignoring {}", path.display());
                summary.ignored += 1;
                continue;
            }
            summary.files.push(self.process_file(&path));
        }

        info!(
            "Run finished: {} files ({} skipped, {} failed, {} ignored), {} rows processed, {} discarded, {} consolidated records ({} flagged)",
            summary.files.len(),
            summary.skipped_files(),
            summary.failed_files(),
            summary.ignored,
            summary.processed_rows(),
            summary.discarded_rows(),
            self.consolidator.total_records(),
            self.consolidator.flagged_records()
        );
        Ok(summary)
    }

    /// Processes one delimited or spreadsheet file.
    ///
    /// Never fails: open and read errors are reported in the summary.
    pub fn process_file(&mut self, path: &Path) -> FileSummary {
        info!("Processing {}", path.display());

        let rows = match TabularReader::new(path).and_then(|reader| reader.open()) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to open {}: {}", path.display(), e);
                return FileSummary::failed(path, &e);
            }
        };

        if let Some(delimiter) = rows.delimiter() {
            debug!("{} delimiter: {:?}", path.display(), delimiter as char);
        }

        self.process_rows(path, rows)
    }

    /// Processes delimited text from any reader, inferring the delimiter from
    /// its first line.
    pub fn process_csv<R: Read>(&mut self, reader: R) -> Result<FileSummary> {
        let mut buffered = BufReader::new(reader);
        let mut first_line = Vec::new();
        buffered.read_until(b'\n', &mut first_line)?;
        let delimiter = detect_delimiter(first_line.as_slice())?;

        let records = delimited_builder(delimiter)
            .from_reader(Cursor::new(first_line).chain(buffered))
            .into_byte_records()
            .map(|record| record.map(|r| decode_record(&r)).map_err(ExpenseError::from));

        Ok(self.process_rows("<stream>", records))
    }

    /// Processes a header row followed by data rows.
    ///
    /// Entries are collected in a partial consolidator that is merged into the
    /// run's totals once the rows are exhausted.
    pub fn process_rows<I>(&mut self, source: impl AsRef<Path>, rows: I) -> FileSummary
    where
        I: IntoIterator<Item = Result<RawRow>>,
    {
        let source = source.as_ref();
        let mut summary = FileSummary::new(source);
        let mut rows = rows.into_iter();

        let header = match rows.next() {
            Some(Ok(header)) => header,
            Some(Err(e)) => {
                warn!("Failed to read header of {}: {}", source.display(), e);
                return FileSummary::failed(source, &e);
            }
            None => Vec::new(),
        };
        debug!("{} header: {:?}", source.display(), header);

        let columns = ColumnRoleMap::from_header(&header);
        info!("{} mapping: {}", source.display(), columns);

        if !columns.is_complete() {
            let missing = columns.missing_roles();
            warn!(
                "{} lacks required columns ({}); skipping file",
                source.display(),
                missing
                    .iter()
                    .map(|r| r.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            summary.outcome = FileOutcome::StructuralMismatch(missing);
            return summary;
        }

        let normalizer = RecordNormalizer::new(&columns, &self.operators);
        let mut partial = Consolidator::new();

        for (row_idx, row) in rows.enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match row {
                Ok(row) => match normalizer.normalize(&row) {
                    Ok(entry) => {
                        partial.add_entry(&entry);
                        summary.processed += 1;
                    }
                    Err(reason) => {
                        debug!("{} row {}: discarded ({})", source.display(), row_num, reason);
                        summary.discard(reason);
                    }
                },
                Err(e) => {
                    warn!("{} row {}: {}", source.display(), row_num, e);
                    summary.discard(DiscardReason::ParseFailure);
                }
            }
        }

        self.consolidator.merge(partial);

        if summary.discarded > 0 {
            info!(
                "{}: {} processed, {} discarded ({})",
                source.display(),
                summary.processed,
                summary.discarded,
                summary.discard_breakdown()
            );
        } else {
            info!(
                "{}: {} processed, 0 discarded",
                source.display(),
                summary.processed
            );
        }

        summary
    }

    pub fn consolidator(&self) -> &Consolidator {
        &self.consolidator
    }

    /// Number of distinct operator/year/quarter records so far.
    pub fn total_records(&self) -> usize {
        self.consolidator.total_records()
    }

    /// Writes the consolidated report to `writer`.
    pub fn write_output<W: Write>(&self, writer: W) -> Result<()> {
        write_records(&self.consolidator, writer)
    }
}

impl Default for ExpenseEngine {
    fn default() -> Self {
        Self::new(OperatorDirectory::builtin())
    }
}
