//! Canonical output: one delimited file plus a single-entry archive.

use crate::consolidator::{ConsolidatedRecord, Consolidator};
use crate::error::{ExpenseError, Result};
use crate::money::Money;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use log::info;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Fixed header line of the output file.
pub const HEADER: [&str; 6] = [
    "CNPJ",
    "RazaoSocial",
    "Trimestre",
    "Ano",
    "ValorDespesas",
    "Status",
];

pub const DEFAULT_CSV_NAME: &str = "consolidado_despesas.csv";
pub const DEFAULT_ARCHIVE_NAME: &str = "consolidado_despesas.zip";

/// One output line. Field order is the column order.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    operator_id: &'a str,
    name: String,
    quarter: u8,
    year: i32,
    amount: Money,
    status: &'static str,
}

impl<'a> From<&'a ConsolidatedRecord> for ExportRow<'a> {
    fn from(record: &'a ConsolidatedRecord) -> Self {
        ExportRow {
            operator_id: &record.operator_id,
            // Fields are never quoted, so a comma would shift the columns.
            name: record.operator_name.replace(',', " "),
            quarter: record.quarter,
            year: record.year,
            amount: record.amount,
            status: record.status.as_str(),
        }
    }
}

/// Writes the header and every record, in key order, to `writer`.
///
/// Amounts carry exactly two decimals. Nothing is quoted; every line has six
/// fields.
pub fn write_records<W: Write>(consolidator: &Consolidator, writer: W) -> Result<()> {
    let mut csv_writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);

    csv_writer.write_record(HEADER)?;
    for record in consolidator.records() {
        csv_writer.serialize(ExportRow::from(record))?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Places the output file and its archive in one directory.
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
    csv_name: String,
    archive_name: String,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Exporter {
            output_dir: output_dir.into(),
            csv_name: DEFAULT_CSV_NAME.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
        }
    }

    /// Overrides the output file names.
    pub fn with_names(mut self, csv_name: impl Into<String>, archive_name: impl Into<String>) -> Self {
        self.csv_name = csv_name.into();
        self.archive_name = archive_name.into();
        self
    }

    pub fn csv_path(&self) -> PathBuf {
        self.output_dir.join(&self.csv_name)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(&self.archive_name)
    }

    /// Creates the output directory. Failure here aborts the run.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).map_err(|source| ExpenseError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })
    }

    /// Writes the consolidated file and returns its path.
    pub fn serialize(&self, consolidator: &Consolidator) -> Result<PathBuf> {
        self.prepare()?;
        let path = self.csv_path();
        let file = File::create(&path)?;
        write_records(consolidator, BufWriter::new(file))?;

        info!(
            "Wrote {} records to {}",
            consolidator.total_records(),
            path.display()
        );
        Ok(path)
    }

    /// Wraps `csv_path` as the only entry of the archive, named after the
    /// file's base name.
    pub fn package(&self, csv_path: &Path) -> Result<PathBuf> {
        self.prepare()?;
        let entry_name = csv_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.csv_name.clone());

        let archive_path = self.archive_path();
        let mut zip = ZipWriter::new(File::create(&archive_path)?);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(entry_name, options)?;
        io::copy(&mut File::open(csv_path)?, &mut zip)?;
        zip.finish()?;

        info!("Packaged {} into {}", csv_path.display(), archive_path.display());
        Ok(archive_path)
    }
}
