//! Expense Consolidator CLI
//!
//! Expands downloaded statement archives (optional), consolidates every
//! statement file under the input directory and writes the report plus its
//! archive.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --downloads-dir ./downloads --input-dir ./extracted --output-dir ./out
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity
//!   (default `info`)

use clap::Parser;
use expense_consolidator::{archive, ExpenseEngine, Exporter, OperatorDirectory, Result};
use log::{info, warn};
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(
    name = "expense-consolidator",
    version,
    about = "Consolidate quarterly operator expenses from regulator statement files"
)]
struct Cli {
    /// Directory tree holding the statement files (.csv, .txt, .xlsx)
    #[arg(long, default_value = "./extracted")]
    input_dir: PathBuf,

    /// Directory of downloaded .zip archives to expand into --input-dir first
    #[arg(long)]
    downloads_dir: Option<PathBuf>,

    /// Where the consolidated CSV and its archive are written
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Operator registry file (Registro_ANS / Razao_Social columns)
    #[arg(long)]
    operators: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let exporter = Exporter::new(&cli.output_dir);
    exporter.prepare()?;

    let operators = match &cli.operators {
        Some(path) => OperatorDirectory::load(path)?,
        None => OperatorDirectory::builtin(),
    };

    if let Some(downloads) = &cli.downloads_dir {
        archive::expand_all(downloads, &cli.input_dir)?;
    }

    let mut engine = ExpenseEngine::new(operators);
    if cli.input_dir.is_dir() {
        engine.process_tree(&cli.input_dir)?;
    } else {
        warn!(
            "Input directory {} does not exist; writing an empty report",
            cli.input_dir.display()
        );
    }
    info!("Consolidated records: {}", engine.total_records());

    let csv_path = exporter.serialize(engine.consolidator())?;
    let archive_path = exporter.package(&csv_path)?;
    info!("Report ready: {}", archive_path.display());

    Ok(())
}
