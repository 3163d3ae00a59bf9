//! Command-line front end: run the peak analysis over a folder or a list
//! of files and print one row per file.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use hplc_auc::{AnalysisConfig, BatchOrchestrator, BatchProgress, BatchSummary, BatchUnit};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON array
    Json,
    /// One CSV row per file, header is the union of all keys
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "hplc-auc")]
#[command(about = "Integrate HPLC peak areas over a folder of chromatograms", long_about = None)]
struct Args {
    /// Folder to analyse (a file path selects its folder), or the files
    /// themselves with --files
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// JSON run configuration (peaks, total mode, corrections, columns)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Treat PATHS as an explicit list of files
    #[arg(long)]
    files: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnalysisConfig::from_path(path)?,
        None => AnalysisConfig::default(),
    };
    config.validate().context("invalid configuration")?;

    let orchestrator = BatchOrchestrator::from_config(&config);
    let report = |p: &BatchProgress| {
        log::info!(
            "{}/{} {} {}",
            p.current,
            p.total,
            p.filename,
            if p.success { "ok" } else { "failed" }
        );
    };

    let units = if args.files {
        orchestrator.process_files(&args.paths, report)
    } else {
        let folder: &Path = &args.paths[0];
        if args.paths.len() > 1 {
            log::warn!("batch mode uses only {}; pass --files for a file list", folder.display());
        }
        orchestrator.process_batch(folder, report)?
    };

    let summary = BatchSummary::of(&units);
    log::info!("{} of {} files succeeded", summary.succeeded, summary.total());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &units)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(&mut out, &units)?,
    }
    Ok(())
}

/// Header is every key in first-seen order; absent cells stay empty.
fn write_csv<W: Write>(out: W, units: &[BatchUnit]) -> Result<()> {
    let records: Vec<_> = units.iter().map(BatchUnit::to_record).collect();
    let mut header: Vec<String> = Vec::new();
    for rec in &records {
        for key in rec.keys() {
            if !header.iter().any(|h| h == key) {
                header.push(key.to_string());
            }
        }
    }

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&header)?;
    for rec in &records {
        writer.write_record(
            header
                .iter()
                .map(|key| rec.get(key).map(|v| v.to_string()).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    Ok(())
}
