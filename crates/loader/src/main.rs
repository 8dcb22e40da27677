//! Loads broker open-position extracts into the trade store.

use anyhow::{bail, Context, Result};
use clap::Parser;
use positions_core::{Config, SourceConfig};
use positions_ingestion::{Normalize, NormalizedBatch, RawTable, SourceNormalizer};
use positions_store::PositionStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "positions-loader")]
#[command(about = "Normalize broker open-position extracts and load them into SQLite.", version)]
struct Cli {
    /// JSON configuration; the built-in Broker A and Broker B sources are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Database file, overriding the configuration.
    #[arg(long)]
    db: Option<PathBuf>,
    /// Directory that relative extract paths are resolved against.
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,
    /// Only load the source with this code (repeatable).
    #[arg(long = "source")]
    sources: Vec<String>,
    /// Normalize and print records as JSON lines without touching the database.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }

    let selected = select_sources(&config, &cli.sources)?;

    let mut store = if cli.dry_run {
        None
    } else {
        let path = &config.database.path;
        Some(
            PositionStore::open(path)
                .with_context(|| format!("failed to open trade store {}", path.display()))?,
        )
    };

    for source in selected {
        let batch = normalize_source(source, &cli.data_dir)?;

        match store.as_mut() {
            Some(store) => {
                let report = store
                    .load(&source.name, &batch.records)
                    .with_context(|| format!("failed to persist {}", source.name))?;
                info!(
                    trades = report.trades_inserted,
                    new_accounts = report.new_accounts,
                    new_products = report.new_products,
                    "{} loaded",
                    source.name
                );
            }
            None => print_records(&batch)?,
        }
    }

    Ok(())
}

fn select_sources<'a>(config: &'a Config, codes: &[String]) -> Result<Vec<&'a SourceConfig>> {
    if codes.is_empty() {
        return Ok(config.sources.iter().collect());
    }
    codes
        .iter()
        .map(|code| match config.source(code) {
            Some(source) => Ok(source),
            None => bail!("unknown source '{code}'"),
        })
        .collect()
}

fn normalize_source(source: &SourceConfig, data_dir: &Path) -> Result<NormalizedBatch> {
    let path = if source.file.is_absolute() {
        source.file.clone()
    } else {
        data_dir.join(&source.file)
    };
    if !path.is_file() {
        bail!("{} extract not found: {}", source.name, path.display());
    }

    let table = RawTable::from_path(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let batch = SourceNormalizer::for_source(source)
        .normalize(&table)
        .with_context(|| format!("failed to normalize {}", source.name))?;

    let stats = &batch.stats;
    if stats.coercion_misses() > 0 {
        warn!(
            source = %source.code,
            unparsed_dates = stats.unparsed_dates,
            unparsed_numbers = stats.unparsed_numbers,
            unparsed_delivery = stats.unparsed_delivery,
            unresolved_sides = stats.unresolved_sides,
            "values left empty during normalization"
        );
    }
    info!(source = %source.code, rows = stats.rows, file = %path.display(), "normalized extract");

    Ok(batch)
}

fn print_records(batch: &NormalizedBatch) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in &batch.records {
        serde_json::to_writer(&mut out, record)?;
        writeln!(out)?;
    }
    Ok(())
}
