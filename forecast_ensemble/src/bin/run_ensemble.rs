use anyhow::Context;
use clap::Parser;
use forecast_ensemble::{prepare_inputs, run_batch, DataLoader, EnsembleConfig};
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

/// Forecast every symbol in a directory and score the ensemble
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Directory with one <SYMBOL>.csv per symbol
    #[arg(short, long)]
    data_dir: PathBuf,

    /// Input files hold raw daily bars; derive the feature columns first
    #[arg(long)]
    raw_bars: bool,

    /// Write the full batch report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the performance rows as CSV
    #[arg(long)]
    records: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();
    let config = EnsembleConfig::from_toml_file(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    let loaded = DataLoader::from_dir(&cli.data_dir)
        .with_context(|| format!("reading symbols from {}", cli.data_dir.display()))?;
    let (symbols, unreadable) = prepare_inputs(loaded, cli.raw_bars.then_some(&config.features));
    info!(
        symbols = symbols.len(),
        unreadable = unreadable.len(),
        "starting batch"
    );

    let batch = run_batch(&symbols, &config).with_skipped(unreadable);

    println!("{} forecast, {} skipped", batch.reports.len(), batch.skipped.len());
    for record in batch.records() {
        println!("{}", record);
    }
    for skipped in &batch.skipped {
        println!("skipped {}: {}", skipped.symbol, skipped.reason);
    }

    if let Some(path) = &cli.output {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(file, &batch)?;
        info!(path = %path.display(), "batch report written");
    }

    if let Some(path) = &cli.records {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        for record in batch.records() {
            writer.serialize(record)?;
        }
        writer.flush()?;
        info!(path = %path.display(), "performance records written");
    }

    Ok(())
}
