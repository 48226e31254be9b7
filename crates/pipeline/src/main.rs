//! `voldash <bars.json> [config.json]`
//!
//! Runs the volatility pipeline over a file of daily OHLCV records and writes
//! the annotated rows to stdout as JSON. Logs go to stderr.

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;
use voldash_core::Config;
use voldash_ingestion::load_table_file;
use voldash_pipeline::VolatilityPipeline;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (bars_path, config_path) = match args.as_slice() {
        [bars] => (bars, None),
        [bars, config] => (bars, Some(config)),
        _ => bail!("usage: voldash <bars.json> [config.json]"),
    };

    let config = match config_path {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => Config::default(),
    };

    let table = load_table_file(bars_path)
        .with_context(|| format!("failed to load bars from {bars_path}"))?;
    info!(rows = table.len(), path = %bars_path, "loaded input");

    let pipeline = VolatilityPipeline::new(config)?;
    let output = pipeline.run(&table)?;

    for regime in &output.summary.regimes {
        info!(label = regime.label, rows = regime.rows, means = ?regime.feature_means, "regime");
    }
    info!(dates = ?output.summary.anomaly_dates, "anomaly days");

    let rows = serde_json::to_string_pretty(&output.table.rows())?;
    println!("{rows}");
    Ok(())
}
