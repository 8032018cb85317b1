use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use iv_forecast::config::{Config, LoggingConfig, DEFAULT_CONFIG_PATH};
use iv_forecast::pipeline::Pipeline;

#[derive(Debug, Parser)]
#[command(
    name = "iv-forecast",
    version,
    about = "Next-day return forecasts from price and implied volatility"
)]
struct Cli {
    /// Path to the TOML config.
    #[arg(long, env = "IV_FORECAST_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch prices, merge the IV feed and rewrite each feature table.
    Backfill,
    /// Fit and record a forecast per asset from the stored feature tables.
    Forecast,
    /// Score logged forecasts against realized returns.
    Evaluate,
    /// Backfill, forecast and evaluate in sequence.
    Run,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        logging
            .level
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_from_path(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    init_tracing(&config.logging);

    let pipeline = Pipeline::from_config(config).context("failed to build pipeline")?;
    tracing::info!(symbols = ?pipeline.symbols(), command = ?cli.command, "starting");

    match cli.command {
        Command::Backfill => {
            let summaries = pipeline.backfill_all().await;
            let failed = summaries.iter().filter(|s| !s.is_ok()).count();
            tracing::info!(assets = summaries.len(), failed, "backfill finished");
        }
        Command::Forecast => {
            let batch = pipeline.forecast_all().await?;
            let ok = batch.assets.iter().filter(|r| r.is_ok()).count();
            tracing::info!(assets = batch.assets.len(), ok, "forecast finished");
        }
        Command::Evaluate => {
            let reports = pipeline.evaluate_all().await?;
            tracing::info!(assets = reports.len(), "evaluation finished");
        }
        Command::Run => {
            let summary = pipeline.run().await?;
            tracing::info!(
                backfilled = summary.backfill.iter().filter(|s| s.is_ok()).count(),
                forecasts = summary.forecasts.assets.len(),
                evaluated = summary.metrics.len(),
                "run finished"
            );
        }
    }
    Ok(())
}
