//! Command line entry point for the rating ledger
//!
//! Replays a JSON script of player registrations and match operations
//! through the ledger on the in-memory backend and prints the resulting
//! players and matches as JSON.

use anyhow::{anyhow, Result};
use clap::Parser;
use rating_ledger::config::AppConfig;
use rating_ledger::metrics::LedgerMetrics;
use rating_ledger::replay::{Replay, Script};
use rating_ledger::{EloRatingModel, InMemoryStore, RatingLedger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Rating Ledger - atomic, reversible Elo updates for club match results
#[derive(Parser)]
#[command(
    name = "rating-ledger",
    version,
    about = "Replay club match results through the rating ledger",
    long_about = "Rating Ledger keeps player ratings and win/draw/loss counters consistent \
                 with the recorded matches. This tool replays a JSON script of matches, \
                 reversals, amendments and corrections and prints the resulting state."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Script to replay
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to a JSON script of ledger operations"
    )]
    script: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Initial rating override
    #[arg(long, value_name = "RATING", help = "Override the initial player rating")]
    initial_rating: Option<i32>,

    /// Continue after failed steps
    #[arg(long, help = "Log failed steps and keep replaying")]
    keep_going: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without replaying")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load and merge configuration from file, environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(initial_rating) = args.initial_rating {
        config.rating.initial_rating = initial_rating;
    }

    rating_ledger::config::validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(
        "{} v{} (initial rating {})",
        config.service.name,
        rating_ledger::VERSION,
        config.rating.initial_rating
    );

    if args.dry_run {
        info!("Configuration validation successful");
        return Ok(());
    }

    let script_path = args
        .script
        .as_ref()
        .ok_or_else(|| anyhow!("--script is required unless --dry-run is given"))?;
    let script = Script::from_path(script_path)?;

    let metrics = Arc::new(LedgerMetrics::new()?);
    let ledger = RatingLedger::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(EloRatingModel::new(config.rating.initial_rating)),
    )
    .with_metrics(metrics.clone());

    let mut replay = Replay::new(ledger, &script.players).await?;
    let failed = replay.run_all(&script.steps, args.keep_going).await?;
    if failed > 0 {
        warn!("{} of {} steps failed", failed, script.steps.len());
    }

    let report = replay.report().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(
        "Replayed {} steps: {} commits, {} reversals",
        script.steps.len(),
        metrics.operation_count("commit", "ok"),
        metrics.operation_count("reverse", "ok")
    );
    Ok(())
}
