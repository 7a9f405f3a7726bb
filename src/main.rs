use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use trendbot::backtest::{save_artifacts, sub_bars_for, BacktestRunner, SyntheticDataGenerator};
use trendbot::data::load_backtest_bars;
use trendbot::execution::{run_live, PaperBroker};
use trendbot::strategy::BreakoutStrategy;
use trendbot::AppConfig;

const DEFAULT_CONFIG: &str = "config/default.toml";

#[derive(Parser)]
#[command(
    name = "trendbot",
    about = "Volatility-targeted breakout trading for a single futures contract"
)]
struct Cli {
    /// Path to a TOML config file. Missing default file falls back to built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate the strategy over a historical (or synthetic) minute-bar table.
    Backtest {
        /// Output directory for equity_curve.csv and metrics.json. Defaults to backtest.artifacts_dir.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Reconcile a live account against the strategy target until Ctrl+C.
    Live {
        /// Trade against the in-process paper broker fed with synthetic sub-bars.
        #[arg(long, default_value_t = false)]
        paper: bool,

        /// Synthetic sessions to replay in paper mode.
        #[arg(long, default_value_t = 2)]
        days: usize,

        /// Delay between replayed sub-bars in milliseconds.
        #[arg(long, default_value_t = 0)]
        sub_bar_delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Backtest { output } => run_backtest(&config, output),
        Commands::Live {
            paper,
            days,
            sub_bar_delay_ms,
        } => run_live_session(&config, paper, days, sub_bar_delay_ms).await,
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trendbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let (path, required) = match path {
        Some(p) => (p.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    AppConfig::load(&path, required)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

fn run_backtest(config: &AppConfig, output: Option<PathBuf>) -> Result<()> {
    let bars = load_backtest_bars(config).context("failed to load minute bars")?;

    let strategy = BreakoutStrategy::from_config(&config.strategy);
    let runner = BacktestRunner::from_config(config)?;
    let result = runner.run(&strategy, &bars)?;

    result.summary.print_report();

    let dir = output.unwrap_or_else(|| PathBuf::from(&config.backtest.artifacts_dir));
    let (equity_path, metrics_path) = save_artifacts(&result, &dir)
        .with_context(|| format!("failed to write artifacts to {}", dir.display()))?;

    println!("\nArtifacts saved to:");
    println!("  {}", equity_path.display());
    println!("  {}", metrics_path.display());
    Ok(())
}

async fn run_live_session(
    config: &AppConfig,
    paper: bool,
    days: usize,
    sub_bar_delay_ms: u64,
) -> Result<()> {
    if !paper {
        anyhow::bail!(
            "only paper trading is available; rerun with `trendbot live --paper` \
             (broker {}:{} client {} not supported)",
            config.broker.host,
            config.broker.port,
            config.broker.client_id
        );
    }

    // First session seeds history, the rest is streamed as 5-second sub-bars
    let bars = SyntheticDataGenerator::new(7).minute_bars_for_days(days.max(2));
    let split = (bars.len() / 2).min(config.broker.history_bars);
    let (history, stream) = bars.split_at(split);

    let broker = PaperBroker::for_symbol(&config.market.symbol, &config.market.exchange)
        .with_history(history.to_vec())
        .with_sub_bars(sub_bars_for(stream, 12), Duration::from_millis(sub_bar_delay_ms));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    tracing::info!(
        symbol = %config.market.symbol,
        history = history.len(),
        streamed = stream.len(),
        "Starting paper live session"
    );

    let stats = run_live(broker, config, shutdown_rx).await?;

    println!("\n| Live stat        | Value |");
    println!("|------------------|-------|");
    println!("| bars_seen        | {:>5} |", stats.bars_seen);
    println!("| orders_submitted | {:>5} |", stats.orders_submitted);
    println!("| errors           | {:>5} |", stats.errors);
    Ok(())
}
