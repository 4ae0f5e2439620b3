//! simlab CLI — backtests from TOML configs and demo paper sessions.
//!
//! Commands:
//! - `backtest` — run a strategy over CSV bars and save artifacts
//! - `paper` — drive a paper-trading session against a simulated
//!   random-walk feed, then print the final metrics

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt;

use simlab_core::domain::{PositionSide, SignalType};
use simlab_core::execution::ExecutionConfig;
use simlab_core::ledger::PositionSizing;
use simlab_live::{
    ChannelFeed, JsonFileStore, LiveSignal, MarketTick, SessionConfig, SessionRegistry,
};
use simlab_runner::{
    load_bars_csv, save_report, write_equity_csv, write_trades_csv, BacktestService,
    ProgressReporter, RunConfig,
};

#[derive(Parser)]
#[command(name = "simlab", about = "Strategy evaluation: backtesting and paper trading")]
struct Cli {
    /// Log verbosity level.
    #[arg(short, long, default_value = "info")]
    verbosity: Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest from a TOML config file over CSV bars.
    Backtest {
        /// Path to the TOML run configuration.
        #[arg(long)]
        config: PathBuf,

        /// Path to the CSV bar data (timestamp,open,high,low,close,volume).
        #[arg(long)]
        data: PathBuf,

        /// Output directory for result artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Maximum concurrent backtests in this process.
        #[arg(long, default_value_t = 4)]
        max_concurrent: usize,
    },
    /// Run a demo paper-trading session against a random-walk feed.
    Paper {
        /// Trading pair for the session.
        #[arg(long, default_value = "BTC/USD")]
        symbol: String,

        /// Initial paper capital.
        #[arg(long, default_value_t = 10_000.0)]
        capital: f64,

        /// Starting price of the simulated feed.
        #[arg(long, default_value_t = 50_000.0)]
        price: f64,

        /// How long to run, in seconds.
        #[arg(long, default_value_t = 10)]
        duration_secs: u64,

        /// Directory for session snapshots.
        #[arg(long, default_value = "sessions")]
        state_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let subscriber = fmt().with_max_level(cli.verbosity).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set subscriber")?;

    match cli.command {
        Commands::Backtest {
            config,
            data,
            output_dir,
            max_concurrent,
        } => run_backtest_command(&config, &data, &output_dir, max_concurrent),
        Commands::Paper {
            symbol,
            capital,
            price,
            duration_secs,
            state_dir,
        } => run_paper_command(symbol, capital, price, duration_secs, state_dir).await,
    }
}

fn run_backtest_command(
    config_path: &PathBuf,
    data_path: &PathBuf,
    output_dir: &PathBuf,
    max_concurrent: usize,
) -> Result<()> {
    let config = RunConfig::load(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    let bars = load_bars_csv(data_path)
        .with_context(|| format!("loading bars from {}", data_path.display()))?;
    tracing::info!(bars = bars.len(), symbol = %config.symbol, "data loaded");

    let service = BacktestService::new(max_concurrent, Arc::new(ProgressReporter::new()))?;
    let report = service.run(&config, &bars)?;

    let json_path = save_report(&report, output_dir)?;
    write_trades_csv(&report.result.trades, &output_dir.join("trades.csv"))?;
    write_equity_csv(&report.equity_curve, &output_dir.join("equity.csv"))?;

    println!("run id:        {}", report.run_id);
    println!("bars:          {}", report.result.bar_count);
    println!("trades:        {}", report.metrics.trade_count);
    println!("total return:  {:.2}%", report.metrics.total_return * 100.0);
    println!("max drawdown:  {:.2}%", report.metrics.max_drawdown * 100.0);
    println!("win rate:      {:.1}%", report.metrics.win_rate * 100.0);
    println!("final equity:  {:.2}", report.result.final_equity);
    for warning in &report.result.warnings {
        println!("warning:       {warning}");
    }
    println!("artifacts:     {}", json_path.display());
    Ok(())
}

async fn run_paper_command(
    symbol: String,
    capital: f64,
    start_price: f64,
    duration_secs: u64,
    state_dir: PathBuf,
) -> Result<()> {
    let feed = Arc::new(ChannelFeed::new(256));
    let store = Arc::new(JsonFileStore::new(state_dir));
    let registry = SessionRegistry::new();

    let session_id = format!("paper-{}", std::process::id());
    let handle = registry.start_session(
        SessionConfig {
            session_id: session_id.clone(),
            strategy: "demo-momentum".into(),
            symbol: symbol.clone(),
            initial_capital: capital,
            sizing: PositionSizing::PercentOfCapital { pct: 0.25 },
            execution: ExecutionConfig::new(0.0005, 0.001)?,
            snapshot_interval: Duration::from_secs(2),
        },
        feed.clone(),
        store,
    )?;
    tracing::info!(session = %session_id, %symbol, "paper session started");

    // Random-walk publisher standing in for a real market feed.
    let publisher_symbol = symbol.clone();
    let publisher_feed = Arc::clone(&feed);
    let publisher = tokio::spawn(async move {
        let mut price = start_price;
        loop {
            let step: f64 = rand::thread_rng().gen_range(-0.002..0.002);
            price *= 1.0 + step;
            publisher_feed.publish(MarketTick {
                symbol: publisher_symbol.clone(),
                price,
                timestamp: chrono::Utc::now(),
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    // Naive demo driver: try to enter every second, flatten every fifth.
    // Entries while a position is open are ignored by session policy.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(duration_secs);
    let mut second = 0u64;
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_secs(1)).await;
        second += 1;
        let signal = if second % 5 == 0 {
            LiveSignal {
                signal_type: SignalType::Exit,
                side: PositionSide::Long,
            }
        } else {
            LiveSignal {
                signal_type: SignalType::Entry,
                side: PositionSide::Long,
            }
        };
        if handle.signal(signal).await.is_err() {
            break;
        }
    }

    publisher.abort();
    let metrics = registry.stop_session(&session_id).await?;

    println!("session:        {}", metrics.session_id);
    println!("status:         {:?}", metrics.status);
    println!("trades:         {}", metrics.trade_count);
    println!("realized pnl:   {:.2}", metrics.total_realized_pnl);
    println!("fees paid:      {:.2}", metrics.total_fees);
    println!("final equity:   {:.2}", metrics.equity);
    Ok(())
}
