//! Backtest orchestration around the simulation core.
//!
//! - `progress` — ephemeral high-frequency progress table + staleness sweep
//! - `providers` — built-in implementations of the signal contract
//! - `config` — TOML run configuration with content-addressed run ids
//! - `service` — bounded-concurrency backtest execution
//! - `metrics` — pure performance statistics
//! - `data` / `export` — CSV bars in, JSON/CSV artifacts out

pub mod config;
pub mod data;
pub mod export;
pub mod metrics;
pub mod progress;
pub mod providers;
pub mod service;

pub use config::{ConfigError, RunConfig, StrategyConfig};
pub use data::load_bars_csv;
pub use export::{save_report, write_equity_csv, write_trades_csv};
pub use metrics::PerformanceMetrics;
pub use progress::{ProgressError, ProgressRecord, ProgressReporter, ProgressSweeper};
pub use service::{BacktestReport, BacktestService, ServiceError};
