//! Serializable run configuration (TOML-facing).

use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use simlab_core::engine::BacktestConfig;
use simlab_core::execution::ExecutionConfig;
use simlab_core::ledger::PositionSizing;
use simlab_core::signal::SignalProvider;
use std::path::Path;
use thiserror::Error;

use crate::providers::{NoSignal, SmaCross};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Default bound on persisted equity points.
fn default_max_equity_points() -> usize {
    1_000
}

/// Serializable configuration for a single backtest run.
///
/// Captures everything needed to reproduce the run; `run_id()` is a
/// content hash, so identical configs share an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub symbol: String,
    /// Start date (inclusive).
    pub start_date: NaiveDate,
    /// End date (inclusive).
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub sizing: PositionSizing,
    pub execution: ExecutionConfig,
    pub strategy: StrategyConfig,
    #[serde(default = "default_max_equity_points")]
    pub max_equity_points: usize,
}

/// Strategy selection (serializable enum over the built-in providers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Never enters; calibration baseline.
    NoEntry,
    /// Moving-average crossover.
    SmaCross {
        fast_period: usize,
        slow_period: usize,
    },
}

impl RunConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Deterministic content-addressed run id.
    pub fn run_id(&self) -> String {
        let json = serde_json::to_string(self).expect("run config serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Lower into the engine's configuration. The inclusive end date
    /// becomes an exclusive midnight bound one day later.
    pub fn to_backtest_config(&self) -> BacktestConfig {
        let start = Utc.from_utc_datetime(
            &self
                .start_date
                .and_hms_opt(0, 0, 0)
                .expect("midnight is always valid"),
        );
        let end = Utc.from_utc_datetime(
            &(self.end_date + chrono::Duration::days(1))
                .and_hms_opt(0, 0, 0)
                .expect("midnight is always valid"),
        );
        BacktestConfig {
            symbol: self.symbol.clone(),
            start_time: start,
            end_time: end,
            initial_capital: self.initial_capital,
            sizing: self.sizing,
            execution: self.execution,
        }
    }

    /// Instantiate the configured signal provider.
    pub fn build_provider(&self) -> Result<Box<dyn SignalProvider>, ConfigError> {
        match self.strategy {
            StrategyConfig::NoEntry => Ok(Box::new(NoSignal)),
            StrategyConfig::SmaCross {
                fast_period,
                slow_period,
            } => SmaCross::new(fast_period, slow_period)
                .map(|p| Box::new(p) as Box<dyn SignalProvider>)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "sma_cross requires 0 < fast_period < slow_period, \
                         got fast={fast_period} slow={slow_period}"
                    ))
                }),
        }
    }
}
