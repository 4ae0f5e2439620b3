//! Backtest configuration and fail-fast validation.

use crate::domain::Bar;
use crate::execution::ExecutionConfig;
use crate::ledger::PositionSizing;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the backtest engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error(
        "insufficient history: {required} warm-up bars required, {available} bars in range"
    )]
    InsufficientHistory { required: usize, available: usize },
}

/// Configuration for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub symbol: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub initial_capital: f64,
    pub sizing: PositionSizing,
    pub execution: ExecutionConfig,
}

impl BacktestConfig {
    /// Reject bad configurations before any execution happens.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.symbol.is_empty() {
            return Err(EngineError::Validation("symbol must not be empty".into()));
        }
        if self.start_time >= self.end_time {
            return Err(EngineError::Validation(format!(
                "start time {} must precede end time {}",
                self.start_time, self.end_time
            )));
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(EngineError::Validation(format!(
                "initial capital must be positive, got {}",
                self.initial_capital
            )));
        }
        Ok(())
    }

    /// Bars inside the configured time range, in input order.
    pub fn bars_in_range<'a>(&self, bars: &'a [Bar]) -> Vec<&'a Bar> {
        bars.iter()
            .filter(|b| b.timestamp >= self.start_time && b.timestamp <= self.end_time)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> BacktestConfig {
        BacktestConfig {
            symbol: "BTC/USD".into(),
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            initial_capital: 10_000.0,
            sizing: PositionSizing::PercentOfCapital { pct: 0.5 },
            execution: ExecutionConfig::frictionless(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn inverted_time_range_fails() {
        let mut cfg = config();
        std::mem::swap(&mut cfg.start_time, &mut cfg.end_time);
        assert!(matches!(cfg.validate(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn non_positive_capital_fails() {
        let mut cfg = config();
        cfg.initial_capital = 0.0;
        assert!(matches!(cfg.validate(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn empty_symbol_fails() {
        let mut cfg = config();
        cfg.symbol.clear();
        assert!(matches!(cfg.validate(), Err(EngineError::Validation(_))));
    }
}
