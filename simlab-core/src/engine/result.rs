//! Result of a complete backtest run.

use crate::domain::{ClosedPosition, ExecutedTrade};
use crate::equity::EquityPoint;
use crate::ledger::LedgerSummary;
use serde::{Deserialize, Serialize};

/// Everything a backtest produces. Given identical bars, signals, and
/// configuration, every field except opaque ids is identical run to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRunResult {
    /// Equity at each processed bar close, full resolution.
    pub equity_curve: Vec<EquityPoint>,
    /// Every simulated fill, in execution order.
    pub trades: Vec<ExecutedTrade>,
    /// Completed round trips, in close order.
    pub closed_positions: Vec<ClosedPosition>,
    /// Final ledger aggregates.
    pub summary: LedgerSummary,
    pub final_equity: f64,
    pub bar_count: usize,
    pub warmup_bars: usize,
    /// Data-quality warnings (timestamp gaps); never fatal.
    pub warnings: Vec<String>,
}

impl BacktestRunResult {
    pub fn trade_count(&self) -> usize {
        self.closed_positions.len()
    }
}
