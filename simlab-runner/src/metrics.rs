//! Performance metrics — pure functions that compute run statistics.
//!
//! Every metric is a pure function: equity curve and/or closed positions
//! in, scalar out. No dependencies on the service or the engine.

use serde::{Deserialize, Serialize};
use simlab_core::domain::ClosedPosition;
use simlab_core::equity::EquityPoint;

/// Bars per year used for annualization, assuming daily bars.
const PERIODS_PER_YEAR: f64 = 252.0;

/// Aggregate performance metrics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
}

impl PerformanceMetrics {
    pub fn compute(equity_curve: &[EquityPoint], closed: &[ClosedPosition]) -> Self {
        let values: Vec<f64> = equity_curve.iter().map(|p| p.value).collect();
        Self {
            total_return: total_return(&values),
            max_drawdown: max_drawdown(&values),
            sharpe: sharpe_ratio(&values),
            win_rate: win_rate(closed),
            profit_factor: profit_factor(closed),
            trade_count: closed.len(),
        }
    }
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity: &[f64]) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let initial = equity[0];
    if initial <= 0.0 {
        return 0.0;
    }
    (equity[equity.len() - 1] - initial) / initial
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity: &[f64]) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let mut peak = equity[0];
    let mut max_dd = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (value - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Annualized Sharpe ratio from per-bar returns, zero risk-free rate.
///
/// Returns 0.0 when variance is zero or fewer than two bars exist.
pub fn sharpe_ratio(equity: &[f64]) -> f64 {
    if equity.len() < 3 {
        return 0.0;
    }
    let returns: Vec<f64> = equity
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std = variance.sqrt();
    if std < 1e-15 {
        return 0.0;
    }
    mean / std * PERIODS_PER_YEAR.sqrt()
}

/// Fraction of closed positions with positive realized P&L.
pub fn win_rate(closed: &[ClosedPosition]) -> f64 {
    if closed.is_empty() {
        return 0.0;
    }
    let winners = closed.iter().filter(|c| c.is_winner()).count();
    winners as f64 / closed.len() as f64
}

/// Gross profits / gross losses, capped at 100 when there are no losses.
pub fn profit_factor(closed: &[ClosedPosition]) -> f64 {
    if closed.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = closed
        .iter()
        .filter(|c| c.realized_pnl > 0.0)
        .map(|c| c.realized_pnl)
        .sum();
    let gross_loss: f64 = closed
        .iter()
        .filter(|c| c.realized_pnl < 0.0)
        .map(|c| c.realized_pnl.abs())
        .sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}
