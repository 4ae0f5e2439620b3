//! The deterministic bar-by-bar fold at the heart of backtesting.
//!
//! Per bar, in timestamp order: evaluate the external signal provider,
//! execute any resulting trades through the simulator into the ledger,
//! mark to market, append an equity point, and advance progress by one
//! unit. Validation happens before the loop; nothing executes on a bad
//! configuration.

use crate::domain::{Bar, SignalType, TradeOrder};
use crate::equity::EquityPoint;
use crate::execution::ExecutionSimulator;
use crate::ledger::{Ledger, LedgerError};
use crate::signal::SignalProvider;
use std::collections::HashMap;

use super::config::{BacktestConfig, EngineError};
use super::progress::ProgressSink;
use super::result::BacktestRunResult;

/// A gap is flagged when the spacing between consecutive bars exceeds the
/// median spacing by this factor.
const GAP_FACTOR: f64 = 1.5;

/// Run one backtest to completion.
///
/// Fails fast on an invalid configuration, unordered bars, or a dataset
/// shorter than the provider's warm-up requirement. Timestamp gaps are
/// logged and reported as warnings but never abort the run.
pub fn run_backtest(
    provider: &mut dyn SignalProvider,
    bars: &[Bar],
    config: &BacktestConfig,
    progress: &dyn ProgressSink,
) -> Result<BacktestRunResult, EngineError> {
    config.validate()?;

    let bars: Vec<Bar> = config.bars_in_range(bars).into_iter().cloned().collect();
    if bars.is_empty() {
        return Err(EngineError::Validation(
            "no bars in configured time range".into(),
        ));
    }
    if bars.windows(2).any(|w| w[0].timestamp >= w[1].timestamp) {
        return Err(EngineError::Validation(
            "bars must be strictly ascending by timestamp".into(),
        ));
    }

    let warmup_bars = provider.warmup_bars();
    if bars.len() <= warmup_bars {
        return Err(EngineError::InsufficientHistory {
            required: warmup_bars,
            available: bars.len(),
        });
    }

    let mut ledger = Ledger::new(config.initial_capital, config.sizing)
        .map_err(|e| EngineError::Validation(e.to_string()))?;
    let mut simulator = ExecutionSimulator::new(config.execution);

    let warnings = detect_gaps(&bars, &config.symbol);

    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut trades = Vec::new();
    let side = provider.direction();

    for (t, bar) in bars.iter().enumerate() {
        if t >= warmup_bars {
            let decision = provider.evaluate(&bars, t);

            // Close-outs run before entries: a liquidation decision always
            // wins the bar over a fresh entry.
            if decision.wants_close() && ledger.has_open_position(&config.symbol) {
                let signal_type = if decision.stop {
                    SignalType::Stop
                } else {
                    SignalType::Exit
                };
                let open: Vec<_> = ledger
                    .open_positions_for_symbol(&config.symbol)
                    .map(|p| (p.id, p.quantity))
                    .collect();
                for (id, quantity) in open {
                    let order =
                        TradeOrder::new(&config.symbol, side, quantity, signal_type);
                    match simulator.execute(&order, bar.close, bar.timestamp) {
                        Ok(trade) => {
                            match ledger.close_position(id, trade.execution_price, bar.timestamp)
                            {
                                Ok(_) => {
                                    let _ = ledger.debit_fee(trade.fee);
                                    trades.push(trade);
                                }
                                Err(err) => {
                                    tracing::warn!(position = %id, %err, "close failed");
                                }
                            }
                        }
                        Err(err) => {
                            tracing::warn!(%err, "close-out execution rejected");
                        }
                    }
                }
            }

            if decision.entry && !ledger.has_open_position(&config.symbol) {
                match try_open(&mut ledger, &mut simulator, config, side, bar) {
                    Ok(trade) => trades.push(trade),
                    Err(err) => {
                        // Recoverable: the trade is rejected, the ledger is
                        // untouched, and the run continues.
                        tracing::warn!(bar = t, %err, "entry rejected");
                    }
                }
            }
        }

        let mut prices = HashMap::new();
        prices.insert(config.symbol.clone(), bar.close);
        ledger.mark_to_market(&prices);

        equity_curve.push(EquityPoint::new(bar.timestamp, ledger.calculate_equity()));
        progress.advance(t as u64 + 1);
    }

    let final_equity = equity_curve
        .last()
        .map(|p| p.value)
        .unwrap_or(config.initial_capital);

    Ok(BacktestRunResult {
        equity_curve,
        trades,
        closed_positions: ledger.closed_positions().to_vec(),
        summary: ledger.summary(),
        final_equity,
        bar_count: bars.len(),
        warmup_bars,
        warnings,
    })
}

fn try_open(
    ledger: &mut Ledger,
    simulator: &mut ExecutionSimulator,
    config: &BacktestConfig,
    side: crate::domain::PositionSide,
    bar: &Bar,
) -> Result<crate::domain::ExecutedTrade, LedgerError> {
    let quantity = ledger.derive_quantity(bar.close);
    let order = TradeOrder::new(&config.symbol, side, quantity, SignalType::Entry);
    let trade = simulator
        .execute(&order, bar.close, bar.timestamp)
        .map_err(|e| LedgerError::InvalidInput(e.to_string()))?;

    // Reject up front so a failed entry leaves the ledger untouched.
    let required = trade.gross_value() + trade.fee;
    if required > ledger.available_capital {
        return Err(LedgerError::InsufficientCapital {
            required,
            available: ledger.available_capital,
        });
    }

    ledger.open_position(
        &config.symbol,
        side,
        trade.execution_price,
        bar.timestamp,
        Some(quantity),
    )?;
    ledger.debit_fee(trade.fee)?;
    Ok(trade)
}

/// Flag spacing anomalies between consecutive bars.
///
/// Uses the median spacing as the expected cadence; anything beyond
/// `GAP_FACTOR` times that is reported. Needs at least three bars to have
/// a meaningful baseline.
fn detect_gaps(bars: &[Bar], symbol: &str) -> Vec<String> {
    if bars.len() < 3 {
        return Vec::new();
    }
    let mut deltas: Vec<i64> = bars
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
        .collect();
    deltas.sort_unstable();
    let median = deltas[deltas.len() / 2] as f64;
    if median <= 0.0 {
        return Vec::new();
    }

    let mut warnings = Vec::new();
    for w in bars.windows(2) {
        let delta = (w[1].timestamp - w[0].timestamp).num_seconds() as f64;
        if delta > median * GAP_FACTOR {
            let msg = format!(
                "{symbol}: timestamp gap between {} and {} ({}s, expected ~{}s)",
                w[0].timestamp, w[1].timestamp, delta as i64, median as i64
            );
            tracing::warn!("{msg}");
            warnings.push(msg);
        }
    }
    warnings
}
