//! Order-execution simulation: slippage, fees, and batch fills.
//!
//! Fee convention: realized P&L is always derived from `execution_price`
//! (post-slippage, pre-fee) and subtracts `fee` exactly once.  `net_price`
//! folds the fee into a per-unit cost for reporting and is never fed back
//! into P&L.

use crate::domain::{ExecutedTrade, IdGen, SignalType, TradeOrder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from execution simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no price available for symbol '{0}'")]
    MissingPrice(String),
}

/// Slippage and fee parameters, both expressed as fractions (0.001 = 0.1%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub slippage_pct: f64,
    pub fee_pct: f64,
}

impl ExecutionConfig {
    pub fn new(slippage_pct: f64, fee_pct: f64) -> Result<Self, ExecutionError> {
        if !slippage_pct.is_finite() || slippage_pct < 0.0 {
            return Err(ExecutionError::InvalidInput(format!(
                "slippage_pct must be non-negative, got {slippage_pct}"
            )));
        }
        if !fee_pct.is_finite() || fee_pct < 0.0 {
            return Err(ExecutionError::InvalidInput(format!(
                "fee_pct must be non-negative, got {fee_pct}"
            )));
        }
        Ok(Self {
            slippage_pct,
            fee_pct,
        })
    }

    /// Zero-cost execution, useful in tests and calibration runs.
    pub fn frictionless() -> Self {
        Self {
            slippage_pct: 0.0,
            fee_pct: 0.0,
        }
    }
}

/// An order that could not be executed, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedOrder {
    pub order: TradeOrder,
    pub reason: ExecutionError,
}

/// Outcome of a batch execution: every order either fills or is returned
/// with its failure reason. A batch never aborts on a single bad order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchOutcome {
    pub executed: Vec<ExecutedTrade>,
    pub failed: Vec<FailedOrder>,
}

/// Turns desired trades into realistic fills.
///
/// Owns the execution parameters and a deterministic trade-id counter, so
/// identical order streams produce identical trade sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSimulator {
    config: ExecutionConfig,
    id_gen: IdGen,
}

impl ExecutionSimulator {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            config,
            id_gen: IdGen::default(),
        }
    }

    pub fn config(&self) -> ExecutionConfig {
        self.config
    }

    /// Execute one order against a reference price.
    ///
    /// Buys fill at `reference * (1 + slippage_pct)`, sells at
    /// `reference * (1 - slippage_pct)`; the fee is a fraction of the gross
    /// fill value.
    pub fn execute(
        &mut self,
        order: &TradeOrder,
        reference_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<ExecutedTrade, ExecutionError> {
        validate_order(order)?;
        if !reference_price.is_finite() || reference_price <= 0.0 {
            return Err(ExecutionError::InvalidInput(format!(
                "reference price must be positive, got {reference_price}"
            )));
        }

        let execution_price = if order.is_buy() {
            reference_price * (1.0 + self.config.slippage_pct)
        } else {
            reference_price * (1.0 - self.config.slippage_pct)
        };
        let slippage_amount = (execution_price - reference_price).abs();
        let gross_value = execution_price * order.quantity;
        let fee = gross_value * self.config.fee_pct;
        let net_price = execution_price + fee / order.quantity;

        Ok(ExecutedTrade {
            trade_id: self.id_gen.next_trade_id(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            execution_price,
            signal_type: order.signal_type,
            slippage_amount,
            fee,
            net_price,
            timestamp,
        })
    }

    /// Execute every order that has a price available.
    ///
    /// Orders with no price in `prices`, or failing validation, land in
    /// `failed` paired with the reason; the rest still execute.
    pub fn execute_batch(
        &mut self,
        orders: &[TradeOrder],
        prices: &HashMap<String, f64>,
        timestamp: DateTime<Utc>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for order in orders {
            let Some(&price) = prices.get(&order.symbol) else {
                outcome.failed.push(FailedOrder {
                    order: order.clone(),
                    reason: ExecutionError::MissingPrice(order.symbol.clone()),
                });
                continue;
            };
            match self.execute(order, price, timestamp) {
                Ok(trade) => outcome.executed.push(trade),
                Err(reason) => outcome.failed.push(FailedOrder {
                    order: order.clone(),
                    reason,
                }),
            }
        }
        outcome
    }
}

/// Trade-level P&L under the single-fee convention.
///
/// An entry trade costs its fee; an exit or stop trade, given the
/// position's entry price, realizes the side-aware price difference from
/// `execution_price` minus its own fee. The entry fee was already charged
/// on the entry trade, so nothing is counted twice.
pub fn calculate_trade_pnl(trade: &ExecutedTrade, entry_price: Option<f64>) -> f64 {
    match trade.signal_type {
        SignalType::Entry => -trade.fee,
        SignalType::Exit | SignalType::Stop => {
            let Some(entry) = entry_price else {
                return -trade.fee;
            };
            trade
                .side
                .price_pnl(entry, trade.execution_price, trade.quantity)
                - trade.fee
        }
    }
}

fn validate_order(order: &TradeOrder) -> Result<(), ExecutionError> {
    if order.symbol.is_empty() {
        return Err(ExecutionError::InvalidInput(
            "order symbol must not be empty".into(),
        ));
    }
    if !order.quantity.is_finite() || order.quantity <= 0.0 {
        return Err(ExecutionError::InvalidInput(format!(
            "order quantity must be positive, got {}",
            order.quantity
        )));
    }
    Ok(())
}
