//! Capital and position accounting.
//!
//! The ledger owns every open position and the ordered history of closed
//! ones. Accounting identities that hold after every operation:
//! - `available_capital >= 0.0`
//! - `equity == available_capital + total_unrealized_pnl`
//! - `total_realized_pnl == sum(closed.realized_pnl)`
//!
//! A failed operation leaves the ledger untouched.

use crate::domain::{ClosedPosition, IdGen, Position, PositionId, PositionSide};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from ledger operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("insufficient capital: required {required:.2}, available {available:.2}")]
    InsufficientCapital { required: f64, available: f64 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("position {0} not found")]
    PositionNotFound(PositionId),
}

/// How entry quantity is derived when the caller does not supply one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PositionSizing {
    /// Allocate a fraction of *available capital* (not total equity) at
    /// entry time: `quantity = available_capital * pct / price`.
    PercentOfCapital { pct: f64 },
    /// Always trade a fixed quantity.
    FixedQuantity { quantity: f64 },
}

impl PositionSizing {
    fn validate(&self) -> Result<(), LedgerError> {
        match *self {
            PositionSizing::PercentOfCapital { pct } => {
                if !pct.is_finite() || pct <= 0.0 || pct > 1.0 {
                    return Err(LedgerError::InvalidInput(format!(
                        "sizing percentage must be in (0, 1], got {pct}"
                    )));
                }
            }
            PositionSizing::FixedQuantity { quantity } => {
                if !quantity.is_finite() || quantity <= 0.0 {
                    return Err(LedgerError::InvalidInput(format!(
                        "fixed sizing quantity must be positive, got {quantity}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Capital/position ledger. Serde round-trips losslessly, which is what
/// live-session checkpointing relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub initial_capital: f64,
    pub available_capital: f64,
    open_positions: HashMap<PositionId, Position>,
    closed_positions: Vec<ClosedPosition>,
    pub total_realized_pnl: f64,
    pub total_unrealized_pnl: f64,
    pub total_fees: f64,
    sizing: PositionSizing,
    id_gen: IdGen,
}

impl Ledger {
    pub fn new(initial_capital: f64, sizing: PositionSizing) -> Result<Self, LedgerError> {
        if !initial_capital.is_finite() || initial_capital <= 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "initial capital must be positive, got {initial_capital}"
            )));
        }
        sizing.validate()?;
        Ok(Self {
            initial_capital,
            available_capital: initial_capital,
            open_positions: HashMap::new(),
            closed_positions: Vec::new(),
            total_realized_pnl: 0.0,
            total_unrealized_pnl: 0.0,
            total_fees: 0.0,
            sizing,
            id_gen: IdGen::default(),
        })
    }

    /// Quantity an entry at `price` would get under the sizing mode.
    pub fn derive_quantity(&self, price: f64) -> f64 {
        match self.sizing {
            PositionSizing::PercentOfCapital { pct } => self.available_capital * pct / price,
            PositionSizing::FixedQuantity { quantity } => quantity,
        }
    }

    /// Open a position, consuming `price * quantity` of available capital.
    ///
    /// When `quantity` is `None` it is derived from the sizing mode.
    pub fn open_position(
        &mut self,
        symbol: &str,
        side: PositionSide,
        price: f64,
        timestamp: DateTime<Utc>,
        quantity: Option<f64>,
    ) -> Result<Position, LedgerError> {
        if symbol.is_empty() {
            return Err(LedgerError::InvalidInput("symbol must not be empty".into()));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "entry price must be positive, got {price}"
            )));
        }
        let quantity = quantity.unwrap_or_else(|| self.derive_quantity(price));
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "quantity must be positive, got {quantity}"
            )));
        }

        let cost = price * quantity;
        if cost > self.available_capital {
            return Err(LedgerError::InsufficientCapital {
                required: cost,
                available: self.available_capital,
            });
        }

        let position = Position {
            id: self.id_gen.next_position_id(),
            symbol: symbol.to_string(),
            side,
            entry_price: price,
            quantity,
            entry_timestamp: timestamp,
            unrealized_pnl: 0.0,
        };
        self.available_capital -= cost;
        self.open_positions.insert(position.id, position.clone());
        Ok(position)
    }

    /// Close an open position at `exit_price`.
    ///
    /// Proceeds returned to available capital already embed the realized
    /// P&L: for longs that is exactly `exit_price * quantity`; for shorts
    /// the entry margin comes back plus the side-aware P&L, so the capital
    /// conservation identity holds on both sides. P&L is never added twice.
    pub fn close_position(
        &mut self,
        id: PositionId,
        exit_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<ClosedPosition, LedgerError> {
        if !exit_price.is_finite() || exit_price <= 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "exit price must be positive, got {exit_price}"
            )));
        }
        let position = self
            .open_positions
            .remove(&id)
            .ok_or(LedgerError::PositionNotFound(id))?;

        let closed = position.into_closed(exit_price, timestamp);
        let proceeds = match closed.side {
            PositionSide::Long => closed.exit_price * closed.quantity,
            // The margin posted at entry comes back plus the side-aware
            // P&L. A loss beyond the posted margin is floored so available
            // capital never goes negative.
            PositionSide::Short => {
                (closed.entry_price * closed.quantity + closed.realized_pnl).max(0.0)
            }
        };
        self.available_capital += proceeds;
        self.total_realized_pnl += closed.realized_pnl;
        self.recompute_unrealized();
        self.closed_positions.push(closed.clone());
        Ok(closed)
    }

    /// Close every open position for `symbol`, best-effort: a per-position
    /// failure is logged and does not abort the batch. Returns the
    /// positions actually closed.
    pub fn close_positions_for_symbol(
        &mut self,
        symbol: &str,
        exit_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Vec<ClosedPosition> {
        let ids: Vec<PositionId> = self
            .open_positions
            .values()
            .filter(|p| p.symbol == symbol)
            .map(|p| p.id)
            .collect();

        let mut closed = Vec::with_capacity(ids.len());
        for id in ids {
            match self.close_position(id, exit_price, timestamp) {
                Ok(c) => closed.push(c),
                Err(err) => {
                    tracing::warn!(position = %id, %err, "skipping position in batch close");
                }
            }
        }
        closed
    }

    /// Recompute each open position's unrealized P&L from current prices.
    ///
    /// Positions whose symbol has no entry in `prices` keep their prior
    /// unrealized value.
    pub fn mark_to_market(&mut self, prices: &HashMap<String, f64>) {
        for position in self.open_positions.values_mut() {
            if let Some(&price) = prices.get(&position.symbol) {
                position.mark(price);
            }
        }
        self.recompute_unrealized();
    }

    /// `equity = available_capital + total_unrealized_pnl`.
    pub fn calculate_equity(&self) -> f64 {
        self.available_capital + self.total_unrealized_pnl
    }

    /// Deduct a simulation fee from available capital.
    pub fn debit_fee(&mut self, amount: f64) -> Result<(), LedgerError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "fee must be non-negative, got {amount}"
            )));
        }
        if amount > self.available_capital {
            return Err(LedgerError::InsufficientCapital {
                required: amount,
                available: self.available_capital,
            });
        }
        self.available_capital -= amount;
        self.total_fees += amount;
        Ok(())
    }

    pub fn sizing(&self) -> PositionSizing {
        self.sizing
    }

    pub fn get_position(&self, id: PositionId) -> Option<&Position> {
        self.open_positions.get(&id)
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.open_positions.values()
    }

    pub fn open_positions_for_symbol<'a>(
        &'a self,
        symbol: &'a str,
    ) -> impl Iterator<Item = &'a Position> + 'a {
        self.open_positions
            .values()
            .filter(move |p| p.symbol == symbol)
    }

    pub fn has_open_position(&self, symbol: &str) -> bool {
        self.open_positions.values().any(|p| p.symbol == symbol)
    }

    pub fn open_position_count(&self) -> usize {
        self.open_positions.len()
    }

    /// Ordered history of closed positions (insertion order).
    pub fn closed_positions(&self) -> &[ClosedPosition] {
        &self.closed_positions
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            initial_capital: self.initial_capital,
            available_capital: self.available_capital,
            equity: self.calculate_equity(),
            total_realized_pnl: self.total_realized_pnl,
            total_unrealized_pnl: self.total_unrealized_pnl,
            total_fees: self.total_fees,
            open_positions: self.open_positions.len(),
            closed_positions: self.closed_positions.len(),
        }
    }

    fn recompute_unrealized(&mut self) {
        self.total_unrealized_pnl = self
            .open_positions
            .values()
            .map(|p| p.unrealized_pnl)
            .sum();
    }
}

/// Snapshot of the ledger's aggregate numbers, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub initial_capital: f64,
    pub available_capital: f64,
    pub equity: f64,
    pub total_realized_pnl: f64,
    pub total_unrealized_pnl: f64,
    pub total_fees: f64,
    pub open_positions: usize,
    pub closed_positions: usize,
}
