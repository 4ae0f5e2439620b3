//! Open and closed positions with side-aware P&L.

use super::ids::PositionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Price P&L for one unit: `(exit - entry)` for longs, `(entry - exit)`
    /// for shorts.
    pub fn price_pnl(self, entry_price: f64, exit_price: f64, quantity: f64) -> f64 {
        match self {
            PositionSide::Long => (exit_price - entry_price) * quantity,
            PositionSide::Short => (entry_price - exit_price) * quantity,
        }
    }
}

/// An open position. Exclusively owned by one ledger; only mark-to-market
/// mutates it after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_timestamp: DateTime<Utc>,
    pub unrealized_pnl: f64,
}

impl Position {
    /// Recompute unrealized P&L against a current price.
    pub fn mark(&mut self, current_price: f64) {
        self.unrealized_pnl = self
            .side
            .price_pnl(self.entry_price, current_price, self.quantity);
    }

    /// Capital consumed at entry.
    pub fn entry_cost(&self) -> f64 {
        self.entry_price * self.quantity
    }

    /// Convert into an immutable closed position.
    pub fn into_closed(self, exit_price: f64, exit_timestamp: DateTime<Utc>) -> ClosedPosition {
        let realized_pnl = self
            .side
            .price_pnl(self.entry_price, exit_price, self.quantity);
        ClosedPosition {
            id: self.id,
            symbol: self.symbol,
            side: self.side,
            entry_price: self.entry_price,
            quantity: self.quantity,
            entry_timestamp: self.entry_timestamp,
            exit_price,
            exit_timestamp,
            realized_pnl,
        }
    }
}

/// A completed round trip. Immutable once created; appended to the ledger's
/// ordered history and never mutated again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub id: PositionId,
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_timestamp: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_timestamp: DateTime<Utc>,
    pub realized_pnl: f64,
}

impl ClosedPosition {
    pub fn holding_duration(&self) -> chrono::Duration {
        self.exit_timestamp - self.entry_timestamp
    }

    pub fn is_winner(&self) -> bool {
        self.realized_pnl > 0.0
    }
}
