//! Trade orders and executed (simulated) trades.

use super::ids::TradeId;
use super::position::PositionSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of signal produced a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Entry,
    Exit,
    Stop,
}

impl SignalType {
    /// Whether this signal opens a position (as opposed to closing one).
    pub fn is_entry(self) -> bool {
        matches!(self, SignalType::Entry)
    }
}

/// A desired trade, before execution simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrder {
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub signal_type: SignalType,
}

impl TradeOrder {
    pub fn new(
        symbol: impl Into<String>,
        side: PositionSide,
        quantity: f64,
        signal_type: SignalType,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            signal_type,
        }
    }

    /// An entry for a long position buys; an exit for a long sells.
    /// Shorts are the mirror image.
    pub fn is_buy(&self) -> bool {
        match (self.side, self.signal_type.is_entry()) {
            (PositionSide::Long, true) | (PositionSide::Short, false) => true,
            (PositionSide::Long, false) | (PositionSide::Short, true) => false,
        }
    }
}

/// The immutable output of the execution simulator.
///
/// `execution_price` is the post-slippage fill price. `net_price` folds the
/// fee into a per-unit cost and is informational only — realized P&L is
/// always derived from `execution_price` (see `calculate_trade_pnl`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedTrade {
    pub trade_id: TradeId,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub execution_price: f64,
    pub signal_type: SignalType,
    pub slippage_amount: f64,
    pub fee: f64,
    pub net_price: f64,
    pub timestamp: DateTime<Utc>,
}

impl ExecutedTrade {
    /// Gross notional value of the fill.
    pub fn gross_value(&self) -> f64 {
        self.execution_price * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_long_buys_exit_long_sells() {
        let entry = TradeOrder::new("BTC/USD", PositionSide::Long, 1.0, SignalType::Entry);
        let exit = TradeOrder::new("BTC/USD", PositionSide::Long, 1.0, SignalType::Exit);
        assert!(entry.is_buy());
        assert!(!exit.is_buy());
    }

    #[test]
    fn entry_short_sells_stop_short_buys() {
        let entry = TradeOrder::new("BTC/USD", PositionSide::Short, 1.0, SignalType::Entry);
        let stop = TradeOrder::new("BTC/USD", PositionSide::Short, 1.0, SignalType::Stop);
        assert!(!entry.is_buy());
        assert!(stop.is_buy());
    }

    #[test]
    fn executed_trade_serde_roundtrip() {
        let trade = ExecutedTrade {
            trade_id: TradeId(7),
            symbol: "ETH/USD".into(),
            side: PositionSide::Long,
            quantity: 2.0,
            execution_price: 3001.5,
            signal_type: SignalType::Exit,
            slippage_amount: 1.5,
            fee: 6.003,
            net_price: 3004.5015,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&trade).unwrap();
        let back: ExecutedTrade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, back);
        assert!((trade.gross_value() - 6003.0).abs() < 1e-9);
    }
}
