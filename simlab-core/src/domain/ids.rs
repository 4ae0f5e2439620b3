use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an open or closed position within one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos-{}", self.0)
    }
}

/// Identifier of an executed (simulated) trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trade-{}", self.0)
    }
}

/// Deterministic id generator.
///
/// Each ledger and each simulator owns its own counter, so two runs over
/// identical inputs assign identical ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn next_position_id(&mut self) -> PositionId {
        self.next += 1;
        PositionId(self.next)
    }

    pub fn next_trade_id(&mut self) -> TradeId {
        self.next += 1;
        TradeId(self.next)
    }
}

/// Deterministic run id: content hash of the serialized configuration.
///
/// Uses BLAKE3 for stable, collision-resistant hashing across builds and
/// platforms. Two runs with identical configs share the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn from_config<T: Serialize>(config: &T) -> Self {
        let json = serde_json::to_string(config).expect("run config serialization failed");
        Self(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_gen_is_sequential() {
        let mut gen = IdGen::default();
        assert_eq!(gen.next_position_id(), PositionId(1));
        assert_eq!(gen.next_trade_id(), TradeId(2));
        assert_eq!(gen.next_position_id(), PositionId(3));
    }

    #[test]
    fn run_id_deterministic() {
        #[derive(Serialize)]
        struct Cfg {
            symbol: &'static str,
            capital: f64,
        }
        let a = RunId::from_config(&Cfg { symbol: "BTC/USD", capital: 10_000.0 });
        let b = RunId::from_config(&Cfg { symbol: "BTC/USD", capital: 10_000.0 });
        let c = RunId::from_config(&Cfg { symbol: "BTC/USD", capital: 20_000.0 });
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
