//! Domain types shared by the simulation core and its drivers.

pub mod bar;
pub mod ids;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use ids::{IdGen, PositionId, RunId, TradeId};
pub use position::{ClosedPosition, Position, PositionSide};
pub use trade::{ExecutedTrade, SignalType, TradeOrder};
