//! Live paper-trading sessions over the simulation core.
//!
//! One tokio actor per session owns a `simlab_core::ledger::Ledger`
//! exclusively and consumes a per-symbol market-data subscription; the
//! command channel is the only other way to touch session state. Snapshot
//! persistence is best-effort and never blocks the event path.

pub mod feed;
pub mod persistence;
pub mod registry;
pub mod session;

pub use feed::{ChannelFeed, MarketFeed, MarketTick};
pub use persistence::{JsonFileStore, NullStore, SessionSnapshot, SessionStore, StoreError};
pub use registry::SessionRegistry;
pub use session::{
    spawn_session, LiveSignal, SessionConfig, SessionError, SessionHandle, SessionMetrics,
    SessionStatus,
};
