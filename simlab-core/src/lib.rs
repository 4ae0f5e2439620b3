//! Simulation core — ledger accounting, execution simulation, equity
//! sampling, and the deterministic backtest loop.
//!
//! This crate is the synchronous heart shared by both evaluation modes:
//! - Domain types (bars, positions, trades, ids)
//! - Ledger with strict capital/position accounting invariants
//! - Execution simulator (slippage + fees, batch with partial failure)
//! - Equity curve down-sampling
//! - Bar-by-bar backtest loop behind an external signal-provider contract
//!
//! Live paper-trading sessions build on the same primitives from the
//! `simlab-live` crate; orchestration and progress live in `simlab-runner`.

pub mod domain;
pub mod engine;
pub mod equity;
pub mod execution;
pub mod ledger;
pub mod signal;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types cross thread boundaries.
    ///
    /// Backtests fan out across a worker pool and live sessions move these
    /// types through channels; if any of them loses Send + Sync the build
    /// breaks here instead of deep inside an orchestrator.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::ClosedPosition>();
        require_sync::<domain::ClosedPosition>();
        require_send::<domain::ExecutedTrade>();
        require_sync::<domain::ExecutedTrade>();
        require_send::<ledger::Ledger>();
        require_sync::<ledger::Ledger>();
        require_send::<execution::ExecutionSimulator>();
        require_sync::<execution::ExecutionSimulator>();
        require_send::<equity::EquityPoint>();
        require_sync::<equity::EquityPoint>();
        require_send::<engine::BacktestConfig>();
        require_sync::<engine::BacktestConfig>();
        require_send::<engine::BacktestRunResult>();
        require_sync::<engine::BacktestRunResult>();
    }
}
