//! Bounded-concurrency backtest execution.
//!
//! Each run gets its own ledger, simulator, and progress record; the only
//! shared structure is the progress table. The service owns a private
//! rayon pool sized to the configured maximum, so submissions beyond the
//! limit queue instead of oversubscribing.

use serde::{Deserialize, Serialize};
use simlab_core::engine::{run_backtest, EngineError};
use simlab_core::equity::{sample, EquityPoint};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ConfigError, RunConfig};
use crate::data::DataError;
use crate::metrics::PerformanceMetrics;
use crate::progress::{ProgressReporter, SessionProgress};
use simlab_core::domain::Bar;
use simlab_core::engine::BacktestRunResult;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("worker pool error: {0}")]
    Pool(String),
}

/// Complete result of a single backtest run, ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub run_id: String,
    pub config: RunConfig,
    pub metrics: PerformanceMetrics,
    /// Down-sampled equity curve, bounded by `config.max_equity_points`.
    pub equity_curve: Vec<EquityPoint>,
    pub result: BacktestRunResult,
}

/// Executes backtests on a private worker pool.
pub struct BacktestService {
    pool: rayon::ThreadPool,
    progress: Arc<ProgressReporter>,
}

impl BacktestService {
    /// `max_concurrent` bounds how many backtests execute at once.
    pub fn new(
        max_concurrent: usize,
        progress: Arc<ProgressReporter>,
    ) -> Result<Self, ServiceError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_concurrent.max(1))
            .thread_name(|i| format!("backtest-worker-{i}"))
            .build()
            .map_err(|e| ServiceError::Pool(e.to_string()))?;
        Ok(Self { pool, progress })
    }

    pub fn progress(&self) -> &Arc<ProgressReporter> {
        &self.progress
    }

    /// Run one backtest on the pool, tracking per-bar progress under the
    /// run's content-addressed id.
    pub fn run(&self, config: &RunConfig, bars: &[Bar]) -> Result<BacktestReport, ServiceError> {
        self.pool.install(|| self.run_inline(config, bars))
    }

    /// Run a whole batch concurrently, bounded by the pool size. Results
    /// come back in submission order, failures per-run.
    pub fn run_many(
        &self,
        jobs: &[(RunConfig, Vec<Bar>)],
    ) -> Vec<Result<BacktestReport, ServiceError>> {
        use rayon::prelude::*;
        self.pool.install(|| {
            jobs.par_iter()
                .map(|(config, bars)| self.run_inline(config, bars))
                .collect()
        })
    }

    fn run_inline(&self, config: &RunConfig, bars: &[Bar]) -> Result<BacktestReport, ServiceError> {
        let run_id = config.run_id();
        let engine_config = config.to_backtest_config();
        let mut provider = config.build_provider()?;

        let total_units = engine_config.bars_in_range(bars).len() as u64;
        self.progress.track(&run_id, total_units);
        let sink = SessionProgress::new(Arc::clone(&self.progress), run_id.clone());

        let result = run_backtest(provider.as_mut(), bars, &engine_config, &sink);
        // The record goes away on success and failure alike; only a crash
        // leaves it behind for the staleness sweep.
        self.progress.complete(&run_id);
        let result = result?;

        let metrics = PerformanceMetrics::compute(&result.equity_curve, &result.closed_positions);
        let equity_curve = sample(&result.equity_curve, config.max_equity_points);

        Ok(BacktestReport {
            run_id,
            config: config.clone(),
            metrics,
            equity_curve,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyConfig;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use simlab_core::execution::ExecutionConfig;
    use simlab_core::ledger::PositionSizing;

    fn bars(n: usize) -> Vec<Bar> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.2).sin() * 4.0 + i as f64 * 0.05;
                Bar {
                    timestamp: base + Duration::hours(i as i64),
                    open: close - 0.1,
                    high: close + 0.8,
                    low: close - 0.8,
                    close,
                    volume: 5_000.0,
                }
            })
            .collect()
    }

    fn run_config(strategy: StrategyConfig) -> RunConfig {
        RunConfig {
            symbol: "BTC/USD".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            initial_capital: 10_000.0,
            sizing: PositionSizing::PercentOfCapital { pct: 0.5 },
            execution: ExecutionConfig::frictionless(),
            strategy,
            max_equity_points: 50,
        }
    }

    #[test]
    fn no_entry_run_reports_flat_metrics() {
        let service = BacktestService::new(2, Arc::new(ProgressReporter::new())).unwrap();
        let report = service
            .run(&run_config(StrategyConfig::NoEntry), &bars(200))
            .unwrap();

        assert_eq!(report.metrics.trade_count, 0);
        assert_eq!(report.metrics.total_return, 0.0);
        assert!(report.equity_curve.len() <= 50);
        assert_eq!(report.result.bar_count, 200);
    }

    #[test]
    fn progress_record_is_removed_after_completion() {
        let progress = Arc::new(ProgressReporter::new());
        let service = BacktestService::new(2, Arc::clone(&progress)).unwrap();
        let config = run_config(StrategyConfig::NoEntry);
        let run_id = config.run_id();

        service.run(&config, &bars(100)).unwrap();
        assert!(progress.get(&run_id).is_err());
        assert!(progress.is_empty());
    }

    #[test]
    fn sma_cross_run_trades_and_stays_conservation_consistent() {
        let service = BacktestService::new(2, Arc::new(ProgressReporter::new())).unwrap();
        let config = run_config(StrategyConfig::SmaCross {
            fast_period: 5,
            slow_period: 20,
        });
        let report = service.run(&config, &bars(500)).unwrap();

        assert!(report.metrics.trade_count > 0);
        // The equity identity holds at every point of the run.
        let summary = &report.result.summary;
        let expected = summary.available_capital + summary.total_unrealized_pnl;
        assert!((report.result.final_equity - expected).abs() < 1e-9);
        // And with everything flat, conservation is exact.
        if summary.open_positions == 0 {
            let conserved =
                10_000.0 + summary.total_realized_pnl - summary.total_fees;
            assert!((report.result.final_equity - conserved).abs() < 0.01);
        }
    }

    #[test]
    fn batch_runs_return_in_submission_order() {
        let service = BacktestService::new(3, Arc::new(ProgressReporter::new())).unwrap();
        let data = bars(300);
        let jobs: Vec<(RunConfig, Vec<Bar>)> = (1..=4)
            .map(|i| {
                let mut config = run_config(StrategyConfig::SmaCross {
                    fast_period: i,
                    slow_period: 20,
                });
                config.initial_capital = 10_000.0 * i as f64;
                (config, data.clone())
            })
            .collect();

        let reports = service.run_many(&jobs);
        assert_eq!(reports.len(), 4);
        for (i, report) in reports.iter().enumerate() {
            let report = report.as_ref().unwrap();
            assert_eq!(report.config.initial_capital, 10_000.0 * (i + 1) as f64);
        }
    }

    #[test]
    fn engine_failures_surface_per_run_and_clean_up_progress() {
        let progress = Arc::new(ProgressReporter::new());
        let service = BacktestService::new(2, Arc::clone(&progress)).unwrap();
        let mut config = run_config(StrategyConfig::NoEntry);
        config.end_date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(); // before start

        let err = service.run(&config, &bars(100)).unwrap_err();
        assert!(matches!(err, ServiceError::Engine(_)));
        assert!(progress.is_empty());
    }
}
