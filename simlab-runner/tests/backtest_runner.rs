//! End-to-end runner tests: TOML config in, artifacts out.

use chrono::{Duration, TimeZone, Utc};
use simlab_core::domain::Bar;
use simlab_runner::{
    save_report, write_equity_csv, write_trades_csv, BacktestService, ProgressReporter, RunConfig,
};
use std::sync::Arc;

const CONFIG: &str = r#"
    symbol = "BTC/USD"
    start_date = "2024-01-01"
    end_date = "2024-03-31"
    initial_capital = 25000.0
    max_equity_points = 100

    [sizing]
    mode = "percent_of_capital"
    pct = 0.25

    [execution]
    slippage_pct = 0.0005
    fee_pct = 0.001

    [strategy]
    type = "sma_cross"
    fast_period = 4
    slow_period = 12
"#;

fn bars(n: usize) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.15).sin() * 6.0 + (i as f64 * 0.01);
            Bar {
                timestamp: base + Duration::hours(i as i64),
                open: close - 0.1,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 2_500.0,
            }
        })
        .collect()
}

#[test]
fn toml_config_runs_and_saves_artifacts() {
    let config = RunConfig::from_toml_str(CONFIG).unwrap();
    let service = BacktestService::new(2, Arc::new(ProgressReporter::new())).unwrap();

    let report = service.run(&config, &bars(800)).unwrap();
    assert_eq!(report.run_id, config.run_id());
    assert!(report.equity_curve.len() <= 100);
    assert!(!report.result.equity_curve.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let json_path = save_report(&report, dir.path()).unwrap();
    assert!(json_path.exists());

    write_trades_csv(&report.result.trades, &dir.path().join("trades.csv")).unwrap();
    write_equity_csv(&report.equity_curve, &dir.path().join("equity.csv")).unwrap();

    // The saved report deserializes back to the same content.
    let raw = std::fs::read_to_string(&json_path).unwrap();
    let restored: simlab_runner::BacktestReport = serde_json::from_str(&raw).unwrap();
    assert_eq!(restored, report);
}

#[test]
fn identical_configs_share_a_run_id_and_results() {
    let config = RunConfig::from_toml_str(CONFIG).unwrap();
    let service = BacktestService::new(4, Arc::new(ProgressReporter::new())).unwrap();
    let data = bars(600);

    let a = service.run(&config, &data).unwrap();
    let b = service.run(&config, &data).unwrap();
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.equity_curve, b.equity_curve);
    assert_eq!(a.metrics, b.metrics);
}

#[test]
fn concurrent_batch_leaves_no_progress_behind() {
    let progress = Arc::new(ProgressReporter::new());
    let service = BacktestService::new(2, Arc::clone(&progress)).unwrap();
    let data = bars(400);

    let jobs: Vec<_> = (0..6)
        .map(|i| {
            let mut config = RunConfig::from_toml_str(CONFIG).unwrap();
            config.initial_capital = 10_000.0 + i as f64 * 1_000.0;
            (config, data.clone())
        })
        .collect();

    let reports = service.run_many(&jobs);
    assert_eq!(reports.len(), 6);
    assert!(reports.iter().all(|r| r.is_ok()));
    assert!(progress.is_empty());
}
