//! Result artifacts: report JSON, trades CSV, equity CSV.

use simlab_core::domain::ExecutedTrade;
use simlab_core::equity::EquityPoint;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::service::BacktestReport;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize artifact: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
}

/// Write the full report as `<run_id>.json` under `dir`. Returns the path.
pub fn save_report(report: &BacktestReport, dir: &Path) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", report.run_id));
    std::fs::write(&path, serde_json::to_vec_pretty(report)?)?;
    Ok(path)
}

/// Write executed trades as CSV.
pub fn write_trades_csv(trades: &[ExecutedTrade], path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "trade_id",
        "timestamp",
        "symbol",
        "side",
        "signal_type",
        "quantity",
        "execution_price",
        "slippage_amount",
        "fee",
        "net_price",
    ])?;
    for trade in trades {
        writer.write_record([
            trade.trade_id.to_string(),
            trade.timestamp.to_rfc3339(),
            trade.symbol.clone(),
            format!("{:?}", trade.side).to_lowercase(),
            format!("{:?}", trade.signal_type).to_lowercase(),
            trade.quantity.to_string(),
            trade.execution_price.to_string(),
            trade.slippage_amount.to_string(),
            trade.fee.to_string(),
            trade.net_price.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write an equity curve as CSV.
pub fn write_equity_csv(points: &[EquityPoint], path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["timestamp", "equity"])?;
    for point in points {
        writer.write_record([point.timestamp.to_rfc3339(), point.value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use simlab_core::domain::{PositionSide, SignalType, TradeId};

    fn trades() -> Vec<ExecutedTrade> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        vec![
            ExecutedTrade {
                trade_id: TradeId(1),
                symbol: "BTC/USD".into(),
                side: PositionSide::Long,
                quantity: 0.5,
                execution_price: 50_050.0,
                signal_type: SignalType::Entry,
                slippage_amount: 50.0,
                fee: 25.0,
                net_price: 50_100.0,
                timestamp: base,
            },
            ExecutedTrade {
                trade_id: TradeId(2),
                symbol: "BTC/USD".into(),
                side: PositionSide::Long,
                quantity: 0.5,
                execution_price: 50_949.0,
                signal_type: SignalType::Exit,
                slippage_amount: 51.0,
                fee: 25.5,
                net_price: 51_000.0,
                timestamp: base + Duration::hours(6),
            },
        ]
    }

    #[test]
    fn trades_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        write_trades_csv(&trades(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3); // header + 2 rows
        assert!(lines[0].starts_with("trade_id,timestamp"));
        assert!(lines[1].contains("entry"));
        assert!(lines[2].contains("exit"));
    }

    #[test]
    fn equity_csv_has_one_row_per_point() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let points: Vec<EquityPoint> = (0..5)
            .map(|i| EquityPoint::new(base + Duration::hours(i), 10_000.0 + i as f64))
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("equity.csv");
        write_equity_csv(&points, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 6);
    }
}
