//! CSV bar loading.
//!
//! Expected header: `timestamp,open,high,low,close,volume` with RFC 3339
//! timestamps. The engine validates ordering; the loader only parses.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use simlab_core::domain::Bar;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read bars: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse bars: {0}")]
    Csv(#[from] csv::Error),
    #[error("no bars in '{0}'")]
    Empty(String),
}

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<BarRow> for Bar {
    fn from(row: BarRow) -> Self {
        Bar {
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

/// Load bars from a CSV file.
pub fn load_bars_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut bars = Vec::new();
    for row in reader.deserialize::<BarRow>() {
        bars.push(row?.into());
    }
    if bars.is_empty() {
        return Err(DataError::Empty(path.display().to_string()));
    }
    Ok(bars)
}
