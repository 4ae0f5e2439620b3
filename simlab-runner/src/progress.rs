//! Ephemeral, high-frequency progress tracking.
//!
//! One record per running backtest, updated once per processed bar. The
//! table is lock-striped by session id so concurrent runs rarely contend,
//! and it is completely separate from the durable store: progress updates
//! never touch a disk or a database. A background sweeper reclaims records
//! orphaned by crashed runs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use simlab_core::engine::ProgressSink;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use thiserror::Error;

const SHARD_COUNT: usize = 16;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgressError {
    #[error("progress record '{0}' not found")]
    NotFound(String),
}

/// Completion state of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub session_id: String,
    pub units_done: u64,
    pub total_units: u64,
    pub percentage: f64,
    pub updated_at: DateTime<Utc>,
}

/// Lock-striped progress table.
pub struct ProgressReporter {
    shards: Vec<Mutex<HashMap<String, ProgressRecord>>>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, session_id: &str) -> &Mutex<HashMap<String, ProgressRecord>> {
        let mut hasher = DefaultHasher::new();
        session_id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Begin tracking a run at zero percent.
    pub fn track(&self, session_id: &str, total_units: u64) {
        let record = ProgressRecord {
            session_id: session_id.to_string(),
            units_done: 0,
            total_units,
            percentage: 0.0,
            updated_at: Utc::now(),
        };
        self.shard(session_id)
            .lock()
            .expect("progress shard poisoned")
            .insert(session_id.to_string(), record);
    }

    /// Record units done. Unknown sessions log a warning and succeed; a
    /// progress update must never fail a run.
    pub fn update(&self, session_id: &str, units_done: u64) {
        let mut shard = self
            .shard(session_id)
            .lock()
            .expect("progress shard poisoned");
        match shard.get_mut(session_id) {
            Some(record) => {
                record.units_done = units_done;
                record.percentage = if record.total_units == 0 {
                    0.0
                } else {
                    units_done as f64 / record.total_units as f64 * 100.0
                };
                record.updated_at = Utc::now();
            }
            None => {
                tracing::warn!(session = %session_id, "progress update for unknown session");
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Result<ProgressRecord, ProgressError> {
        self.shard(session_id)
            .lock()
            .expect("progress shard poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| ProgressError::NotFound(session_id.to_string()))
    }

    /// Remove a record. Idempotent.
    pub fn complete(&self, session_id: &str) {
        self.shard(session_id)
            .lock()
            .expect("progress shard poisoned")
            .remove(session_id);
    }

    /// Drop records not updated within `staleness`. Returns how many were
    /// reclaimed. Crash recovery: a run that died mid-flight stops
    /// updating and its record ages out here.
    pub fn sweep_stale(&self, staleness: Duration) -> usize {
        let cutoff = Utc::now() - staleness;
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.lock().expect("progress shard poisoned");
            let stale: Vec<String> = shard
                .values()
                .filter(|r| r.updated_at < cutoff)
                .map(|r| r.session_id.clone())
                .collect();
            for id in stale {
                tracing::warn!(session = %id, "reclaiming stale progress record");
                shard.remove(&id);
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().expect("progress shard poisoned").len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Adapter feeding one run's bar count into the shared table.
pub struct SessionProgress {
    reporter: Arc<ProgressReporter>,
    session_id: String,
}

impl SessionProgress {
    pub fn new(reporter: Arc<ProgressReporter>, session_id: impl Into<String>) -> Self {
        Self {
            reporter,
            session_id: session_id.into(),
        }
    }
}

impl ProgressSink for SessionProgress {
    fn advance(&self, units_done: u64) {
        self.reporter.update(&self.session_id, units_done);
    }
}

/// Background thread that periodically sweeps stale records.
///
/// Stops and joins on drop.
pub struct ProgressSweeper {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressSweeper {
    pub fn spawn(
        reporter: Arc<ProgressReporter>,
        interval: std::time::Duration,
        staleness: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                let removed = reporter.sweep_stale(staleness);
                if removed > 0 {
                    tracing::info!(removed, "progress sweep reclaimed records");
                }
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProgressSweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_update_get_complete_cycle() {
        let reporter = ProgressReporter::new();
        reporter.track("run-1", 200);

        reporter.update("run-1", 50);
        let record = reporter.get("run-1").unwrap();
        assert_eq!(record.units_done, 50);
        assert!((record.percentage - 25.0).abs() < 1e-9);

        reporter.complete("run-1");
        assert_eq!(
            reporter.get("run-1").unwrap_err(),
            ProgressError::NotFound("run-1".into())
        );
        // Completing again is a no-op.
        reporter.complete("run-1");
    }

    #[test]
    fn zero_total_units_never_divides_by_zero() {
        let reporter = ProgressReporter::new();
        reporter.track("run-0", 0);
        reporter.update("run-0", 10);
        assert_eq!(reporter.get("run-0").unwrap().percentage, 0.0);
    }

    #[test]
    fn percentage_is_non_decreasing_for_monotonic_updates() {
        let reporter = ProgressReporter::new();
        reporter.track("run-2", 1_000);
        let mut last = -1.0;
        for done in (0..=1_000u64).step_by(37) {
            reporter.update("run-2", done);
            let pct = reporter.get("run-2").unwrap().percentage;
            assert!(pct >= last);
            last = pct;
        }
    }

    #[test]
    fn unknown_session_update_is_non_fatal() {
        let reporter = ProgressReporter::new();
        reporter.update("ghost", 5);
        assert!(reporter.get("ghost").is_err());
    }

    #[test]
    fn sweep_reclaims_only_stale_records() {
        let reporter = ProgressReporter::new();
        reporter.track("fresh", 10);
        reporter.track("stale", 10);

        // Age one record artificially by rewriting it through the shard.
        {
            let shard = reporter.shard("stale");
            let mut shard = shard.lock().unwrap();
            let record = shard.get_mut("stale").unwrap();
            record.updated_at = Utc::now() - Duration::hours(2);
        }

        let removed = reporter.sweep_stale(Duration::hours(1));
        assert_eq!(removed, 1);
        assert!(reporter.get("fresh").is_ok());
        assert!(reporter.get("stale").is_err());
    }

    #[test]
    fn sweeper_thread_runs_and_stops() {
        let reporter = Arc::new(ProgressReporter::new());
        reporter.track("old", 10);
        {
            let shard = reporter.shard("old");
            let mut shard = shard.lock().unwrap();
            shard.get_mut("old").unwrap().updated_at = Utc::now() - Duration::hours(2);
        }

        let sweeper = ProgressSweeper::spawn(
            Arc::clone(&reporter),
            std::time::Duration::from_millis(10),
            Duration::hours(1),
        );
        for _ in 0..100 {
            if reporter.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(reporter.is_empty());
        sweeper.stop();
    }

    #[test]
    fn records_are_isolated_per_session() {
        let reporter = ProgressReporter::new();
        for i in 0..100 {
            reporter.track(&format!("run-{i}"), 100);
            reporter.update(&format!("run-{i}"), i);
        }
        assert_eq!(reporter.len(), 100);
        assert_eq!(reporter.get("run-42").unwrap().units_done, 42);
    }
}
