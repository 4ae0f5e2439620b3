//! Progress reporting seam between the bar loop and its callers.

/// Receives one notification per processed bar.
///
/// The engine calls this at high frequency, so implementations must be
/// cheap and must never block on durable storage.
pub trait ProgressSink: Sync {
    fn advance(&self, units_done: u64);
}

/// Sink for callers that do not track progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn advance(&self, _units_done: u64) {}
}
