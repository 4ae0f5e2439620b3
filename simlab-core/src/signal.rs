//! The external signal/indicator contract.
//!
//! Strategy definitions live outside this crate; the engine only consumes
//! boolean entry/exit/stop decisions evaluated against the bar history.

use crate::domain::{Bar, PositionSide};

/// The three boolean decisions a strategy produces for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalDecision {
    pub entry: bool,
    pub exit: bool,
    pub stop: bool,
}

impl SignalDecision {
    pub fn hold() -> Self {
        Self::default()
    }

    /// Whether any close-out decision fired.
    pub fn wants_close(&self) -> bool {
        self.exit || self.stop
    }
}

/// Provider of indicator values and entry/exit/stop decisions.
///
/// Implementations may keep internal indicator state; `evaluate` is called
/// once per bar in timestamp order, so a pure fold over the history and a
/// stateful incremental computation are both valid.
pub trait SignalProvider: Send {
    /// Bars required before the first meaningful evaluation. The engine
    /// refuses to run when the dataset is shorter than this.
    fn warmup_bars(&self) -> usize;

    /// Direction of positions this strategy opens.
    fn direction(&self) -> PositionSide {
        PositionSide::Long
    }

    /// Evaluate the decisions for `bars[index]`, given the full history up
    /// to and including that bar.
    fn evaluate(&mut self, bars: &[Bar], index: usize) -> SignalDecision;
}

/// A provider that never trades. Useful for calibration and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignal;

impl SignalProvider for NoSignal {
    fn warmup_bars(&self) -> usize {
        0
    }

    fn evaluate(&mut self, _bars: &[Bar], _index: usize) -> SignalDecision {
        SignalDecision::hold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_decision_closes_nothing() {
        let d = SignalDecision::hold();
        assert!(!d.entry);
        assert!(!d.wants_close());
    }

    #[test]
    fn stop_or_exit_wants_close() {
        let stop = SignalDecision {
            stop: true,
            ..Default::default()
        };
        let exit = SignalDecision {
            exit: true,
            ..Default::default()
        };
        assert!(stop.wants_close());
        assert!(exit.wants_close());
    }

    #[test]
    fn no_signal_never_fires() {
        let mut provider = NoSignal;
        assert_eq!(provider.warmup_bars(), 0);
        assert_eq!(provider.evaluate(&[], 0), SignalDecision::hold());
        assert_eq!(provider.direction(), PositionSide::Long);
    }
}
