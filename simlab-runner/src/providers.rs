//! Built-in signal providers.
//!
//! These implement the external signal contract for end-to-end runs and
//! tests; real strategy definitions arrive from outside the core.

use simlab_core::domain::Bar;
use simlab_core::signal::{SignalDecision, SignalProvider};

pub use simlab_core::signal::NoSignal;

/// Simple moving average crossover: enter when the fast average crosses
/// above the slow one, exit when it crosses back below.
#[derive(Debug, Clone)]
pub struct SmaCross {
    fast_period: usize,
    slow_period: usize,
}

impl SmaCross {
    /// `fast_period` must be strictly smaller than `slow_period`.
    pub fn new(fast_period: usize, slow_period: usize) -> Option<Self> {
        if fast_period == 0 || fast_period >= slow_period {
            return None;
        }
        Some(Self {
            fast_period,
            slow_period,
        })
    }
}

fn sma(bars: &[Bar], end_index: usize, period: usize) -> Option<f64> {
    if end_index + 1 < period {
        return None;
    }
    let window = &bars[end_index + 1 - period..=end_index];
    Some(window.iter().map(|b| b.close).sum::<f64>() / period as f64)
}

impl SignalProvider for SmaCross {
    fn warmup_bars(&self) -> usize {
        // One extra bar so the previous-bar averages exist at the first
        // evaluated index.
        self.slow_period
    }

    fn evaluate(&mut self, bars: &[Bar], index: usize) -> SignalDecision {
        let (Some(fast), Some(slow), Some(prev_fast), Some(prev_slow)) = (
            sma(bars, index, self.fast_period),
            sma(bars, index, self.slow_period),
            index.checked_sub(1).and_then(|i| sma(bars, i, self.fast_period)),
            index.checked_sub(1).and_then(|i| sma(bars, i, self.slow_period)),
        ) else {
            return SignalDecision::hold();
        };

        SignalDecision {
            entry: prev_fast <= prev_slow && fast > slow,
            exit: prev_fast >= prev_slow && fast < slow,
            stop: false,
        }
    }
}
