//! Equity curve points and bounded down-sampling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point of an equity curve. Points are appended in strictly
/// increasing timestamp order during a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl EquityPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Compress an equity series to at most `max_points` without losing shape.
///
/// Short series pass through unchanged. Longer ones are strided with
/// `ceil(len / max_points)`, keeping the first point and forcing the last
/// one into the final slot, so the output preserves chronological order,
/// never duplicates a timestamp, and never exceeds the bound.
///
/// Degenerate bounds: `max_points == 0` yields an empty curve and
/// `max_points == 1` yields just the last point.
pub fn sample(points: &[EquityPoint], max_points: usize) -> Vec<EquityPoint> {
    if max_points == 0 {
        return Vec::new();
    }
    if points.len() <= max_points {
        return points.to_vec();
    }
    if max_points == 1 {
        return vec![*points.last().expect("non-empty by the len check above")];
    }

    let stride = points.len().div_ceil(max_points);
    let mut sampled: Vec<EquityPoint> = points.iter().copied().step_by(stride).collect();

    let last = *points.last().expect("non-empty by the len check above");
    if sampled.last().map(|p| p.timestamp) != Some(last.timestamp) {
        // Swap the final strided pick for the true endpoint; this keeps the
        // output length at ceil(len / stride) <= max_points.
        *sampled.last_mut().expect("stride selection is non-empty") = last;
    }
    sampled
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn series(n: usize) -> Vec<EquityPoint> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| EquityPoint::new(base + Duration::minutes(i as i64), 10_000.0 + i as f64))
            .collect()
    }

    fn assert_strictly_increasing(points: &[EquityPoint]) {
        for pair in points.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn empty_and_single_pass_through() {
        assert!(sample(&[], 100).is_empty());
        let one = series(1);
        assert_eq!(sample(&one, 100), one);
    }

    #[test]
    fn short_series_returned_unchanged() {
        let points = series(50);
        assert_eq!(sample(&points, 50), points);
        assert_eq!(sample(&points, 100), points);
    }

    #[test]
    fn long_series_is_bounded_and_keeps_endpoints() {
        let points = series(1_000);
        let sampled = sample(&points, 100);
        assert!(sampled.len() <= 100);
        assert_eq!(sampled[0], points[0]);
        assert_eq!(*sampled.last().unwrap(), *points.last().unwrap());
        assert_strictly_increasing(&sampled);
    }

    #[test]
    fn awkward_stride_still_respects_bound() {
        // len 5, max 2: stride 3 picks indices {0, 3}; the endpoint swap
        // must not grow the output past the bound.
        let points = series(5);
        let sampled = sample(&points, 2);
        assert_eq!(sampled.len(), 2);
        assert_eq!(sampled[0], points[0]);
        assert_eq!(sampled[1], points[4]);
    }

    #[test]
    fn degenerate_bounds() {
        let points = series(10);
        assert!(sample(&points, 0).is_empty());
        let only = sample(&points, 1);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0], points[9]);
    }

    #[test]
    fn no_duplicate_timestamps_across_bounds() {
        for n in [2usize, 3, 7, 10, 99, 100, 101, 250, 997] {
            let points = series(n);
            for m in [2usize, 3, 10, 50, 100] {
                let sampled = sample(&points, m);
                assert!(sampled.len() <= m, "n={n} m={m} len={}", sampled.len());
                assert_eq!(sampled[0], points[0]);
                assert_eq!(*sampled.last().unwrap(), *points.last().unwrap());
                assert_strictly_increasing(&sampled);
            }
        }
    }
}
