//! Histogram accumulator.
//!
//! Observations are folded into a DDSketch-backed `Summary`, so memory is
//! bounded by the sketch's bucket limit no matter how many values are
//! recorded or how long a drain is deferred. Count and sum are exact;
//! quantiles carry the sketch's relative error.

use std::fmt;

use metrics_util::storage::Summary;
use serde::{Serialize, Serializer};

/// Relative accuracy of reported quantiles.
const SKETCH_ALPHA: f64 = 0.001;
/// Upper bound on sketch buckets per sign.
const SKETCH_MAX_BUCKETS: u32 = 2_048;
/// Values closer to zero than this are counted as zero.
const SKETCH_MIN_VALUE: f64 = 1.0e-9;

/// Upper bound of [`Distribution::footprint`].
pub const MAX_FOOTPRINT: usize =
    std::mem::size_of::<Summary>() + 2 * SKETCH_MAX_BUCKETS as usize * std::mem::size_of::<u64>();

/// Observations recorded since the last drain.
#[derive(Clone)]
pub struct Distribution {
    sketch: Summary,
    sum: f64,
}

impl Default for Distribution {
    fn default() -> Self {
        Self {
            sketch: Summary::new(SKETCH_ALPHA, SKETCH_MAX_BUCKETS, SKETCH_MIN_VALUE),
            sum: 0.0,
        }
    }
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-finite values are ignored.
    pub fn record(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.sketch.add(value);
        self.sum += value;
    }

    /// Fold another distribution into this one.
    pub fn merge(&mut self, other: Distribution) {
        if self.is_empty() {
            *self = other;
            return;
        }
        if other.is_empty() {
            return;
        }
        match self.sketch.merge(&other.sketch) {
            Ok(()) => self.sum += other.sum,
            Err(_) => {
                // Both sides are built with the same parameters.
                tracing::warn!(dropped = other.count(), "histogram merge rejected");
            }
        }
    }

    pub fn count(&self) -> usize {
        self.sketch.count()
    }

    pub fn is_empty(&self) -> bool {
        self.sketch.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.sketch.min())
    }

    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.sketch.max())
    }

    /// Approximate quantile, `q` in `[0, 1]`.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        self.sketch.quantile(q.clamp(0.0, 1.0))
    }

    /// Approximate heap footprint of the sketch in bytes.
    pub fn footprint(&self) -> usize {
        self.sketch.estimated_size()
    }

    pub fn summary(&self) -> DistributionSummary {
        DistributionSummary {
            count: self.count(),
            sum: self.sum(),
            min: self.min(),
            max: self.max(),
            p50: self.quantile(0.50),
            p95: self.quantile(0.95),
            p99: self.quantile(0.99),
        }
    }
}

impl fmt::Debug for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Distribution")
            .field("count", &self.count())
            .field("sum", &self.sum)
            .finish()
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.summary().serialize(serializer)
    }
}

/// Point-in-time view of a distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|v| (v - expected).abs() <= expected * 0.01)
    }

    #[test]
    fn test_summary() {
        let mut dist = Distribution::new();
        for v in [5.0, 1.0, 3.0, 2.0, 4.0] {
            dist.record(v);
        }
        let summary = dist.summary();
        assert_eq!(summary.count, 5);
        assert_eq!(summary.sum, 15.0);
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.max, Some(5.0));
        assert!(close(summary.p50, 3.0));
    }

    #[test]
    fn test_empty_summary() {
        let summary = Distribution::new().summary();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.min, None);
        assert_eq!(summary.p99, None);
    }

    #[test]
    fn test_merge() {
        let mut a = Distribution::new();
        a.record(1.0);
        let mut b = Distribution::new();
        b.record(2.0);
        b.record(3.0);
        a.merge(b);
        assert_eq!(a.count(), 3);
        assert_eq!(a.sum(), 6.0);
        assert_eq!(a.max(), Some(3.0));
    }

    #[test]
    fn test_memory_stays_bounded() {
        let mut dist = Distribution::new();
        for i in 1..=1_000u32 {
            dist.record(f64::from(i));
        }
        let settled = dist.footprint();

        for _ in 0..200 {
            for i in 1..=1_000u32 {
                dist.record(f64::from(i));
            }
        }

        assert_eq!(dist.footprint(), settled);
        assert!(settled <= MAX_FOOTPRINT);
        assert_eq!(dist.count(), 201_000);
        assert_eq!(dist.sum(), 201.0 * 500_500.0);
        assert!(close(dist.quantile(0.5), 500.0));
    }

    #[test]
    fn test_wide_range_hits_bucket_limit() {
        let mut dist = Distribution::new();
        let mut value = 1.0e-6;
        while value < 1.0e12 {
            dist.record(value);
            dist.record(-value);
            value *= 1.0005;
        }
        assert!(dist.count() > 100_000);
        assert!(dist.footprint() <= MAX_FOOTPRINT);
    }

    #[test]
    fn test_non_finite_values_are_ignored() {
        let mut dist = Distribution::new();
        dist.record(f64::NAN);
        dist.record(f64::INFINITY);
        dist.record(2.0);
        assert_eq!(dist.count(), 1);
        assert_eq!(dist.sum(), 2.0);
    }

    #[test]
    fn test_repeated_restore_stays_bounded() {
        let mut kept = Distribution::new();
        for i in 1..=500u32 {
            kept.record(f64::from(i));
        }
        let settled = kept.footprint();

        for _ in 0..100 {
            let mut fresh = Distribution::new();
            for i in 1..=500u32 {
                fresh.record(f64::from(i));
            }
            kept.merge(fresh);
        }

        assert_eq!(kept.count(), 50_500);
        assert!(kept.footprint() <= settled);
    }
}
