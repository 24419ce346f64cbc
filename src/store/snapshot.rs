//! Read views over the aggregation store.
//!
//! `StoreSnapshot` is non-destructive and backs the admin API.
//! `FlushBatch` is what a drain hands to the reporting sink.

use serde::Serialize;

use crate::instrument::tags::TagSet;
use crate::store::distribution::{Distribution, DistributionSummary};

/// A single metric value with its identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample<T> {
    pub name: String,
    pub tags: TagSet,
    pub value: T,
}

/// Non-destructive view of every accumulator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    pub gauges: Vec<MetricSample<i64>>,
    pub counters: Vec<MetricSample<u64>>,
    pub delta_counters: Vec<MetricSample<u64>>,
    pub histograms: Vec<MetricSample<DistributionSummary>>,
}

impl StoreSnapshot {
    /// Keep only samples whose name contains `pattern`.
    pub fn filter_by_name(mut self, pattern: &str) -> Self {
        self.gauges.retain(|s| s.name.contains(pattern));
        self.counters.retain(|s| s.name.contains(pattern));
        self.delta_counters.retain(|s| s.name.contains(pattern));
        self.histograms.retain(|s| s.name.contains(pattern));
        self
    }
}

/// Values handed to a sink on flush.
///
/// Gauges and counters are point-in-time reads; delta counters and
/// histograms were drained from the store and must be restored if the
/// sink fails.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlushBatch {
    pub gauges: Vec<MetricSample<i64>>,
    pub counters: Vec<MetricSample<u64>>,
    pub delta_counters: Vec<MetricSample<u64>>,
    pub histograms: Vec<MetricSample<Distribution>>,
}

impl FlushBatch {
    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len() + self.delta_counters.len() + self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn sort_samples<T>(samples: &mut [MetricSample<T>]) {
    samples.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.tags.cmp(&b.tags)));
}
