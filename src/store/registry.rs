//! Concurrent aggregation store.
//!
//! # Responsibilities
//! - Hold gauges, cumulative counters, delta counters and histograms keyed by (name, tags)
//! - Create entries lazily on first update; never remove them
//! - Offer atomic drain-and-reset of delta counters and histograms to the reporter
//!
//! # Design Decisions
//! - One `DashMap` per accumulator kind, so a key can never change kind
//! - Counters and gauges are atomics; the map lock is only held for lookup
//! - Drain uses `swap(0)`, which is linearizable with concurrent `fetch_add`
//! - Only the reporter drains; the instrumentor never resets anything

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use serde::Serialize;

use crate::instrument::tags::TagSet;
use crate::store::distribution::{Distribution, DistributionSummary};
use crate::store::snapshot::{sort_samples, FlushBatch, MetricSample, StoreSnapshot};

/// Identity of a stored accumulator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MetricKey {
    name: String,
    tags: TagSet,
}

impl MetricKey {
    pub fn new(name: impl Into<String>, tags: TagSet) -> Self {
        Self {
            name: name.into(),
            tags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }
}

/// Thread-safe store of all instrumentation accumulators.
#[derive(Debug, Default)]
pub struct AggregationStore {
    gauges: DashMap<MetricKey, AtomicI64>,
    counters: DashMap<MetricKey, AtomicU64>,
    deltas: DashMap<MetricKey, AtomicU64>,
    histograms: DashMap<MetricKey, Mutex<Distribution>>,
}

/// Run `f` against the entry for `key`, creating it with `init` if missing.
fn update<V, R>(
    map: &DashMap<MetricKey, V>,
    key: &MetricKey,
    init: impl FnOnce() -> V,
    f: impl FnOnce(&V) -> R,
) -> R {
    if let Some(entry) = map.get(key) {
        return f(entry.value());
    }
    let entry = map.entry(key.clone()).or_insert_with(init);
    f(entry.value())
}

fn lock(dist: &Mutex<Distribution>) -> MutexGuard<'_, Distribution> {
    dist.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AggregationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Gauges ---

    pub fn increment_gauge(&self, key: &MetricKey) {
        self.add_gauge(key, 1);
    }

    pub fn decrement_gauge(&self, key: &MetricKey) {
        self.add_gauge(key, -1);
    }

    fn add_gauge(&self, key: &MetricKey, delta: i64) {
        update(&self.gauges, key, || AtomicI64::new(0), |g| {
            g.fetch_add(delta, Ordering::AcqRel);
        });
    }

    pub fn gauge(&self, key: &MetricKey) -> Option<i64> {
        self.gauges.get(key).map(|g| g.load(Ordering::Acquire))
    }

    // --- Cumulative counters ---

    pub fn increment_counter(&self, key: &MetricKey) {
        update(&self.counters, key, || AtomicU64::new(0), |c| {
            c.fetch_add(1, Ordering::AcqRel);
        });
    }

    pub fn counter(&self, key: &MetricKey) -> Option<u64> {
        self.counters.get(key).map(|c| c.load(Ordering::Acquire))
    }

    // --- Delta counters ---

    pub fn increment_delta(&self, key: &MetricKey) {
        self.add_delta(key, 1);
    }

    fn add_delta(&self, key: &MetricKey, value: u64) {
        update(&self.deltas, key, || AtomicU64::new(0), |c| {
            c.fetch_add(value, Ordering::AcqRel);
        });
    }

    /// Current delta value without resetting it.
    pub fn delta(&self, key: &MetricKey) -> Option<u64> {
        self.deltas.get(key).map(|c| c.load(Ordering::Acquire))
    }

    /// Atomically read and zero a delta counter.
    pub fn drain_delta(&self, key: &MetricKey) -> Option<u64> {
        self.deltas.get(key).map(|c| c.swap(0, Ordering::AcqRel))
    }

    /// Add back a previously drained value (failed flush).
    pub fn restore_delta(&self, key: &MetricKey, value: u64) {
        if value > 0 {
            self.add_delta(key, value);
        }
    }

    // --- Histograms ---

    pub fn record_histogram(&self, key: &MetricKey, value: f64) {
        update(&self.histograms, key, || Mutex::new(Distribution::new()), |h| {
            lock(h).record(value);
        });
    }

    pub fn histogram(&self, key: &MetricKey) -> Option<DistributionSummary> {
        self.histograms.get(key).map(|h| lock(h.value()).summary())
    }

    /// Atomically take every observation recorded since the last drain.
    pub fn drain_histogram(&self, key: &MetricKey) -> Option<Distribution> {
        self.histograms
            .get(key)
            .map(|h| std::mem::take(&mut *lock(h.value())))
    }

    pub fn restore_histogram(&self, key: &MetricKey, observations: Distribution) {
        if observations.is_empty() {
            return;
        }
        update(&self.histograms, key, || Mutex::new(Distribution::new()), |h| {
            lock(h).merge(observations);
        });
    }

    // --- Whole-store views ---

    /// Number of distinct accumulators.
    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len() + self.deltas.len() + self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read everything without resetting anything.
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut snapshot = StoreSnapshot {
            gauges: self.read_gauges(),
            counters: self.read_counters(),
            delta_counters: self
                .deltas
                .iter()
                .map(|e| sample(e.key(), e.value().load(Ordering::Acquire)))
                .collect(),
            histograms: self
                .histograms
                .iter()
                .map(|e| sample(e.key(), lock(e.value()).summary()))
                .collect(),
        };
        sort_samples(&mut snapshot.delta_counters);
        sort_samples(&mut snapshot.histograms);
        snapshot
    }

    /// Drain every delta counter and histogram; read gauges and counters.
    ///
    /// Zero deltas and empty histograms are left out of the batch.
    pub fn drain(&self) -> FlushBatch {
        let mut batch = FlushBatch {
            gauges: self.read_gauges(),
            counters: self.read_counters(),
            delta_counters: self
                .deltas
                .iter()
                .filter_map(|e| {
                    let value = e.value().swap(0, Ordering::AcqRel);
                    (value > 0).then(|| sample(e.key(), value))
                })
                .collect(),
            histograms: self
                .histograms
                .iter()
                .filter_map(|e| {
                    let dist = std::mem::take(&mut *lock(e.value()));
                    (!dist.is_empty()).then(|| sample(e.key(), dist))
                })
                .collect(),
        };
        sort_samples(&mut batch.delta_counters);
        sort_samples(&mut batch.histograms);
        batch
    }

    /// Put the drained part of a batch back after a failed flush.
    pub fn restore(&self, batch: FlushBatch) {
        for s in batch.delta_counters {
            self.restore_delta(&MetricKey::new(s.name, s.tags), s.value);
        }
        for s in batch.histograms {
            self.restore_histogram(&MetricKey::new(s.name, s.tags), s.value);
        }
    }

    fn read_gauges(&self) -> Vec<MetricSample<i64>> {
        let mut out: Vec<_> = self
            .gauges
            .iter()
            .map(|e| sample(e.key(), e.value().load(Ordering::Acquire)))
            .collect();
        sort_samples(&mut out);
        out
    }

    fn read_counters(&self) -> Vec<MetricSample<u64>> {
        let mut out: Vec<_> = self
            .counters
            .iter()
            .map(|e| sample(e.key(), e.value().load(Ordering::Acquire)))
            .collect();
        sort_samples(&mut out);
        out
    }
}

fn sample<T>(key: &MetricKey, value: T) -> MetricSample<T> {
    MetricSample {
        name: key.name.clone(),
        tags: key.tags.clone(),
        value,
    }
}
