//! Destinations for flushed batches.

use metrics::{counter, gauge, Label};
use thiserror::Error;

use crate::instrument::tags::TagSet;
use crate::store::FlushBatch;

/// Failure to hand a batch to its destination.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Receiver of drained batches.
///
/// Returning an error makes the reporter put the drained values back.
pub trait MetricSink: Send + Sync {
    fn name(&self) -> &'static str;

    fn send(&self, batch: &FlushBatch) -> Result<(), SinkError>;
}

/// Writes each batch to the log as one JSON document.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl MetricSink for LoggingSink {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn send(&self, batch: &FlushBatch) -> Result<(), SinkError> {
        let body = serde_json::to_string(batch)?;
        tracing::info!(metrics = batch.len(), batch = %body, "metrics flushed");
        Ok(())
    }
}

/// Forwards each batch to the `metrics` facade (Prometheus exporter when installed).
///
/// Gauges are set, cumulative counters are published as absolute values and
/// delta counters are added. Each histogram is published summary-style: a
/// gauge per quantile (`quantile` label), `<name>.count` added to a counter
/// and `<name>.sum` added to a gauge.
#[derive(Debug, Default)]
pub struct MetricsFacadeSink;

impl MetricSink for MetricsFacadeSink {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn send(&self, batch: &FlushBatch) -> Result<(), SinkError> {
        for s in &batch.gauges {
            gauge!(s.name.clone(), labels(&s.tags)).set(s.value as f64);
        }
        for s in &batch.counters {
            counter!(s.name.clone(), labels(&s.tags)).absolute(s.value);
        }
        for s in &batch.delta_counters {
            counter!(s.name.clone(), labels(&s.tags)).increment(s.value);
        }
        for s in &batch.histograms {
            let summary = s.value.summary();
            let quantiles = [
                ("0.5", summary.p50),
                ("0.95", summary.p95),
                ("0.99", summary.p99),
            ];
            for (quantile, value) in quantiles {
                if let Some(value) = value {
                    let mut quantile_labels = labels(&s.tags);
                    quantile_labels.push(Label::new("quantile", quantile));
                    gauge!(s.name.clone(), quantile_labels).set(value);
                }
            }
            counter!(format!("{}.count", s.name), labels(&s.tags)).increment(summary.count as u64);
            gauge!(format!("{}.sum", s.name), labels(&s.tags)).increment(summary.sum);
        }
        Ok(())
    }
}

fn labels(tags: &TagSet) -> Vec<Label> {
    tags.iter()
        .map(|(k, v)| Label::new(k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    use crate::store::{AggregationStore, MetricKey};

    fn batch() -> FlushBatch {
        let store = AggregationStore::new();
        let key = MetricKey::new("response.completed.aggregated_per_source", TagSet::new().with("cluster", "c"));
        store.increment_delta(&key);
        store.record_histogram(&MetricKey::new("response.x.GET.200.latency", TagSet::new()), 1.5);
        store.drain()
    }

    #[test]
    fn test_logging_sink_accepts_batch() {
        assert!(LoggingSink.send(&batch()).is_ok());
    }

    #[test]
    fn test_metrics_sink_without_recorder_is_noop() {
        assert!(MetricsFacadeSink.send(&batch()).is_ok());
    }

    #[test]
    fn test_metrics_sink_publishes_batch() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || MetricsFacadeSink.send(&batch())).unwrap();

        let recorded: Vec<(String, DebugValue)> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, _, _, value)| (key.key().name().to_string(), value))
            .collect();
        let values = |name: &str| -> Vec<&DebugValue> {
            recorded.iter().filter(|(n, _)| n == name).map(|(_, v)| v).collect()
        };

        assert_eq!(
            values("response.completed.aggregated_per_source"),
            vec![&DebugValue::Counter(1)]
        );
        assert_eq!(
            values("response.x.GET.200.latency.count"),
            vec![&DebugValue::Counter(1)]
        );
        // One gauge per quantile.
        assert_eq!(values("response.x.GET.200.latency").len(), 3);
    }

    #[test]
    fn test_labels_follow_tag_order() {
        let tags = TagSet::new().with("shard", "h").with("cluster", "c");
        let labels = labels(&tags);
        assert_eq!(labels[0].key(), "cluster");
        assert_eq!(labels[1].value(), "h");
    }
}
