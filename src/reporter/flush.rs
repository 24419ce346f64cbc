//! Periodic flush of the aggregation store.
//!
//! # Responsibilities
//! - Drain delta counters and histograms on a fixed cadence
//! - Hand each batch to the configured sink
//! - Put drained values back when the sink fails
//! - Flush one last time on shutdown

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::{ReportingConfig, SinkKind};
use crate::reporter::sink::{LoggingSink, MetricSink, MetricsFacadeSink, SinkError};
use crate::store::AggregationStore;

pub struct Reporter {
    store: Arc<AggregationStore>,
    sink: Arc<dyn MetricSink>,
    interval: Duration,
}

impl Reporter {
    pub fn new(store: Arc<AggregationStore>, sink: Arc<dyn MetricSink>, interval: Duration) -> Self {
        Self {
            store,
            sink,
            interval,
        }
    }

    pub fn from_config(config: &ReportingConfig, store: Arc<AggregationStore>) -> Self {
        let sink: Arc<dyn MetricSink> = match config.sink {
            SinkKind::Logging => Arc::new(LoggingSink),
            SinkKind::Metrics => Arc::new(MetricsFacadeSink),
        };
        Self::new(store, sink, Duration::from_secs(config.flush_interval_secs))
    }

    /// Drain the store and send one batch. Returns the number of samples sent.
    pub fn flush_once(&self) -> Result<usize, SinkError> {
        let batch = self.store.drain();
        if batch.is_empty() {
            return Ok(0);
        }

        let count = batch.len();
        match self.sink.send(&batch) {
            Ok(()) => {
                tracing::debug!(sink = self.sink.name(), metrics = count, "flush complete");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(
                    sink = self.sink.name(),
                    error = %e,
                    "flush failed, restoring drained values"
                );
                self.store.restore(batch);
                Err(e)
            }
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            sink = self.sink.name(),
            "Reporter starting"
        );

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.flush_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Reporter received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        if let Err(e) = self.flush_once() {
            tracing::error!(error = %e, "final flush failed");
        }
    }
}
