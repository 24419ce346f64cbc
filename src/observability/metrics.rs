//! Prometheus exposition for flushed instrumentation metrics.
//!
//! The reporter's `metrics` sink writes through the `metrics` facade; this
//! module installs the Prometheus recorder and its scrape listener.
//! Dotted metric names (`response.completed.aggregated_per_source`) are
//! rewritten to underscores by the exporter.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics exporter started");
    Ok(())
}
