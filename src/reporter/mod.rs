//! Reporting subsystem.
//!
//! # Data Flow
//! ```text
//! tokio interval tick (flush_interval_secs)
//!     → flush.rs Reporter::flush_once
//!     → AggregationStore::drain (deltas swapped to zero, histograms taken)
//!     → sink.rs MetricSink::send
//!         Ok  → done
//!         Err → AggregationStore::restore (values added back)
//!
//! Shutdown broadcast
//!     → loop exits → final flush
//! ```

pub mod flush;
pub mod sink;

pub use flush::Reporter;
pub use sink::{LoggingSink, MetricSink, MetricsFacadeSink, SinkError};
