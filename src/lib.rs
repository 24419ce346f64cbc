//! HTTP request instrumentation library.
//!
//! Every routed request updates in-flight gauges, per-endpoint counters and
//! histograms, delta counters at application/cluster/service/shard/source
//! granularity, and produces one finished server span.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod instrument;
pub mod lifecycle;
pub mod observability;
pub mod reporter;
pub mod sample;
pub mod store;

pub use config::InstrumentationConfig;
pub use error::{Error, Result};
pub use http::{HttpServer, InstrumentLayer};
pub use instrument::{Instrumentor, ResourceInfo};
pub use lifecycle::Shutdown;
pub use store::AggregationStore;
