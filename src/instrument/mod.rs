//! Request instrumentation core.
//!
//! # Data Flow
//! ```text
//! Router adapter (http::layer)
//!     → facts.rs RequestFacts (method, template, resource identity)
//!     → instrumentor.rs enter()
//!         → naming.rs MetricIdentity + tags.rs endpoint TagSet
//!         → store: in-flight gauges +1
//!         → span.rs ActiveSpan::start
//!     → handler runs (cpu.rs meters each poll)
//!     → InFlightRequest::complete(status) or Drop
//!         → store: gauges -1, counters, deltas, histograms
//!         → span.rs finish → SpanReporter
//! ```

pub mod cpu;
pub mod facts;
pub mod instrumentor;
pub mod naming;
pub mod span;
pub mod tags;

pub use facts::{RequestFacts, ResourceInfo, ResponseFacts};
pub use instrumentor::{InFlightRequest, Instrumentor, RequestState, StatusPolicy, FAULT_STATUS};
pub use naming::MetricIdentity;
pub use span::{ActiveSpan, FinishedSpan, InMemorySpanReporter, SpanReporter};
pub use tags::{ApplicationTags, Granularity, TagSet, TagVocabulary};
