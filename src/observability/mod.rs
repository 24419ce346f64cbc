//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → tracing.rs (finished request spans as log events)
//!
//! Reporter "metrics" sink:
//!     → metrics facade → metrics.rs Prometheus recorder → scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Prometheus exporter is optional and only installed when enabled

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use logging::init_logging;
pub use metrics::init_metrics;
pub use tracing::TracingSpanReporter;
