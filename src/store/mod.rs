//! Aggregation store subsystem.
//!
//! # Data Flow
//! ```text
//! Request instrumentor (many concurrent writers)
//!     → registry.rs (gauge ±1, counter +1, delta +1, histogram record)
//!
//! Reporter (single flushing reader)
//!     → registry.rs drain() (delta swap-to-zero, histogram take)
//!     → snapshot.rs FlushBatch → sink
//!     → on sink failure: restore() adds drained values back
//!
//! Admin API
//!     → registry.rs snapshot() (read-only)
//! ```

pub mod distribution;
pub mod registry;
pub mod snapshot;

pub use distribution::{Distribution, DistributionSummary};
pub use registry::{AggregationStore, MetricKey};
pub use snapshot::{FlushBatch, MetricSample, StoreSnapshot};
