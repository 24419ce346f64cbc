//! HTTP adapter subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum::serve, TraceLayer, TimeoutLayer)
//!     → axum Router matches a route, sets MatchedPath
//!     → layer.rs InstrumentService (RequestFacts → Instrumentor::enter)
//!     → handler
//!     → layer.rs (status → InFlightRequest::complete, panic → 500)
//!     → Send to client
//! ```

pub mod layer;
pub mod server;

pub use layer::{InstrumentLayer, InstrumentService, InstrumentedFuture};
pub use server::HttpServer;
