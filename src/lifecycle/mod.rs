//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build store + instrumentor → Start reporter/admin → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server drains, reporter flushes one last time → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - The reporter's final flush runs after the server has stopped accepting

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, Application};
