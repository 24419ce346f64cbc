//! Instrumented sample server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!     Client Request  │  ┌────────┐   ┌───────────────┐   ┌──────────────┐   │
//!     ────────────────┼─▶│ axum   │──▶│ InstrumentLayer│──▶│ sample       │   │
//!                     │  │ router │   │ enter/complete │   │ handlers     │   │
//!                     │  └────────┘   └───────┬───────┘   └──────────────┘   │
//!                     │                       │                              │
//!                     │                       ▼                              │
//!                     │              ┌─────────────────┐   ┌──────────────┐  │
//!                     │              │AggregationStore │──▶│  Reporter    │──┼──▶ log / Prometheus
//!                     │              └────────┬────────┘   └──────────────┘  │
//!                     │                       │                              │
//!                     │                       ▼                              │
//!                     │              ┌─────────────────┐                     │
//!                     │              │   Admin API     │◀────────────────────┼──── instrument-cli
//!                     │              └─────────────────┘                     │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use request_instrumentation::config::{load_config, InstrumentationConfig};
use request_instrumentation::lifecycle;
use request_instrumentation::observability::init_logging;

#[derive(Parser)]
#[command(name = "request-instrumentation")]
#[command(about = "Sample server with per-request metrics and spans", long_about = None)]
struct Args {
    /// Path to a TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => InstrumentationConfig::default(),
    };

    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        application = %config.application.application,
        reporting = config.reporting.enabled,
        admin = config.admin.enabled,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
