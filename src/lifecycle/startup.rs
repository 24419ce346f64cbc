//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the store, instrumentor and instrumented router from config
//! - Start background tasks (reporter, admin API, metrics exporter)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::InstrumentationConfig;
use crate::error::{Error, Result};
use crate::http::HttpServer;
use crate::instrument::{Instrumentor, SpanReporter};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{init_metrics, TracingSpanReporter};
use crate::reporter::Reporter;
use crate::sample;
use crate::store::AggregationStore;

/// The wired-up application, before any listener is bound.
pub struct Application {
    pub store: Arc<AggregationStore>,
    pub instrumentor: Arc<Instrumentor>,
    pub server: HttpServer,
}

impl Application {
    /// Build the instrumented sample application.
    pub fn build(config: &InstrumentationConfig, spans: Arc<dyn SpanReporter>) -> Self {
        let store = Arc::new(AggregationStore::new());
        let instrumentor = Arc::new(Instrumentor::from_config(config, Arc::clone(&store), spans));
        let app = sample::router(Arc::clone(&instrumentor), &config.instrumentation.scheme);
        let server = HttpServer::new(app, &config.listener);
        Self {
            store,
            instrumentor,
            server,
        }
    }

    /// The fully layered router, for serving on a custom listener.
    pub fn router(&self) -> Router {
        self.server.router()
    }
}

/// Run until a shutdown signal arrives.
pub async fn run(config: InstrumentationConfig) -> Result<()> {
    if config.observability.metrics_enabled {
        init_metrics(parse_addr(&config.observability.metrics_address)?)?;
    }

    let app = Application::build(&config, Arc::new(TracingSpanReporter::new()));
    let shutdown = Shutdown::new();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if config.reporting.enabled {
        let reporter = Reporter::from_config(&config.reporting, Arc::clone(&app.store));
        tasks.push(tokio::spawn(reporter.run(shutdown.subscribe())));
    }

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let router = setup_admin_router(AdminState::new(Arc::clone(&app.store), &config.admin.api_key));
        let mut rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = rx.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server_task = tokio::spawn(app.server.run(listener, shutdown.subscribe()));

    signals::wait_for_shutdown_signal().await;
    let notified = shutdown.trigger();
    tracing::info!(tasks = notified, "Shutting down");

    server_task.await??;
    for task in tasks {
        task.await?;
    }
    Ok(())
}

fn parse_addr(value: &str) -> Result<SocketAddr> {
    value.parse().map_err(|_| Error::Address(value.to_string()))
}
