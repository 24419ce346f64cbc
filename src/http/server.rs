//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the application router with request tracing and timeouts
//! - Bind to a listener and serve until shutdown

use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ListenerConfig;

/// HTTP server for an instrumented application router.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a server around `app`.
    pub fn new(app: Router, config: &ListenerConfig) -> Self {
        let router = Self::build_router(app, config);
        Self { router }
    }

    /// Add the outer middleware layers.
    ///
    /// The timeout sits outside the instrumentation, so a request that times
    /// out is recorded as a fault when its response future is dropped.
    #[allow(deprecated)]
    fn build_router(app: Router, config: &ListenerConfig) -> Router {
        app.layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
