//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use request_instrumentation::config::InstrumentationConfig;
use request_instrumentation::instrument::tags::TagSet;
use request_instrumentation::instrument::InMemorySpanReporter;
use request_instrumentation::lifecycle::{Application, Shutdown};
use request_instrumentation::sample::SampleResource;
use request_instrumentation::store::{AggregationStore, MetricKey};

pub const CLUSTER: &str = "us-west";
pub const SERVICE: &str = "sample-service";
pub const SHARD: &str = "primary";
pub const SOURCE: &str = "wavefront-provided";

/// Configuration matching the sample application identity.
pub fn sample_config() -> InstrumentationConfig {
    let mut config = InstrumentationConfig::default();
    config.application.application = "wavefront".to_string();
    config.application.cluster = Some(CLUSTER.to_string());
    config.application.service = Some(SERVICE.to_string());
    config.application.shard = Some(SHARD.to_string());
    config
        .application
        .custom_tags
        .insert("location".to_string(), "SF".to_string());
    config
        .application
        .custom_tags
        .insert("env".to_string(), "Staging".to_string());
    config.reporting.enabled = false;
    config
}

/// A running sample server bound to an ephemeral port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub store: Arc<AggregationStore>,
    pub spans: Arc<InMemorySpanReporter>,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path)
    }

    pub async fn send(&self, method: reqwest::Method, path: &str) -> u16 {
        self.client
            .request(method, self.url(path))
            .send()
            .await
            .unwrap()
            .status()
            .as_u16()
    }
}

pub async fn spawn_app(config: InstrumentationConfig) -> TestApp {
    let spans = Arc::new(InMemorySpanReporter::new());
    let app = Application::build(&config, spans.clone());
    let store = Arc::clone(&app.store);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = app.server.run(listener, server_shutdown).await;
    });

    TestApp {
        addr,
        store,
        spans,
        shutdown,
        client: reqwest::Client::new(),
    }
}

pub fn resource_class() -> &'static str {
    std::any::type_name::<SampleResource>()
}

/// Tags of a per-endpoint metric of the sample resource.
pub fn endpoint_tags(method: &str) -> TagSet {
    TagSet::new()
        .with("cluster", CLUSTER)
        .with("service", SERVICE)
        .with("shard", SHARD)
        .with("jersey.resource.class", resource_class())
        .with("jersey.resource.method", method)
        .with("operationName", format!("SampleResource.{method}"))
}

/// Tags of a route aggregate at `level` (application, cluster, service, shard).
pub fn route_aggregate_tags(method: &str, level: &str) -> TagSet {
    let mut tags = TagSet::new()
        .with("jersey.resource.class", resource_class())
        .with("jersey.resource.method", method)
        .with("operationName", format!("SampleResource.{method}"))
        .with("source", SOURCE);
    if level != "application" {
        tags.insert("cluster", CLUSTER);
    }
    if level == "service" || level == "shard" {
        tags.insert("service", SERVICE);
    }
    if level == "shard" {
        tags.insert("shard", SHARD);
    }
    tags
}

/// Tags of a process-wide aggregate at `level`.
pub fn process_tags(level: &str) -> TagSet {
    match level {
        "source" => TagSet::new()
            .with("cluster", CLUSTER)
            .with("service", SERVICE)
            .with("shard", SHARD),
        "shard" => TagSet::new()
            .with("cluster", CLUSTER)
            .with("service", SERVICE)
            .with("shard", SHARD)
            .with("source", SOURCE),
        "service" => TagSet::new()
            .with("cluster", CLUSTER)
            .with("service", SERVICE)
            .with("source", SOURCE),
        "cluster" => TagSet::new().with("cluster", CLUSTER).with("source", SOURCE),
        _ => TagSet::new().with("source", SOURCE),
    }
}

pub fn key(name: &str, tags: TagSet) -> MetricKey {
    MetricKey::new(name, tags)
}
