//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! instrumented server. All types derive Serde traits for deserialization
//! from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::instrument::span::DEFAULT_COMPONENT;
use crate::instrument::tags::DEFAULT_PROVIDED_SOURCE;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Static application identity and span tags.
    pub application: ApplicationConfig,

    /// Request classification.
    pub instrumentation: PolicyConfig,

    /// Periodic flush of the aggregation store.
    pub reporting: ReportingConfig,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Application identity attached to metrics and spans.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name (the `application` span tag).
    pub application: String,

    /// Cluster name; omitted from tags when absent.
    pub cluster: Option<String>,

    /// Service name; omitted from tags when absent.
    pub service: Option<String>,

    /// Shard name; omitted from tags when absent.
    pub shard: Option<String>,

    /// Extra span tags (e.g. `location`, `env`).
    pub custom_tags: BTreeMap<String, String>,

    /// Value of the `source` tag on aggregated metrics.
    pub provided_source: String,

    /// Value of the `component` span tag.
    pub component: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            application: "wavefront".to_string(),
            cluster: None,
            service: None,
            shard: None,
            custom_tags: BTreeMap::new(),
            provided_source: DEFAULT_PROVIDED_SOURCE.to_string(),
            component: DEFAULT_COMPONENT.to_string(),
        }
    }
}

/// How responses are classified.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Statuses at or above this value count as errors.
    pub error_status_threshold: u16,

    /// Count 3xx responses as errors too.
    pub count_redirects_as_errors: bool,

    /// Scheme used to build the `http.url` span tag.
    pub scheme: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            error_status_threshold: 400,
            count_redirects_as_errors: false,
            scheme: "http".to_string(),
        }
    }
}

/// Where flushed batches go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Write each batch to the log.
    Logging,
    /// Forward each batch to the `metrics` facade.
    Metrics,
}

/// Reporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Run the periodic reporter.
    pub enabled: bool,

    /// Seconds between flushes.
    pub flush_interval_secs: u64,

    /// Sink receiving drained batches.
    pub sink: SinkKind,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flush_interval_secs: 60,
            sink: SinkKind::Logging,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout; a timed-out request is recorded as a fault.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: InstrumentationConfig = toml::from_str("").unwrap();
        assert_eq!(config.application.application, "wavefront");
        assert_eq!(config.application.provided_source, "wavefront-provided");
        assert_eq!(config.application.component, "jersey-server");
        assert_eq!(config.instrumentation.error_status_threshold, 400);
        assert_eq!(config.reporting.flush_interval_secs, 60);
        assert_eq!(config.reporting.sink, SinkKind::Logging);
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_parse_application_section() {
        let toml = r#"
            [application]
            application = "shop"
            cluster = "us-west"
            service = "checkout"

            [application.custom_tags]
            location = "SF"
            env = "Staging"

            [reporting]
            sink = "metrics"
            flush_interval_secs = 5
        "#;
        let config: InstrumentationConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.application.application, "shop");
        assert_eq!(config.application.cluster.as_deref(), Some("us-west"));
        assert!(config.application.shard.is_none());
        assert_eq!(config.application.custom_tags.len(), 2);
        assert_eq!(config.reporting.sink, SinkKind::Metrics);
        assert_eq!(config.reporting.flush_interval_secs, 5);
    }
}
