//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (flush interval > 0, status threshold is an HTTP status)
//! - Reject custom tags that would shadow instrumentation-owned keys
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: InstrumentationConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::InstrumentationConfig;
use crate::instrument::tags::RESERVED_TAG_KEYS;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("application name must not be empty")]
    EmptyApplication,

    #[error("provided source must not be empty")]
    EmptyProvidedSource,

    #[error("custom tag '{0}' shadows a reserved tag key")]
    ReservedCustomTag(String),

    #[error("error_status_threshold {0} is not in 100..=599")]
    ThresholdOutOfRange(u16),

    #[error("flush_interval_secs must be greater than zero")]
    ZeroFlushInterval,

    #[error("request_timeout_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("admin api_key must not be empty when admin is enabled")]
    EmptyAdminKey,
}

/// Check a parsed configuration.
pub fn validate_config(config: &InstrumentationConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.application.application.trim().is_empty() {
        errors.push(ValidationError::EmptyApplication);
    }
    if config.application.provided_source.trim().is_empty() {
        errors.push(ValidationError::EmptyProvidedSource);
    }
    for key in config.application.custom_tags.keys() {
        if RESERVED_TAG_KEYS.contains(&key.as_str()) {
            errors.push(ValidationError::ReservedCustomTag(key.clone()));
        }
    }

    let threshold = config.instrumentation.error_status_threshold;
    if !(100..=599).contains(&threshold) {
        errors.push(ValidationError::ThresholdOutOfRange(threshold));
    }

    if config.reporting.enabled && config.reporting.flush_interval_secs == 0 {
        errors.push(ValidationError::ZeroFlushInterval);
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::EmptyAdminKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
