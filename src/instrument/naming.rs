//! Metric identity.
//!
//! # Responsibilities
//! - Sanitize route templates into metric-name-safe tokens
//! - Derive every per-endpoint metric name for a (template, method) pair
//! - Provide the fixed process-wide metric names
//!
//! # Naming Scheme
//! ```text
//! request.<path>.<METHOD>.inflight
//! response.<path>.<METHOD>.<status>.{cumulative,latency,cpu_ns}
//! response.<path>.<METHOD>.<status>.aggregated_per_<level>
//! response.<path>.<METHOD>.errors[.aggregated_per_<level>]
//! request.inflight
//! response.{completed,errors}.aggregated_per_<level>
//! ```
//! `sample/foo/bar/{id}` sanitizes to `sample.foo.bar._id_`; an empty
//! template contributes nothing, so the name starts with the method.

use crate::instrument::tags::Granularity;

pub const REQUEST_PREFIX: &str = "request";
pub const RESPONSE_PREFIX: &str = "response";

/// Process-wide in-flight gauge.
pub const OVERALL_INFLIGHT: &str = "request.inflight";

/// Turn a route template into a dotted metric token.
///
/// Placeholders (`{id}`, `{id: [0-9]+}`, `{*rest}`) become `_name_`;
/// separators become `.`; empty segments are skipped.
pub fn sanitize_path(template: &str) -> String {
    template
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(sanitize_segment)
        .collect::<Vec<_>>()
        .join(".")
}

fn sanitize_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        match after_open.find('}') {
            Some(close) => {
                out.push('_');
                out.push_str(placeholder_name(&after_open[..close]));
                out.push('_');
                rest = &after_open[close + 1..];
            }
            None => {
                // Unbalanced brace: keep the remainder literally.
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn placeholder_name(inner: &str) -> &str {
    let name = inner.split(':').next().unwrap_or(inner).trim();
    name.trim_start_matches('*')
}

fn join_name(prefix: &str, sanitized_path: &str, method: &str) -> String {
    if sanitized_path.is_empty() {
        format!("{prefix}.{method}")
    } else {
        format!("{prefix}.{sanitized_path}.{method}")
    }
}

/// All metric names of one endpoint (template + method).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricIdentity {
    request_base: String,
    response_base: String,
}

impl MetricIdentity {
    pub fn new(path_template: &str, method: &str) -> Self {
        let sanitized = sanitize_path(path_template);
        Self {
            request_base: join_name(REQUEST_PREFIX, &sanitized, method),
            response_base: join_name(RESPONSE_PREFIX, &sanitized, method),
        }
    }

    pub fn inflight(&self) -> String {
        format!("{}.inflight", self.request_base)
    }

    pub fn cumulative(&self, status: u16) -> String {
        format!("{}.{status}.cumulative", self.response_base)
    }

    pub fn aggregated(&self, status: u16, granularity: Granularity) -> String {
        format!("{}.{status}.aggregated_per_{granularity}", self.response_base)
    }

    pub fn latency(&self, status: u16) -> String {
        format!("{}.{status}.latency", self.response_base)
    }

    pub fn cpu_ns(&self, status: u16) -> String {
        format!("{}.{status}.cpu_ns", self.response_base)
    }

    /// Error counter; status is deliberately not part of the name.
    pub fn errors(&self) -> String {
        format!("{}.errors", self.response_base)
    }

    pub fn errors_aggregated(&self, granularity: Granularity) -> String {
        format!("{}.errors.aggregated_per_{granularity}", self.response_base)
    }
}

/// `response.completed.aggregated_per_<level>`
pub fn completed_aggregated(granularity: Granularity) -> String {
    format!("{RESPONSE_PREFIX}.completed.aggregated_per_{granularity}")
}

/// `response.errors.aggregated_per_<level>`
pub fn errors_aggregated(granularity: Granularity) -> String {
    format!("{RESPONSE_PREFIX}.errors.aggregated_per_{granularity}")
}
