//! Request and response facts.
//!
//! # Responsibilities
//! - Capture what the router knows about a request at dispatch time
//! - Capture the outcome of a request once the handler returns (or faults)
//!
//! # Design Decisions
//! - Facts are plain data; nothing here touches the store or the tracer
//! - Resource identity is supplied explicitly by the router adapter, never discovered
//! - Missing resource metadata is represented as `None` and simply drops tags later

use std::time::{Duration, Instant};

use crate::instrument::cpu;

/// Identity of the handler that serves a route.
///
/// `class` is the fully-qualified resource identifier (reported as
/// `jersey.resource.class`), `method` the handler method (`jersey.resource.method`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceInfo {
    pub class: String,
    pub method: String,
}

impl ResourceInfo {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
        }
    }

    /// Resource identity for a Rust type, using its fully-qualified type name.
    pub fn of<T: ?Sized>(method: impl Into<String>) -> Self {
        Self::new(std::any::type_name::<T>(), method)
    }

    /// Last segment of the class identifier (`a.b.Foo`, `a::b::Foo` or
    /// `a::b::Foo<c::Bar>` → `Foo`).
    pub fn simple_class_name(&self) -> &str {
        simple_name(&self.class)
    }

    /// Logical operation name: `SimpleClass.method`.
    pub fn operation_name(&self) -> String {
        format!("{}.{}", self.simple_class_name(), self.method)
    }
}

fn simple_name(class: &str) -> &str {
    // Generic arguments may contain paths of their own.
    let base = class.split('<').next().unwrap_or(class);
    let after_path = base.rsplit("::").next().unwrap_or(base);
    after_path.rsplit('.').next().unwrap_or(after_path)
}

/// Everything known about a request when it enters the instrumentor.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    /// HTTP method, upper case (`GET`, `POST`, ...).
    pub method: String,
    /// Raw request path as received.
    pub raw_path: String,
    /// Full request URL used for the `http.url` span tag.
    pub url: String,
    /// Matched route template with placeholders, without leading/trailing `/`.
    pub path_template: String,
    pub resource_class: Option<String>,
    pub resource_method: Option<String>,
    pub operation_name: Option<String>,
    pub started_at: Instant,
    /// Thread CPU clock reading at entry, if the platform provides one.
    pub cpu_start: Option<Duration>,
}

impl RequestFacts {
    /// Capture facts for a request. Wall-clock and CPU readings are taken now.
    pub fn new(method: &str, raw_path: &str, path_template: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            raw_path: raw_path.to_string(),
            url: raw_path.to_string(),
            path_template: normalize_template(path_template).to_string(),
            resource_class: None,
            resource_method: None,
            operation_name: None,
            started_at: Instant::now(),
            cpu_start: cpu::thread_cpu_time(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_resource(mut self, resource: &ResourceInfo) -> Self {
        self.operation_name = Some(resource.operation_name());
        self.resource_class = Some(resource.class.clone());
        self.resource_method = Some(resource.method.clone());
        self
    }
}

/// Strip leading and trailing separators from a route template.
pub fn normalize_template(template: &str) -> &str {
    template.trim_matches('/')
}

/// Outcome of a request, produced exactly once at exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFacts {
    pub status: u16,
    pub finished_at: Instant,
    /// CPU time consumed while the request was being polled.
    pub cpu_time: Duration,
    /// True when the handler raised a fault or the request was cancelled.
    pub faulted: bool,
}
