//! Per-request tracing span.
//!
//! # Responsibilities
//! - Open a server span at request entry with the entry tags
//! - Close it at exit with status, resource and identity tags
//! - Hand the finished span to the configured reporter
//!
//! # Design Decisions
//! - `ActiveSpan::finish` consumes the span, so it cannot be finished twice
//! - Span tags keep the raw route template (`sample/foo/bar/{id}`), not the metric token

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use uuid::Uuid;

use crate::instrument::facts::{RequestFacts, ResponseFacts};
use crate::instrument::tags::{TagSet, TagVocabulary, RESOURCE_CLASS_TAG_KEY};

pub const SPAN_KIND_TAG: &str = "span.kind";
pub const SPAN_KIND_SERVER: &str = "server";
pub const COMPONENT_TAG: &str = "component";
pub const HTTP_METHOD_TAG: &str = "http.method";
pub const HTTP_URL_TAG: &str = "http.url";
pub const HTTP_STATUS_CODE_TAG: &str = "http.status_code";
pub const PATH_TAG: &str = "jersey.path";
pub const ERROR_TAG: &str = "error";

pub const DEFAULT_COMPONENT: &str = "jersey-server";

/// A completed span, immutable once handed to a reporter.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedSpan {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    pub operation_name: String,
    pub start: SystemTime,
    pub duration: Duration,
    pub tags: TagSet,
}

impl FinishedSpan {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key)
    }
}

/// Receiver of finished spans (the tracer).
pub trait SpanReporter: Send + Sync {
    fn report(&self, span: FinishedSpan);
}

/// A span that has been started but not finished.
#[derive(Debug)]
pub struct ActiveSpan {
    trace_id: Uuid,
    span_id: Uuid,
    operation_name: String,
    start: SystemTime,
    started_at: Instant,
    tags: TagSet,
}

impl ActiveSpan {
    /// Open a server span with the entry tags.
    pub fn start(request: &RequestFacts, component: &str) -> Self {
        let operation_name = request
            .operation_name
            .clone()
            .unwrap_or_else(|| format!("{} /{}", request.method, request.path_template));

        let tags = TagSet::new()
            .with(SPAN_KIND_TAG, SPAN_KIND_SERVER)
            .with(COMPONENT_TAG, component)
            .with(HTTP_METHOD_TAG, request.method.as_str())
            .with(HTTP_URL_TAG, request.url.as_str());

        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            operation_name,
            start: SystemTime::now(),
            started_at: request.started_at,
            tags,
        }
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Close the span with the exit tags.
    ///
    /// Identity and custom tags go in first; entry and exit tags are
    /// written over them, so a custom tag can never replace a contract tag.
    pub fn finish(
        self,
        request: &RequestFacts,
        response: &ResponseFacts,
        vocabulary: &TagVocabulary,
        is_error: bool,
    ) -> FinishedSpan {
        let mut tags = vocabulary.span_identity_tags();
        for (key, value) in self.tags.iter() {
            tags.insert(key, value);
        }
        tags.insert(HTTP_STATUS_CODE_TAG, response.status.to_string());
        if let Some(class) = &request.resource_class {
            tags.insert(RESOURCE_CLASS_TAG_KEY, class.as_str());
        }
        tags.insert(PATH_TAG, request.path_template.as_str());
        if is_error {
            tags.insert(ERROR_TAG, "true");
        }

        FinishedSpan {
            trace_id: self.trace_id,
            span_id: self.span_id,
            operation_name: self.operation_name,
            start: self.start,
            duration: response.finished_at.saturating_duration_since(self.started_at),
            tags,
        }
    }
}

/// Keeps finished spans in memory; used by tests and the admin API.
#[derive(Debug, Default)]
pub struct InMemorySpanReporter {
    spans: Mutex<Vec<FinishedSpan>>,
}

impl InMemorySpanReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent span with the given operation name.
    pub fn find(&self, operation_name: &str) -> Option<FinishedSpan> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|s| s.operation_name == operation_name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpanReporter for InMemorySpanReporter {
    fn report(&self, span: FinishedSpan) {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span);
    }
}
