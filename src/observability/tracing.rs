//! Finished-span reporting through `tracing`.
//!
//! # Responsibilities
//! - Publish each finished request span as a structured log event
//! - Fan out to additional reporters (e.g. the in-memory one the admin API reads)

use std::sync::Arc;

use crate::instrument::span::{FinishedSpan, SpanReporter};

/// Logs finished spans at `debug` under the `request_instrumentation::span` target.
#[derive(Default)]
pub struct TracingSpanReporter {
    forward: Vec<Arc<dyn SpanReporter>>,
}

impl TracingSpanReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also hand every span to `reporter`.
    pub fn with_forward(mut self, reporter: Arc<dyn SpanReporter>) -> Self {
        self.forward.push(reporter);
        self
    }
}

impl SpanReporter for TracingSpanReporter {
    fn report(&self, span: FinishedSpan) {
        tracing::debug!(
            target: "request_instrumentation::span",
            trace_id = %span.trace_id,
            span_id = %span.span_id,
            operation = %span.operation_name,
            duration_ms = span.duration.as_secs_f64() * 1_000.0,
            status = span.tag("http.status_code").unwrap_or("-"),
            error = span.tag("error").is_some(),
            "span finished"
        );
        if let Some((last, rest)) = self.forward.split_last() {
            for reporter in rest {
                reporter.report(span.clone());
            }
            last.report(span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::facts::{RequestFacts, ResponseFacts};
    use crate::instrument::span::{ActiveSpan, InMemorySpanReporter, DEFAULT_COMPONENT};
    use crate::instrument::tags::{ApplicationTags, TagVocabulary};
    use std::time::{Duration, Instant};

    #[test]
    fn test_forwards_to_every_reporter() {
        let a = Arc::new(InMemorySpanReporter::new());
        let b = Arc::new(InMemorySpanReporter::new());
        let reporter = TracingSpanReporter::new()
            .with_forward(a.clone())
            .with_forward(b.clone());

        let request = RequestFacts::new("GET", "/x", "x");
        let response = ResponseFacts {
            status: 200,
            finished_at: Instant::now(),
            cpu_time: Duration::ZERO,
            faulted: false,
        };
        let vocabulary = TagVocabulary::new(ApplicationTags::new("app"));
        let span = ActiveSpan::start(&request, DEFAULT_COMPONENT).finish(
            &request,
            &response,
            &vocabulary,
            false,
        );
        reporter.report(span);

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
