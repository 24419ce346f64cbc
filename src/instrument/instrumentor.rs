//! Request instrumentor.
//!
//! # Responsibilities
//! - Increment the endpoint and process-wide in-flight gauges on entry
//! - Open the request span on entry
//! - On exit, update every counter and histogram the request contributes to
//! - Guarantee the exit phase runs exactly once, even on fault or cancellation
//!
//! # Lifecycle
//! ```text
//! enter() ──► ENTERED ──complete(status)──────────────► COMPLETED
//!                │                                        ▲
//!                └──fault()──► FAULTED ──complete(500)────┤
//!                                                         │
//!           dropped before complete (cancellation) ───────┘ (status 500)
//! ```
//!
//! # Design Decisions
//! - `InFlightRequest` is an RAII guard; `Drop` runs the exit phase if it has not run
//! - Nothing on this path returns an error; store operations are infallible

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::config::InstrumentationConfig;
use crate::instrument::cpu::CpuMeter;
use crate::instrument::facts::{RequestFacts, ResponseFacts};
use crate::instrument::naming::{self, MetricIdentity, OVERALL_INFLIGHT};
use crate::instrument::span::{ActiveSpan, SpanReporter, DEFAULT_COMPONENT};
use crate::instrument::tags::{ApplicationTags, Granularity, TagSet, TagVocabulary};
use crate::store::{AggregationStore, MetricKey};

/// Status reported for requests whose handler faulted or was cancelled.
pub const FAULT_STATUS: u16 = 500;

/// Decides which statuses count as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    pub error_threshold: u16,
    pub redirects_are_errors: bool,
}

impl StatusPolicy {
    pub fn is_error(&self, status: u16) -> bool {
        status >= self.error_threshold
            || (self.redirects_are_errors && (300..400).contains(&status))
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            error_threshold: 400,
            redirects_are_errors: false,
        }
    }
}

/// Phase of one instrumented request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Entered,
    Faulted,
    Completed,
}

/// Shared instrumentation engine; one per process, cloned by `Arc`.
pub struct Instrumentor {
    store: Arc<AggregationStore>,
    vocabulary: TagVocabulary,
    policy: StatusPolicy,
    component: String,
    spans: Arc<dyn SpanReporter>,
    overall_inflight: MetricKey,
}

impl std::fmt::Debug for Instrumentor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentor")
            .field("vocabulary", &self.vocabulary)
            .field("policy", &self.policy)
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

impl Instrumentor {
    pub fn new(
        store: Arc<AggregationStore>,
        vocabulary: TagVocabulary,
        spans: Arc<dyn SpanReporter>,
    ) -> Self {
        let overall_inflight =
            MetricKey::new(OVERALL_INFLIGHT, vocabulary.metric_tags(Granularity::Source, None));
        Self {
            store,
            vocabulary,
            policy: StatusPolicy::default(),
            component: DEFAULT_COMPONENT.to_string(),
            spans,
            overall_inflight,
        }
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    /// Build an instrumentor from a validated configuration.
    pub fn from_config(
        config: &InstrumentationConfig,
        store: Arc<AggregationStore>,
        spans: Arc<dyn SpanReporter>,
    ) -> Self {
        let vocabulary = TagVocabulary::new(ApplicationTags::from_config(&config.application))
            .with_provided_source(config.application.provided_source.as_str());
        Self::new(store, vocabulary, spans)
            .with_policy(StatusPolicy {
                error_threshold: config.instrumentation.error_status_threshold,
                redirects_are_errors: config.instrumentation.count_redirects_as_errors,
            })
            .with_component(config.application.component.as_str())
    }

    pub fn store(&self) -> &Arc<AggregationStore> {
        &self.store
    }

    pub fn vocabulary(&self) -> &TagVocabulary {
        &self.vocabulary
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Entry phase. The returned guard performs the exit phase.
    pub fn enter(self: &Arc<Self>, request: RequestFacts) -> InFlightRequest {
        let identity = MetricIdentity::new(&request.path_template, &request.method);
        let endpoint_tags = self.vocabulary.metric_tags(Granularity::Endpoint, Some(&request));
        let inflight = MetricKey::new(identity.inflight(), endpoint_tags.clone());

        self.store.increment_gauge(&inflight);
        self.store.increment_gauge(&self.overall_inflight);

        let span = ActiveSpan::start(&request, &self.component);
        let cpu = CpuMeter::running_from(request.cpu_start);

        tracing::trace!(
            method = %request.method,
            template = %request.path_template,
            path = %request.raw_path,
            "request entered"
        );

        InFlightRequest {
            instrumentor: Arc::clone(self),
            request,
            identity,
            endpoint_tags,
            inflight,
            span: Some(span),
            cpu,
            state: RequestState::Entered,
        }
    }

    /// Run a synchronous handler under instrumentation.
    ///
    /// A panicking handler is recorded as a fault and reported as status 500;
    /// the panic does not escape.
    pub fn observe<F>(self: &Arc<Self>, request: RequestFacts, handler: F) -> u16
    where
        F: FnOnce() -> u16,
    {
        let mut in_flight = self.enter(request);
        match panic::catch_unwind(AssertUnwindSafe(handler)) {
            Ok(status) => in_flight.complete(status).status,
            Err(_) => {
                in_flight.fault();
                in_flight.complete(FAULT_STATUS).status
            }
        }
    }

    fn record_exit(
        &self,
        request: &RequestFacts,
        identity: &MetricIdentity,
        endpoint_tags: &TagSet,
        response: &ResponseFacts,
    ) -> bool {
        let status = response.status;
        let store = &self.store;
        let vocab = &self.vocabulary;

        store.increment_counter(&MetricKey::new(identity.cumulative(status), endpoint_tags.clone()));
        for granularity in Granularity::ROUTE_AGGREGATES {
            let tags = vocab.metric_tags(granularity, Some(request));
            store.increment_delta(&MetricKey::new(identity.aggregated(status, granularity), tags));
        }

        let elapsed = response.finished_at.saturating_duration_since(request.started_at);
        store.record_histogram(
            &MetricKey::new(identity.latency(status), endpoint_tags.clone()),
            elapsed.as_secs_f64() * 1_000.0,
        );
        store.record_histogram(
            &MetricKey::new(identity.cpu_ns(status), endpoint_tags.clone()),
            response.cpu_time.as_nanos() as f64,
        );

        let is_error = self.policy.is_error(status);
        if is_error {
            store.increment_counter(&MetricKey::new(identity.errors(), endpoint_tags.clone()));
            for granularity in Granularity::ROUTE_AGGREGATES {
                let tags = vocab.metric_tags(granularity, Some(request));
                store.increment_delta(&MetricKey::new(identity.errors_aggregated(granularity), tags));
            }
            for granularity in Granularity::PROCESS_AGGREGATES {
                let tags = vocab.metric_tags(granularity, None);
                store.increment_delta(&MetricKey::new(naming::errors_aggregated(granularity), tags));
            }
        }

        for granularity in Granularity::PROCESS_AGGREGATES {
            let tags = vocab.metric_tags(granularity, None);
            store.increment_delta(&MetricKey::new(naming::completed_aggregated(granularity), tags));
        }

        is_error
    }
}

/// Guard for one request between entry and exit.
#[derive(Debug)]
pub struct InFlightRequest {
    instrumentor: Arc<Instrumentor>,
    request: RequestFacts,
    identity: MetricIdentity,
    endpoint_tags: TagSet,
    inflight: MetricKey,
    span: Option<ActiveSpan>,
    cpu: CpuMeter,
    state: RequestState,
}

impl InFlightRequest {
    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn request(&self) -> &RequestFacts {
        &self.request
    }

    /// Record that the handler raised a fault.
    pub fn fault(&mut self) {
        if self.state == RequestState::Entered {
            self.state = RequestState::Faulted;
        }
    }

    pub fn cpu_mut(&mut self) -> &mut CpuMeter {
        &mut self.cpu
    }

    /// Exit phase with the handler's status.
    pub fn complete(mut self, status: u16) -> ResponseFacts {
        let faulted = self.state == RequestState::Faulted;
        self.exit(status, faulted)
    }

    fn exit(&mut self, status: u16, faulted: bool) -> ResponseFacts {
        self.cpu.suspend();
        let response = ResponseFacts {
            status,
            finished_at: Instant::now(),
            cpu_time: self.cpu.consumed(),
            faulted,
        };

        let instrumentor = &self.instrumentor;
        instrumentor.store.decrement_gauge(&self.inflight);
        instrumentor.store.decrement_gauge(&instrumentor.overall_inflight);

        let is_error =
            instrumentor.record_exit(&self.request, &self.identity, &self.endpoint_tags, &response);

        if let Some(span) = self.span.take() {
            let finished = span.finish(&self.request, &response, &instrumentor.vocabulary, is_error);
            instrumentor.spans.report(finished);
        }

        self.state = RequestState::Completed;
        tracing::trace!(
            method = %self.request.method,
            template = %self.request.path_template,
            status,
            faulted,
            "request completed"
        );
        response
    }
}

impl Drop for InFlightRequest {
    fn drop(&mut self) {
        if self.state != RequestState::Completed {
            tracing::warn!(
                method = %self.request.method,
                template = %self.request.path_template,
                path = %self.request.raw_path,
                "request dropped before completion, recording as fault"
            );
            self.exit(FAULT_STATUS, true);
        }
    }
}
