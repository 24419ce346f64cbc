//! Tower middleware that instruments matched axum routes.
//!
//! # Responsibilities
//! - Extract routing metadata (`MatchedPath`, resource identity) before dispatch
//! - Enter the instrumentor, meter CPU per poll, complete on the response status
//! - Recover handler panics as `500` responses
//!
//! # Design Decisions
//! - Requests without a `MatchedPath` (fallbacks, 404s) pass through uninstrumented
//! - Inner-service errors are counted as `500` and returned unchanged
//! - Dropping the response future before it resolves is recorded as a fault by
//!   the `InFlightRequest` guard

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::MatchedPath;
use axum::http::{header, Request, Response, StatusCode};
use tower::{Layer, Service};

use crate::instrument::{InFlightRequest, Instrumentor, RequestFacts, ResourceInfo, FAULT_STATUS};

/// Layer applying [`InstrumentService`].
///
/// Attach with [`InstrumentLayer::for_resource`] on a single method router to
/// carry resource identity, or as a router-wide layer where resource identity
/// comes from a `ResourceInfo` request extension (if any).
#[derive(Debug, Clone)]
pub struct InstrumentLayer {
    instrumentor: Arc<Instrumentor>,
    resource: Option<ResourceInfo>,
    scheme: Arc<str>,
}

impl InstrumentLayer {
    pub fn new(instrumentor: Arc<Instrumentor>) -> Self {
        Self {
            instrumentor,
            resource: None,
            scheme: Arc::from("http"),
        }
    }

    /// Instrument a route served by `resource`.
    pub fn for_resource(instrumentor: Arc<Instrumentor>, resource: ResourceInfo) -> Self {
        Self {
            resource: Some(resource),
            ..Self::new(instrumentor)
        }
    }

    /// Scheme used when building the `http.url` span tag.
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = Arc::from(scheme);
        self
    }
}

impl<S> Layer<S> for InstrumentLayer {
    type Service = InstrumentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InstrumentService {
            inner,
            instrumentor: Arc::clone(&self.instrumentor),
            resource: self.resource.clone(),
            scheme: Arc::clone(&self.scheme),
        }
    }
}

/// Instrumenting service wrapper.
#[derive(Debug, Clone)]
pub struct InstrumentService<S> {
    inner: S,
    instrumentor: Arc<Instrumentor>,
    resource: Option<ResourceInfo>,
    scheme: Arc<str>,
}

impl<S, B, RB> Service<Request<B>> for InstrumentService<S>
where
    S: Service<Request<B>, Response = Response<RB>>,
    RB: Default,
{
    type Response = Response<RB>;
    type Error = S::Error;
    type Future = InstrumentedFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let Some(facts) = self.request_facts(&req) else {
            return InstrumentedFuture {
                inner: Box::pin(self.inner.call(req)),
                in_flight: None,
            };
        };

        let mut in_flight = self.instrumentor.enter(facts);
        let inner = self.inner.call(req);
        // Polling may resume on another worker thread.
        in_flight.cpu_mut().suspend();

        InstrumentedFuture {
            inner: Box::pin(inner),
            in_flight: Some(in_flight),
        }
    }
}

impl<S> InstrumentService<S> {
    fn request_facts<B>(&self, req: &Request<B>) -> Option<RequestFacts> {
        let template = req.extensions().get::<MatchedPath>()?;
        let resource = self
            .resource
            .as_ref()
            .or_else(|| req.extensions().get::<ResourceInfo>());

        let facts = RequestFacts::new(req.method().as_str(), req.uri().path(), template.as_str())
            .with_url(request_url(&self.scheme, req));
        Some(match resource {
            Some(resource) => facts.with_resource(resource),
            None => facts,
        })
    }
}

/// `<scheme>://<host><path>`; falls back to the bare path without a host.
fn request_url<B>(scheme: &str, req: &Request<B>) -> String {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()));
    let path = req.uri().path();
    match host {
        Some(host) => format!("{scheme}://{host}{path}"),
        None => path.to_string(),
    }
}

/// Response future for [`InstrumentService`].
pub struct InstrumentedFuture<F> {
    inner: Pin<Box<F>>,
    in_flight: Option<InFlightRequest>,
}

impl<F, RB, E> Future for InstrumentedFuture<F>
where
    F: Future<Output = Result<Response<RB>, E>>,
    RB: Default,
{
    type Output = Result<Response<RB>, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let Some(in_flight) = this.in_flight.as_mut() else {
            return this.inner.as_mut().poll(cx);
        };

        in_flight.cpu_mut().resume();
        let polled = panic::catch_unwind(AssertUnwindSafe(|| this.inner.as_mut().poll(cx)));
        in_flight.cpu_mut().suspend();

        let outcome = match polled {
            Ok(Poll::Pending) => return Poll::Pending,
            Ok(Poll::Ready(outcome)) => outcome,
            Err(payload) => {
                let Some(mut in_flight) = this.in_flight.take() else {
                    return Poll::Ready(Ok(fault_response()));
                };
                tracing::warn!(
                    method = %in_flight.request().method,
                    template = %in_flight.request().path_template,
                    panic = %panic_message(payload.as_ref()),
                    "handler panicked"
                );
                in_flight.fault();
                in_flight.complete(FAULT_STATUS);
                return Poll::Ready(Ok(fault_response()));
            }
        };

        if let Some(mut in_flight) = this.in_flight.take() {
            match &outcome {
                Ok(response) => {
                    in_flight.complete(response.status().as_u16());
                }
                Err(_) => {
                    in_flight.fault();
                    in_flight.complete(FAULT_STATUS);
                }
            }
        }
        Poll::Ready(outcome)
    }
}

fn fault_response<RB: Default>() -> Response<RB> {
    let mut response = Response::new(RB::default());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use crate::instrument::{ApplicationTags, InMemorySpanReporter, TagVocabulary};
    use crate::store::AggregationStore;

    fn instrumentor() -> (Arc<Instrumentor>, Arc<InMemorySpanReporter>) {
        let spans = Arc::new(InMemorySpanReporter::new());
        let inst = Instrumentor::new(
            Arc::new(AggregationStore::new()),
            TagVocabulary::new(ApplicationTags::new("test")),
            spans.clone(),
        );
        (Arc::new(inst), spans)
    }

    #[test]
    fn test_request_url_uses_host_header() {
        let req = Request::builder()
            .uri("/items/7")
            .header(header::HOST, "localhost:8080")
            .body(())
            .unwrap();
        assert_eq!(request_url("http", &req), "http://localhost:8080/items/7");

        let bare = Request::builder().uri("/items/7").body(()).unwrap();
        assert_eq!(request_url("http", &bare), "/items/7");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_router_layer_uses_matched_path() {
        let (inst, spans) = instrumentor();
        let app = Router::new()
            .route("/items/{id}", get(|| async { "ok" }))
            .layer(InstrumentLayer::new(inst.clone()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/items/42")
                    .header(header::HOST, "example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let span = spans.find("GET /items/{id}").unwrap();
        assert_eq!(span.tag("jersey.path"), Some("items/{id}"));
        assert_eq!(span.tag("http.url"), Some("http://example.com/items/42"));
        assert!(inst
            .store()
            .snapshot()
            .counters
            .iter()
            .any(|s| s.name == "response.items._id_.GET.200.cumulative" && s.value == 1));
    }

    #[tokio::test]
    async fn test_unmatched_request_passes_through() {
        let (inst, spans) = instrumentor();
        let app = Router::new()
            .route("/items", get(|| async { "ok" }))
            .layer(InstrumentLayer::new(inst.clone()));

        let response = app
            .oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(spans.is_empty());
        assert!(inst.store().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_500() {
        async fn explode() -> &'static str {
            panic!("handler failure")
        }

        let (inst, spans) = instrumentor();
        let app = Router::new().route(
            "/boom",
            get(explode).layer(InstrumentLayer::for_resource(
                inst.clone(),
                ResourceInfo::new("tests.Boom", "explode"),
            )),
        );

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let span = spans.find("Boom.explode").unwrap();
        assert_eq!(span.tag("http.status_code"), Some("500"));
        assert_eq!(span.tag("error"), Some("true"));
        let gauges = inst.store().snapshot().gauges;
        assert!(gauges.iter().all(|g| g.value == 0));
    }
}
