//! Concurrency tests: parallel requests and concurrent draining.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use axum::body::Body;
use axum::http::{Method, Request};
use futures_util::future::join_all;
use tower::ServiceExt;

use common::*;
use request_instrumentation::instrument::naming::OVERALL_INFLIGHT;
use request_instrumentation::instrument::{
    ApplicationTags, InMemorySpanReporter, Instrumentor, RequestFacts, ResourceInfo,
    TagVocabulary,
};
use request_instrumentation::lifecycle::Application;
use request_instrumentation::store::AggregationStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_requests_settle_gauges() {
    const REQUESTS: usize = 64;
    let spans = Arc::new(InMemorySpanReporter::new());
    let app = Application::build(&sample_config(), spans.clone());
    let router = app.router();

    let requests = (0..REQUESTS).map(|i| {
        let router = router.clone();
        tokio::spawn(async move {
            let req = Request::builder()
                .method(Method::GET)
                .uri(format!("/sample/foo/bar/{i}"))
                .body(Body::empty())
                .unwrap();
            router.oneshot(req).await.unwrap().status().as_u16()
        })
    });
    let statuses = join_all(requests).await;
    assert!(statuses.into_iter().all(|s| s.unwrap() == 200));

    let tags = endpoint_tags("barGet");
    assert_eq!(
        app.store
            .gauge(&key("request.sample.foo.bar._id_.GET.inflight", tags.clone())),
        Some(0)
    );
    assert_eq!(
        app.store.gauge(&key(OVERALL_INFLIGHT, process_tags("source"))),
        Some(0)
    );
    assert_eq!(
        app.store
            .counter(&key("response.sample.foo.bar._id_.GET.200.cumulative", tags)),
        Some(REQUESTS as u64)
    );
    assert_eq!(
        app.store.delta(&key(
            "response.completed.aggregated_per_application",
            process_tags("application")
        )),
        Some(REQUESTS as u64)
    );
    assert_eq!(spans.len(), REQUESTS);
}

#[test]
fn test_drain_concurrent_with_requests_loses_nothing() {
    const WRITERS: usize = 4;
    const PER_WRITER: usize = 2_000;

    let store = Arc::new(AggregationStore::new());
    let inst = Arc::new(Instrumentor::new(
        Arc::clone(&store),
        TagVocabulary::new(ApplicationTags::new("wavefront").with_cluster("c")),
        Arc::new(InMemorySpanReporter::new()),
    ));
    let completed = key(
        "response.completed.aggregated_per_application",
        request_instrumentation::instrument::TagSet::new().with("source", SOURCE),
    );

    let done = Arc::new(AtomicBool::new(false));
    let drainer = {
        let store = Arc::clone(&store);
        let completed = completed.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut drained = 0u64;
            while !done.load(Ordering::Acquire) {
                drained += store.drain_delta(&completed).unwrap_or(0);
                thread::yield_now();
            }
            drained
        })
    };

    let writers: Vec<_> = (0..WRITERS)
        .map(|_| {
            let inst = Arc::clone(&inst);
            thread::spawn(move || {
                for _ in 0..PER_WRITER {
                    let facts = RequestFacts::new("GET", "/sample/foo/bar", "/sample/foo/bar")
                        .with_resource(&ResourceInfo::new("app.SampleResource", "getAll"));
                    inst.observe(facts, || 200);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Release);

    let drained = drainer.join().unwrap();
    let remaining = store.delta(&completed).unwrap_or(0);
    assert_eq!(drained + remaining, (WRITERS * PER_WRITER) as u64);
}

#[tokio::test]
async fn test_delta_counts_only_since_last_drain() {
    let spans = Arc::new(InMemorySpanReporter::new());
    let app = Application::build(&sample_config(), spans);
    let router = app.router();

    let send = |router: axum::Router| async move {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/sample/foo/bar")
            .body(Body::empty())
            .unwrap();
        router.oneshot(req).await.unwrap().status().as_u16()
    };

    assert_eq!(send(router.clone()).await, 204);
    assert_eq!(send(router.clone()).await, 204);

    let tags = endpoint_tags("barCreate");
    let cumulative = key("response.sample.foo.bar.POST.204.cumulative", tags);
    let per_shard = key(
        "response.sample.foo.bar.POST.204.aggregated_per_shard",
        route_aggregate_tags("barCreate", "shard"),
    );
    assert_eq!(app.store.counter(&cumulative), Some(2));
    assert_eq!(app.store.delta(&per_shard), Some(2));

    let batch = app.store.drain();
    assert!(!batch.is_empty());
    assert_eq!(app.store.delta(&per_shard), Some(0));
    // Cumulative counters are never reset by a drain.
    assert_eq!(app.store.counter(&cumulative), Some(2));

    assert_eq!(send(router).await, 204);
    assert_eq!(app.store.delta(&per_shard), Some(1));
    assert_eq!(app.store.counter(&cumulative), Some(3));
}
