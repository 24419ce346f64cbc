//! Sample resource served by the binary and exercised by integration tests.
//!
//! ```text
//! POST   /sample/foo/bar        barCreate  → 204
//! GET    /sample/foo/bar        getAll     → 200
//! GET    /sample/foo/bar/{id}   barGet     → 200 (500 for id "error")
//! PUT    /sample/foo/bar/{id}   barUpdate  → 204
//! DELETE /sample/foo/bar/{id}   barDelete  → 204
//! ```

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;

use crate::http::InstrumentLayer;
use crate::instrument::{Instrumentor, ResourceInfo};

/// Marker type naming the sample resource in `jersey.resource.class`.
pub struct SampleResource;

#[derive(Debug, Serialize)]
pub struct Bar {
    pub id: String,
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to load bar")]
    Failure,
}

impl IntoResponse for SampleError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

async fn bar_create() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn get_all() -> Json<Vec<Bar>> {
    Json(vec![Bar {
        id: "bar".to_string(),
    }])
}

async fn bar_get(Path(id): Path<String>) -> Result<Json<Bar>, SampleError> {
    if id == "error" {
        return Err(SampleError::Failure);
    }
    Ok(Json(Bar { id }))
}

async fn bar_update(Path(_id): Path<String>) -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn bar_delete(Path(_id): Path<String>) -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Build the sample router with every route instrumented.
pub fn router(instrumentor: Arc<Instrumentor>, scheme: &str) -> Router {
    let layer = |method: &str| {
        InstrumentLayer::for_resource(
            Arc::clone(&instrumentor),
            ResourceInfo::of::<SampleResource>(method),
        )
        .with_scheme(scheme)
    };

    Router::new()
        .route("/sample/foo/bar", post(bar_create).layer(layer("barCreate")))
        .route("/sample/foo/bar", get(get_all).layer(layer("getAll")))
        .route("/sample/foo/bar/{id}", get(bar_get).layer(layer("barGet")))
        .route("/sample/foo/bar/{id}", put(bar_update).layer(layer("barUpdate")))
        .route("/sample/foo/bar/{id}", delete(bar_delete).layer(layer("barDelete")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    use crate::instrument::{ApplicationTags, InMemorySpanReporter, TagVocabulary};
    use crate::store::AggregationStore;

    fn app() -> (Router, Arc<InMemorySpanReporter>) {
        let spans = Arc::new(InMemorySpanReporter::new());
        let inst = Arc::new(Instrumentor::new(
            Arc::new(AggregationStore::new()),
            TagVocabulary::new(ApplicationTags::new("wavefront")),
            spans.clone(),
        ));
        (router(inst, "http"), spans)
    }

    async fn send(app: Router, method: Method, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_sample_statuses() {
        let (app, spans) = app();
        assert_eq!(send(app.clone(), Method::POST, "/sample/foo/bar").await, StatusCode::NO_CONTENT);
        assert_eq!(send(app.clone(), Method::GET, "/sample/foo/bar").await, StatusCode::OK);
        assert_eq!(send(app.clone(), Method::GET, "/sample/foo/bar/1").await, StatusCode::OK);
        assert_eq!(send(app.clone(), Method::PUT, "/sample/foo/bar/1").await, StatusCode::NO_CONTENT);
        assert_eq!(send(app.clone(), Method::DELETE, "/sample/foo/bar/1").await, StatusCode::NO_CONTENT);
        assert_eq!(
            send(app, Method::GET, "/sample/foo/bar/error").await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(spans.len(), 6);
        assert!(spans.find("SampleResource.barDelete").is_some());
    }
}
