//! Read-only admin API.
//!
//! ```text
//! GET /admin/status            version, uptime, number of tracked metrics
//! GET /admin/metrics[?name=]   StoreSnapshot as JSON (never drains)
//! ```
//! Every route requires `Authorization: Bearer <api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::store::AggregationStore;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<AggregationStore>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(store: Arc<AggregationStore>, api_key: &str) -> Self {
        Self {
            store,
            api_key: Arc::from(api_key),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/metrics", get(get_metrics))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::instrument::tags::TagSet;
    use crate::store::MetricKey;

    fn state() -> AdminState {
        AdminState::new(Arc::new(AggregationStore::new()), "secret")
    }

    fn get(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_missing_or_wrong_key() {
        let app = setup_admin_router(state());
        let res = app.clone().oneshot(get("/admin/status", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let res = app.oneshot(get("/admin/status", Some("nope"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_metrics_snapshot_does_not_drain() {
        let state = state();
        let key = MetricKey::new("response.completed.aggregated_per_application", TagSet::new());
        state.store.increment_delta(&key);
        let app = setup_admin_router(state.clone());

        let res = app
            .oneshot(get("/admin/metrics?name=completed", Some("secret")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["delta_counters"][0]["value"], 1);
        assert_eq!(state.store.delta(&key), Some(1));
    }
}
