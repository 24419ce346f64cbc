use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::store::StoreSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub tracked_metrics: usize,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    /// Keep only metrics whose name contains this string.
    pub name: Option<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        tracked_metrics: state.store.len(),
    })
}

/// Non-destructive view of the store; delta counters are peeked, not drained.
pub async fn get_metrics(
    State(state): State<AdminState>,
    Query(query): Query<MetricsQuery>,
) -> Json<StoreSnapshot> {
    let snapshot = state.store.snapshot();
    Json(match query.name {
        Some(pattern) => snapshot.filter_by_name(&pattern),
        None => snapshot,
    })
}
