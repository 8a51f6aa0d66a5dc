//! Process stats endpoint
//!
//! GET /api/v1/stats: process-wide instrumentation counters plus the
//! number of requests currently in flight.

use axum::{extract::Extension, routing::get, Json, Router};
use ergon_core::tracking::{AggregateSnapshot, RequestTracker};
use serde::Serialize;
use std::sync::Arc;

/// Response for GET /api/v1/stats
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    /// Requests started but not yet completed
    pub in_flight: usize,
    /// Counters since process start
    pub totals: AggregateSnapshot,
}

/// GET /api/v1/stats handler.
async fn get_stats(Extension(tracker): Extension<Arc<RequestTracker>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        success: true,
        in_flight: tracker.in_flight().await,
        totals: tracker.aggregate(),
    })
}

/// Create the stats routes.
pub fn stats_routes() -> Router {
    Router::new().route("/api/v1/stats", get(get_stats))
}
