//! Health check endpoint
//!
//! `/health`: simple "healthy" + version, for load balancers. Exempt
//! from rate limiting but still correlated and audited.

use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Simple health check (for load balancers)
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Create the health routes.
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}
