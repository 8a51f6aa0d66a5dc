//! Route and middleware assembly

use crate::api;
use crate::middleware::rate_limit::RateLimitLayer;
use crate::middleware::request_context::RequestContextLayer;
use axum::{Extension, Router};
use ergon_audit::AuditPersister;
use ergon_billing::UsageMeter;
use ergon_core::tracking::RequestTracker;
use ergon_llm::LlmProvider;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared handles the routes and middleware operate on
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<RequestTracker>,
    pub persister: Arc<AuditPersister>,
    pub meter: Arc<UsageMeter>,
    pub llm: Arc<dyn LlmProvider>,
}

/// Build the main router with all endpoints and middleware.
///
/// Layer order outside-in: trace logging, CORS, rate limiting, request
/// context (id + trace + audit completion). Identity runs per handler
/// via the extractor.
pub fn build_router(state: AppState, rate_limit: RateLimitLayer) -> Router {
    let request_context = RequestContextLayer::new(state.tracker.clone(), state.persister.clone());

    Router::new()
        .merge(api::health_routes())
        .merge(api::api_router())
        // Layers (applied to all routes)
        .layer(Extension(state.tracker))
        .layer(Extension(state.meter))
        .layer(Extension(state.llm))
        .layer(request_context)
        .layer(rate_limit)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests;
