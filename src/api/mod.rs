//! Web API module for Ergon
//!
//! Provides REST API endpoints for:
//! - Billable actions (interview evaluation, resume match scoring)
//! - Caller account usage
//! - Process aggregate stats

pub mod error;
pub mod health;
pub mod interviews;
pub mod matches;
pub mod stats;
pub mod usage;

use axum::Router;
use ergon_billing::Admission;
use serde::Serialize;

pub use health::health_routes;
pub use interviews::interviews_routes;
pub use matches::matches_routes;
pub use stats::stats_routes;
pub use usage::usage_routes;

/// How an admitted billable action was funded, for response bodies
#[derive(Debug, Serialize)]
pub struct BillingInfo {
    /// `plan` or `topup`
    pub source: String,
    /// Amount charged in USD (zero for plan admissions)
    pub charged: f64,
}

impl From<Admission> for BillingInfo {
    fn from(admission: Admission) -> Self {
        Self {
            source: admission.source.as_str().to_string(),
            charged: admission.charged_dollars(),
        }
    }
}

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(interviews_routes())
        .merge(matches_routes())
        .merge(usage_routes())
        .merge(stats_routes())
}
