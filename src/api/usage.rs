//! Account usage endpoint
//!
//! GET /api/v1/usage: the caller's subscription, per-action counters
//! against their plan limits, and prepaid balance.

use axum::{extract::Extension, routing::get, Json, Router};
use ergon_billing::UsageMeter;
use serde::Serialize;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::middleware::identity::Identity;

/// Response for GET /api/v1/usage
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub success: bool,
    pub user_id: String,
    pub tier: &'static str,
    pub status: &'static str,
    pub interviews: UsageNumbers,
    pub matches: UsageNumbers,
    /// Prepaid top-up balance in USD
    pub balance: f64,
}

/// Used/limit pair for one billable action.
#[derive(Debug, Serialize)]
pub struct UsageNumbers {
    pub used: u32,
    pub limit: u32,
}

/// GET /api/v1/usage handler.
async fn get_usage(
    identity: Identity,
    Extension(meter): Extension<Arc<UsageMeter>>,
) -> std::result::Result<Json<UsageResponse>, ApiError> {
    let account = meter.account(&identity.user_id).await?;
    let limits = account.tier.limits();

    Ok(Json(UsageResponse {
        success: true,
        user_id: account.user_id.clone(),
        tier: account.tier.as_str(),
        status: account.status.as_str(),
        interviews: UsageNumbers {
            used: account.interviews_used,
            limit: limits.interviews,
        },
        matches: UsageNumbers {
            used: account.matches_used,
            limit: limits.matches,
        },
        balance: account.balance_dollars(),
    }))
}

/// Create the usage routes.
pub fn usage_routes() -> Router {
    Router::new().route("/api/v1/usage", get(get_usage))
}
