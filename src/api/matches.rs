//! Resume match scoring endpoint
//!
//! POST /api/v1/matches/score: billable `match` action, gated the same
//! way as interviews but against the match quota and rate.

use axum::{extract::Extension, routing::post, Json, Router};
use ergon_billing::{UsageAction, UsageMeter};
use ergon_core::context;
use ergon_llm::{CompletionRequest, LlmProvider, Message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::BillingInfo;
use crate::middleware::identity::Identity;

/// Request body for POST /api/v1/matches/score
#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    /// Candidate resume text
    pub resume: String,
    /// Job description text
    pub job_description: String,
}

/// Response for POST /api/v1/matches/score
#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub billing: BillingInfo,
    pub analysis: String,
    pub model: String,
}

/// POST /api/v1/matches/score handler.
async fn score_match(
    identity: Identity,
    Extension(meter): Extension<Arc<UsageMeter>>,
    Extension(llm): Extension<Arc<dyn LlmProvider>>,
    Json(body): Json<ScoreRequest>,
) -> std::result::Result<Json<ScoreResponse>, ApiError> {
    if body.resume.trim().is_empty() {
        return Err(ApiError::validation("resume must not be empty"));
    }
    if body.job_description.trim().is_empty() {
        return Err(ApiError::validation("job_description must not be empty"));
    }

    let admission = meter
        .check_and_charge(&identity.user_id, UsageAction::Match)
        .await?;

    let request = CompletionRequest::new(llm.default_model())
        .with_message(Message::system(
            "You are a recruitment analyst. Score how well the resume matches the \
             job description from 0 to 100 and explain the main gaps.",
        ))
        .with_message(Message::user(format!(
            "Job description:\n{}\n\nResume:\n{}",
            body.job_description, body.resume
        )));

    let response = context::run_step("match_scoring", llm.complete(request)).await?;

    Ok(Json(ScoreResponse {
        success: true,
        request_id: context::current_request_id(),
        billing: BillingInfo::from(admission),
        analysis: response.content,
        model: response.model,
    }))
}

/// Create the match routes.
pub fn matches_routes() -> Router {
    Router::new().route("/api/v1/matches/score", post(score_match))
}
