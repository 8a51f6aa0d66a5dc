//! Interview evaluation endpoint
//!
//! POST /api/v1/interviews/evaluate: billable `interview` action. The
//! billing gate runs before the LLM call so a rejected request costs
//! nothing downstream.

use axum::{extract::Extension, routing::post, Json, Router};
use ergon_billing::{UsageAction, UsageMeter};
use ergon_core::context;
use ergon_llm::{CompletionRequest, LlmProvider, Message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::BillingInfo;
use crate::middleware::identity::Identity;

/// Request body for POST /api/v1/interviews/evaluate
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    /// Interview transcript to evaluate
    pub transcript: String,
    /// Role the candidate interviewed for
    #[serde(default)]
    pub role: Option<String>,
}

/// Response for POST /api/v1/interviews/evaluate
#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub billing: BillingInfo,
    pub evaluation: String,
    pub model: String,
}

/// POST /api/v1/interviews/evaluate handler.
async fn evaluate_interview(
    identity: Identity,
    Extension(meter): Extension<Arc<UsageMeter>>,
    Extension(llm): Extension<Arc<dyn LlmProvider>>,
    Json(body): Json<EvaluateRequest>,
) -> std::result::Result<Json<EvaluateResponse>, ApiError> {
    if body.transcript.trim().is_empty() {
        return Err(ApiError::validation("transcript must not be empty"));
    }

    let admission = meter
        .check_and_charge(&identity.user_id, UsageAction::Interview)
        .await?;

    let role = body.role.as_deref().unwrap_or("the advertised role");
    let request = CompletionRequest::new(llm.default_model())
        .with_message(Message::system(
            "You are an interview evaluator. Assess the candidate transcript and \
             summarize strengths, weaknesses, and a hire recommendation.",
        ))
        .with_message(Message::user(format!(
            "Role: {role}\n\nTranscript:\n{}",
            body.transcript
        )));

    let response = context::run_step("interview_evaluation", llm.complete(request)).await?;

    Ok(Json(EvaluateResponse {
        success: true,
        request_id: context::current_request_id(),
        billing: BillingInfo::from(admission),
        evaluation: response.content,
        model: response.model,
    }))
}

/// Create the interview routes.
pub fn interviews_routes() -> Router {
    Router::new().route("/api/v1/interviews/evaluate", post(evaluate_interview))
}
