//! Shared API error envelope
//!
//! Domain errors map to one stable JSON shape:
//! `{success: false, error, code}` plus `details` for billing
//! rejections, so clients can branch on `code` without parsing prose.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

/// JSON body of every error response
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    success: bool,
    error: String,
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// API error carrying an HTTP status and the JSON envelope
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                success: false,
                error: error.into(),
                code: code.into(),
                details: None,
            },
        }
    }

    fn with_details(mut self, details: Option<Value>) -> Self {
        self.body.details = details;
        self
    }

    /// 400 with a caller-facing validation message
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "VALIDATION_ERROR")
    }

    /// 500 with a generic message; log the specifics before calling this
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_ERROR")
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    pub fn code(&self) -> &str {
        &self.body.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<ergon_billing::Error> for ApiError {
    fn from(err: ergon_billing::Error) -> Self {
        match err {
            ergon_billing::Error::UnknownUser(user_id) => Self::new(
                StatusCode::FORBIDDEN,
                format!("No usage account exists for user {user_id}"),
                "ACCOUNT_NOT_FOUND",
            ),
            ergon_billing::Error::SubscriptionInactive(details) => Self::new(
                StatusCode::PAYMENT_REQUIRED,
                "Subscription is not active. Renew it or top up the account balance.",
                "SUBSCRIPTION_INACTIVE",
            )
            .with_details(serde_json::to_value(&details).ok()),
            ergon_billing::Error::UsageLimitExceeded(details) => {
                let message = format!(
                    "Monthly {} limit reached and top-up balance is insufficient",
                    details.action
                );
                Self::new(StatusCode::PAYMENT_REQUIRED, message, "USAGE_LIMIT_EXCEEDED")
                    .with_details(serde_json::to_value(&details).ok())
            }
            ergon_billing::Error::Database(message) => {
                error!(error = %message, "billing store failure");
                Self::internal("Billing check failed")
            }
        }
    }
}

impl From<ergon_llm::Error> for ApiError {
    fn from(err: ergon_llm::Error) -> Self {
        match err {
            ergon_llm::Error::NotConfigured(message) => {
                error!(error = %message, "LLM provider not configured");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "LLM provider is not configured",
                    "LLM_NOT_CONFIGURED",
                )
            }
            other => {
                error!(error = %other, "LLM call failed");
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    "Upstream LLM call failed",
                    "UPSTREAM_ERROR",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ergon_billing::{RejectionDetails, UsageAction};

    #[test]
    fn test_billing_rejections_are_402() {
        let details = RejectionDetails::new(UsageAction::Interview, 15, 15, 150);
        let err = ApiError::from(ergon_billing::Error::UsageLimitExceeded(details));
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.code(), "USAGE_LIMIT_EXCEEDED");
        assert!(err.body.details.is_some());

        let details = RejectionDetails::new(UsageAction::Match, 0, 0, 0);
        let err = ApiError::from(ergon_billing::Error::SubscriptionInactive(details));
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.code(), "SUBSCRIPTION_INACTIVE");
    }

    #[test]
    fn test_unknown_user_is_403() {
        let err = ApiError::from(ergon_billing::Error::UnknownUser("ghost".to_string()));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "ACCOUNT_NOT_FOUND");
    }

    #[test]
    fn test_llm_errors_map_upstream() {
        let err = ApiError::from(ergon_llm::Error::Timeout(120));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "UPSTREAM_ERROR");

        let err = ApiError::from(ergon_llm::Error::NotConfigured("no key".to_string()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_envelope_omits_absent_details() {
        let err = ApiError::validation("transcript must not be empty");
        let json = serde_json::to_string(&err.body).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("VALIDATION_ERROR"));
        assert!(!json.contains("details"));
    }
}
