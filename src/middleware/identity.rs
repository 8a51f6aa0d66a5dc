//! Caller identity extraction
//!
//! The upstream gateway authenticates callers and forwards the result as
//! `X-User-Id` / `X-Api-Key-Id` headers. Handlers that bill or report
//! account state extract [`Identity`]; a missing user id is rejected
//! with a 401 JSON envelope.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::header_str;

/// JSON error response for identity failures
#[derive(Debug, Serialize)]
struct IdentityErrorResponse {
    success: bool,
    error: String,
    code: String,
}

/// Identity rejection type
#[derive(Debug)]
pub struct IdentityRejection {
    status: StatusCode,
    body: IdentityErrorResponse,
}

impl IdentityRejection {
    fn missing_user() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: IdentityErrorResponse {
                success: false,
                error: "Authentication required. The gateway must supply an X-User-Id header."
                    .to_string(),
                code: "AUTH_REQUIRED".to_string(),
            },
        }
    }
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Axum extractor for the gateway-authenticated caller.
///
/// Extracts:
/// 1. `X-User-Id` header (required)
/// 2. `X-Api-Key-Id` header (optional)
pub struct Identity {
    /// Authenticated user id
    pub user_id: String,
    /// API key the caller used, when the gateway forwarded one
    pub api_key_id: Option<String>,
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let user_id = header_str(&parts.headers, "x-user-id")
            .map(str::to_string)
            .ok_or_else(IdentityRejection::missing_user)?;

        let api_key_id = header_str(&parts.headers, "x-api-key-id").map(str::to_string);

        Ok(Identity {
            user_id,
            api_key_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> std::result::Result<Identity, IdentityRejection> {
        let (mut parts, ()) = req.into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_user_and_key() {
        let req = Request::builder()
            .header("x-user-id", "user-1")
            .header("x-api-key-id", "key-7")
            .body(())
            .unwrap();

        let identity = extract(req).await.unwrap();
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.api_key_id.as_deref(), Some("key-7"));
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthorized() {
        let req = Request::builder()
            .header("x-api-key-id", "key-7")
            .body(())
            .unwrap();

        let rejection = extract(req).await.err().unwrap();
        assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
        assert_eq!(rejection.body.code, "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn test_blank_user_is_unauthorized() {
        let req = Request::builder()
            .header("x-user-id", "   ")
            .body(())
            .unwrap();

        assert!(extract(req).await.is_err());
    }
}
