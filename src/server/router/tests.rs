use super::*;
use crate::middleware::rate_limit::RateLimitSettings;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use ergon_billing::{
    AccountStore, PlanTier, SqliteAccountStore, SubscriptionStatus, UsageAccount,
};
use ergon_llm::{CompletionRequest, CompletionResponse, InstrumentedProvider, TokenUsage};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

struct StubProvider;

#[async_trait::async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn available_models(&self) -> Vec<String> {
        vec!["google/gemini-3-flash-preview".to_string()]
    }

    fn default_model(&self) -> &str {
        "google/gemini-3-flash-preview"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> ergon_llm::Result<CompletionResponse> {
        Ok(CompletionResponse {
            content: "Strong candidate. Recommend hire.".to_string(),
            usage: Some(TokenUsage {
                prompt_tokens: 1000,
                completion_tokens: 500,
                total_tokens: 1500,
            }),
            finish_reason: Some("stop".to_string()),
            model: request.model,
        })
    }
}

struct TestApp {
    router: Router,
    audit: Arc<ergon_audit::SqliteAuditStore>,
    accounts: Arc<SqliteAccountStore>,
}

async fn test_app(max_requests: u32) -> TestApp {
    let accounts = Arc::new(SqliteAccountStore::in_memory().await.unwrap());
    let audit = Arc::new(ergon_audit::SqliteAuditStore::in_memory().await.unwrap());

    let tracker = Arc::new(RequestTracker::new());
    let persister = Arc::new(AuditPersister::new(tracker.clone(), audit.clone()));
    let meter = Arc::new(UsageMeter::new(accounts.clone()));
    let llm: Arc<dyn LlmProvider> = Arc::new(InstrumentedProvider::new(StubProvider));

    accounts
        .upsert(&UsageAccount::new_free("user-1"))
        .await
        .unwrap();

    let settings = RateLimitSettings {
        enabled: true,
        max_requests,
        window_ms: 60_000,
        sweep_interval_secs: 300,
    };

    let router = build_router(
        AppState {
            tracker,
            persister,
            meter,
            llm,
        },
        RateLimitLayer::new(&settings),
    );

    TestApp {
        router,
        audit,
        accounts,
    }
}

fn evaluate_request(user_id: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/interviews/evaluate")
        .header("content-type", "application/json")
        .header("x-user-id", user_id)
        .body(Body::from(
            r#"{"transcript": "Tell me about a hard bug you fixed.", "role": "Backend Engineer"}"#,
        ))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_open_and_unthrottled() {
    let app = test_app(1).await;

    for _ in 0..3 {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}

#[tokio::test]
async fn test_response_carries_request_id_and_rate_headers() {
    let app = test_app(5).await;

    let mut request = evaluate_request("user-1");
    request
        .headers_mut()
        .insert("x-request-id", "client-abc".parse().unwrap());

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-request-id").unwrap(), "client-abc");
    assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "5");
    assert_eq!(
        response.headers().get("x-ratelimit-remaining").unwrap(),
        "4"
    );
    let reset: u64 = response
        .headers()
        .get("x-ratelimit-reset")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(reset > 0);

    let body = body_json(response).await;
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["request_id"], "client-abc");
    assert_eq!(body["billing"]["source"], "plan");
    assert_eq!(body["model"], "google/gemini-3-flash-preview");
    assert!(body["evaluation"].as_str().unwrap().contains("hire"));
}

#[tokio::test]
async fn test_minted_request_id_when_header_missing() {
    let app = test_app(5).await;

    let response = app
        .router
        .clone()
        .oneshot(evaluate_request("user-1"))
        .await
        .unwrap();

    let request_id = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(request_id.contains('-'));
}

#[tokio::test]
async fn test_one_audit_row_per_request() {
    let app = test_app(5).await;

    let mut request = evaluate_request("user-1");
    request
        .headers_mut()
        .insert("x-request-id", "audited-1".parse().unwrap());

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(app.audit.count_for_request("audited-1").await.unwrap(), 1);

    let entry = app.audit.get_by_request_id("audited-1").await.unwrap();
    assert_eq!(entry.module, "interviews");
    assert_eq!(entry.api_name, "interviews.evaluate");
    assert_eq!(entry.method, "POST");
    assert_eq!(entry.status_code, 200);
    assert_eq!(entry.user_id.as_deref(), Some("user-1"));
    assert_eq!(entry.llm_call_count, 1);
    assert_eq!(entry.total_tokens, 1500);
    assert!((entry.cost - 0.0020).abs() < 1e-9);
}

#[tokio::test]
async fn test_rate_limit_denies_with_envelope() {
    let app = test_app(2).await;

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/stats")
                    .header("x-api-key-id", "key-9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/stats")
                .header("x-api-key-id", "key-9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.headers().get("x-ratelimit-remaining").unwrap(),
        "0"
    );
    assert!(response.headers().get("retry-after").is_some());
    assert!(response.headers().get("x-request-id").is_some());

    let body = body_json(response).await;
    assert_eq!(body["success"], Value::Bool(false));
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    assert!(body["retry_after"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_usage_requires_identity() {
    let app = test_app(10).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/usage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "AUTH_REQUIRED");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/usage")
                .header("x-user-id", "user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["tier"], "free");
    assert_eq!(body["interviews"]["limit"], 2);
    assert_eq!(body["matches"]["used"], 0);
}

#[tokio::test]
async fn test_billing_rejection_maps_to_402_and_is_audited() {
    let app = test_app(10).await;
    app.accounts
        .upsert(&UsageAccount {
            user_id: "user-broke".to_string(),
            tier: PlanTier::Starter,
            status: SubscriptionStatus::Active,
            interviews_used: 15,
            matches_used: 0,
            balance_cents: 150,
        })
        .await
        .unwrap();

    let mut request = evaluate_request("user-broke");
    request
        .headers_mut()
        .insert("x-request-id", "rejected-1".parse().unwrap());

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    let body = body_json(response).await;
    assert_eq!(body["code"], "USAGE_LIMIT_EXCEEDED");
    assert_eq!(body["details"]["used"], 15);
    assert_eq!(body["details"]["required_balance"], 2.0);
    assert_eq!(body["details"]["current_balance"], 1.5);

    // Rejected before the LLM ran, and still audited
    let entry = app.audit.get_by_request_id("rejected-1").await.unwrap();
    assert_eq!(entry.status_code, 402);
    assert_eq!(entry.llm_call_count, 0);
}

#[tokio::test]
async fn test_validation_error_is_400() {
    let app = test_app(10).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/interviews/evaluate")
        .header("content-type", "application/json")
        .header("x-user-id", "user-1")
        .body(Body::from(r#"{"transcript": "   "}"#))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_user_is_403() {
    let app = test_app(10).await;

    let response = app
        .router
        .clone()
        .oneshot(evaluate_request("ghost"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["code"], "ACCOUNT_NOT_FOUND");
}

#[tokio::test]
async fn test_match_scoring_consumes_match_quota() {
    let app = test_app(10).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/matches/score")
        .header("content-type", "application/json")
        .header("x-user-id", "user-1")
        .body(Body::from(
            r#"{"resume": "Five years of Rust.", "job_description": "Rust backend role."}"#,
        ))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["billing"]["source"], "plan");

    let account = app.accounts.get("user-1").await.unwrap();
    assert_eq!(account.matches_used, 1);
    assert_eq!(account.interviews_used, 0);
}

#[tokio::test]
async fn test_stats_reflects_tracked_requests() {
    let app = test_app(10).await;

    let response = app
        .router
        .clone()
        .oneshot(evaluate_request("user-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["totals"]["total_llm_calls"], 1);
    assert_eq!(body["totals"]["total_tokens"], 1500);
    assert!(body["totals"]["total_requests"].as_u64().unwrap() >= 1);
    // The stats request itself is still being tracked while the handler runs
    assert_eq!(body["in_flight"], 1);
}
