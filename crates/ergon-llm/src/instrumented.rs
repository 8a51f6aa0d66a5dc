//! Instrumented provider wrapper
//!
//! Wraps any [`LlmProvider`] and reports each successful completion's
//! model, token usage and latency into the ambient request trace. The
//! scoring logic never touches the tracker directly; it just calls
//! `complete` and the wrapper does the bookkeeping. Outside a request
//! scope the wrapper is transparent.

use crate::error::Result;
use crate::provider::{CompletionRequest, CompletionResponse, LlmProvider};
use ergon_core::context;
use std::time::Instant;
use tracing::debug;

/// LLM provider decorator that feeds the request trace
pub struct InstrumentedProvider<P> {
    inner: P,
}

impl<P> InstrumentedProvider<P> {
    /// Wrap a provider
    #[must_use]
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    /// Unwrap back into the inner provider
    #[must_use]
    pub fn into_inner(self) -> P {
        self.inner
    }
}

#[async_trait::async_trait]
impl<P: LlmProvider> LlmProvider for InstrumentedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn available_models(&self) -> Vec<String> {
        self.inner.available_models()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let started = Instant::now();
        let response = self.inner.complete(request).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        // A missing usage block reports as a zero-token call so the
        // call itself still shows up in the trace.
        let usage = response.usage.unwrap_or_default();
        let reported = context::report_llm_call(
            &response.model,
            self.inner.name(),
            usage.prompt_tokens,
            usage.completion_tokens,
            duration_ms,
        )
        .await;
        if reported.is_none() {
            debug!(model = %response.model, "llm call completed outside a request scope");
        }

        Ok(response)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::provider::{Message, TokenUsage};
    use ergon_core::context::{with_scope, RequestScope};
    use ergon_core::tracking::RequestTracker;
    use mockall::mock;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    mock! {
        pub Provider {}

        #[async_trait::async_trait]
        impl LlmProvider for Provider {
            fn name(&self) -> &str;
            fn available_models(&self) -> Vec<String>;
            fn default_model(&self) -> &str;
            async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
        }
    }

    fn scored_response() -> CompletionResponse {
        CompletionResponse {
            content: "{\"score\": 82}".to_string(),
            usage: Some(TokenUsage {
                prompt_tokens: 1000,
                completion_tokens: 500,
                total_tokens: 1500,
            }),
            finish_reason: Some("stop".to_string()),
            model: "google/gemini-3-flash-preview".to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_completion_lands_in_the_trace() {
        let mut mock = MockProvider::new();
        mock.expect_name().return_const("openrouter".to_string());
        mock.expect_complete().returning(|_| Ok(scored_response()));

        let provider = InstrumentedProvider::new(mock);
        let tracker = Arc::new(RequestTracker::new());
        tracker
            .start_request("req-1", "/api/v1/matches/score", "POST")
            .await;

        let scope = RequestScope::new("req-1", Arc::clone(&tracker));
        let response = with_scope(scope, async {
            provider
                .complete(CompletionRequest::new("").with_message(Message::user("score this")))
                .await
        })
        .await;
        let response = tokio_test::assert_ok!(response);
        assert_eq!(response.content, "{\"score\": 82}");

        let snap = tracker.snapshot("req-1").await.unwrap();
        assert_eq!(snap.llm_calls.len(), 1);
        assert_eq!(snap.llm_calls[0].provider, "openrouter");
        assert_eq!(snap.llm_calls[0].model, "google/gemini-3-flash-preview");
        assert_eq!(snap.total_tokens, 1500);
        assert!((snap.total_cost - 0.0020).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_completion_records_no_call() {
        let mut mock = MockProvider::new();
        mock.expect_name().return_const("openrouter".to_string());
        mock.expect_complete()
            .returning(|_| Err(Error::Api("upstream down".to_string())));

        let provider = InstrumentedProvider::new(mock);
        let tracker = Arc::new(RequestTracker::new());
        tracker.start_request("req-1", "/x", "POST").await;

        let scope = RequestScope::new("req-1", Arc::clone(&tracker));
        let result = with_scope(scope, async {
            provider.complete(CompletionRequest::new("m")).await
        })
        .await;
        assert!(result.is_err());

        let snap = tracker.snapshot("req-1").await.unwrap();
        assert!(snap.llm_calls.is_empty());
        assert_eq!(tracker.aggregate().total_llm_calls, 0);
    }

    #[tokio::test]
    async fn test_transparent_outside_a_scope() {
        let mut mock = MockProvider::new();
        mock.expect_name().return_const("openrouter".to_string());
        mock.expect_complete().returning(|_| Ok(scored_response()));

        let provider = InstrumentedProvider::new(mock);
        let response = provider.complete(CompletionRequest::new("m")).await;
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn test_catalog_methods_delegate() {
        let mut mock = MockProvider::new();
        mock.expect_name().return_const("openrouter".to_string());
        mock.expect_default_model()
            .return_const("google/gemini-3-flash-preview".to_string());
        mock.expect_available_models()
            .returning(|| vec!["google/gemini-3-flash-preview".to_string()]);

        let provider = InstrumentedProvider::new(mock);
        assert_eq!(provider.name(), "openrouter");
        assert_eq!(provider.default_model(), "google/gemini-3-flash-preview");
        assert_eq!(provider.available_models().len(), 1);
    }
}
