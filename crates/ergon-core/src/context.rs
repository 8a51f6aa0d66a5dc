//! Ambient request scope
//!
//! The HTTP layer installs a [`RequestScope`] around each handler with
//! [`with_scope`]. Code running underneath (LLM clients, scoring logic)
//! then reports steps and LLM calls through the free functions here
//! without threading a request id through every signature. Outside a
//! scope the reporting helpers degrade to no-ops, so library code stays
//! callable from plain unit tests and background jobs.

use crate::tracking::{LlmCallRecord, RequestTracker, StepStatus};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static REQUEST_SCOPE: RequestScope;
}

/// Per-request ambient state: the request id plus the tracker it
/// reports into.
#[derive(Debug, Clone)]
pub struct RequestScope {
    id: String,
    tracker: Arc<RequestTracker>,
}

impl RequestScope {
    /// Create a scope for the given request id
    #[must_use]
    pub fn new(id: impl Into<String>, tracker: Arc<RequestTracker>) -> Self {
        Self {
            id: id.into(),
            tracker,
        }
    }

    /// The request id this scope reports under
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.id
    }

    /// The tracker this scope reports into
    #[must_use]
    pub fn tracker(&self) -> &Arc<RequestTracker> {
        &self.tracker
    }
}

/// Run a future with the given scope installed for its whole extent,
/// including any awaits inside.
pub async fn with_scope<F: Future>(scope: RequestScope, fut: F) -> F::Output {
    REQUEST_SCOPE.scope(scope, fut).await
}

/// The scope installed for the current task, if any
#[must_use]
pub fn current_scope() -> Option<RequestScope> {
    REQUEST_SCOPE.try_with(Clone::clone).ok()
}

/// The request id for the current task, if a scope is installed
#[must_use]
pub fn current_request_id() -> Option<String> {
    REQUEST_SCOPE.try_with(|s| s.id.clone()).ok()
}

/// Report the start of a named step under the current scope.
///
/// Returns the step sequence to pass to [`report_step_end`], or `None`
/// when no scope is installed.
pub async fn report_step_start(name: &str) -> Option<u32> {
    let scope = current_scope()?;
    Some(scope.tracker.start_step(&scope.id, name).await)
}

/// Report the end of a previously started step under the current scope
pub async fn report_step_end(sequence: u32, status: StepStatus, metadata: Option<serde_json::Value>) {
    if let Some(scope) = current_scope() {
        scope
            .tracker
            .end_step(&scope.id, sequence, status, metadata)
            .await;
    }
}

/// Report a completed LLM call under the current scope.
///
/// Returns the priced record, or `None` when no scope is installed (the
/// call then goes unrecorded rather than failing).
pub async fn report_llm_call(
    model: &str,
    provider: &str,
    prompt_tokens: u32,
    completion_tokens: u32,
    duration_ms: u64,
) -> Option<LlmCallRecord> {
    let scope = current_scope()?;
    Some(
        scope
            .tracker
            .log_llm_call(
                &scope.id,
                model,
                provider,
                prompt_tokens,
                completion_tokens,
                duration_ms,
            )
            .await,
    )
}

/// Run a fallible future as a tracked step.
///
/// The step completes when the future returns `Ok` and fails with the
/// error text attached when it returns `Err`. Without an installed
/// scope the future runs untracked.
pub async fn run_step<F, T, E>(name: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let Some(scope) = current_scope() else {
        return fut.await;
    };

    let sequence = scope.tracker.start_step(&scope.id, name).await;
    match fut.await {
        Ok(value) => {
            scope
                .tracker
                .end_step(&scope.id, sequence, StepStatus::Completed, None)
                .await;
            Ok(value)
        }
        Err(err) => {
            scope
                .tracker
                .end_step(
                    &scope.id,
                    sequence,
                    StepStatus::Failed,
                    Some(json!({ "error": err.to_string() })),
                )
                .await;
            Err(err)
        }
    }
}
