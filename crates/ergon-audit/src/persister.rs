//! AuditPersister - turns completed traces into audit rows
//!
//! Sits between the in-memory [`RequestTracker`] and the durable
//! [`AuditSink`]. On completion it snapshots the trace, finalizes it
//! (exactly once), classifies the endpoint, and writes the aggregate
//! row plus one child row per LLM call. A sink failure is logged and
//! swallowed: audit persistence must never fail the request itself.

use crate::classifier::classify;
use crate::store::{self, AuditEntry, AuditLlmCall, AuditSink};
use chrono::Utc;
use ergon_core::tracking::{RequestSummary, RequestTracker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

/// Everything the completion path knows that the trace does not
#[derive(Debug, Clone)]
pub struct CompletionInfo {
    /// Correlation id of the finished request
    pub request_id: String,
    /// Response status code (499 when the client disconnected)
    pub status_code: u16,
    /// Authenticated user, when known
    pub user_id: Option<String>,
    /// API key used, when known
    pub api_key_id: Option<String>,
    /// Caller IP, when known
    pub ip_address: Option<String>,
    /// Caller user agent, when known
    pub user_agent: Option<String>,
}

/// One-shot latch shared by the response path and the disconnect path.
///
/// Both race to report completion for the same request; whichever calls
/// [`CompletionGuard::try_fire`] first wins and the loser becomes a
/// no-op.
#[derive(Debug, Default)]
pub struct CompletionGuard {
    fired: AtomicBool,
}

impl CompletionGuard {
    /// Create an unfired guard
    #[must_use]
    pub fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
        }
    }

    /// Claim the completion event. Returns `true` exactly once.
    pub fn try_fire(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }

    /// Whether completion has already been claimed
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Persists completed request traces as audit rows
pub struct AuditPersister {
    tracker: Arc<RequestTracker>,
    sink: Arc<dyn AuditSink>,
}

impl AuditPersister {
    /// Create a persister over a tracker and a durable sink
    #[must_use]
    pub fn new(tracker: Arc<RequestTracker>, sink: Arc<dyn AuditSink>) -> Self {
        Self { tracker, sink }
    }

    /// Finalize a request and write its audit rows.
    ///
    /// Returns `None` when the trace is unknown or already finalized,
    /// which makes duplicate completion events harmless: the second
    /// caller writes nothing. The returned summary reflects the trace
    /// at the moment it was closed.
    pub async fn on_request_complete(&self, info: CompletionInfo) -> Option<RequestSummary> {
        // Snapshot before ending; end_request drops the trace and with
        // it the per-call records.
        let snapshot = self.tracker.snapshot(&info.request_id).await;
        let status = status_label(info.status_code);
        let summary = self
            .tracker
            .end_request(&info.request_id, status, info.status_code)
            .await?;
        let snapshot = snapshot?;

        let audit_id = store::new_row_id();
        let class = classify(&summary.endpoint);

        let entry = AuditEntry {
            id: audit_id.clone(),
            request_id: summary.id.clone(),
            user_id: info.user_id,
            api_key_id: info.api_key_id,
            endpoint: summary.endpoint.clone(),
            method: summary.method.clone(),
            module: class.module,
            api_name: class.api_name,
            status_code: info.status_code,
            duration_ms: summary.duration_ms,
            prompt_tokens: snapshot.prompt_tokens,
            completion_tokens: snapshot.completion_tokens,
            total_tokens: snapshot.total_tokens,
            llm_call_count: summary.llm_calls,
            cost: summary.total_cost,
            provider: snapshot.last_provider,
            model: snapshot.last_model,
            ip_address: info.ip_address,
            user_agent: info.user_agent,
            created_at: Utc::now(),
        };

        let calls: Vec<AuditLlmCall> = snapshot
            .llm_calls
            .iter()
            .map(|call| AuditLlmCall {
                id: store::new_row_id(),
                audit_id: audit_id.clone(),
                model: call.model.clone(),
                provider: call.provider.clone(),
                prompt_tokens: call.prompt_tokens,
                completion_tokens: call.completion_tokens,
                total_tokens: call.total_tokens,
                cost: call.cost,
                duration_ms: call.duration_ms,
            })
            .collect();

        if let Err(e) = self.sink.record(&entry, &calls).await {
            error!(
                request_id = %entry.request_id,
                error = %e,
                "failed to persist audit entry"
            );
        }

        Some(summary)
    }
}

/// Map a response status code to the trace outcome label
fn status_label(status_code: u16) -> &'static str {
    match status_code {
        499 => "cancelled",
        code if code >= 500 => "error",
        code if code >= 400 => "client_error",
        _ => "success",
    }
}

#[cfg(test)]
mod tests;
