//! RequestTracker - the in-memory trace registry

use super::types::{
    AggregateSnapshot, LlmCallRecord, RequestSummary, RequestTrace, StepRecord, StepStatus,
    TraceSnapshot,
};
use crate::pricing::PricingTable;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Sequence value returned by `start_step` for an unknown request id.
/// Real sequences are 1-based, so 0 never collides.
pub const UNKNOWN_STEP_SEQUENCE: u32 = 0;

/// Registry of in-flight request traces plus process aggregates.
///
/// Every operation takes the lock for a short synchronous section with
/// no await inside, so each is atomic with respect to interleaved tasks.
/// Aggregate cost is accumulated in integer microdollars so it can live
/// in an atomic alongside the other counters.
#[derive(Debug)]
pub struct RequestTracker {
    pricing: PricingTable,
    traces: RwLock<HashMap<String, RequestTrace>>,
    total_requests: AtomicU64,
    total_llm_calls: AtomicU64,
    total_tokens: AtomicU64,
    total_cost_micros: AtomicU64,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    /// Create a tracker with the built-in pricing table
    #[must_use]
    pub fn new() -> Self {
        Self::with_pricing(PricingTable::new())
    }

    /// Create a tracker with a custom pricing table
    #[must_use]
    pub fn with_pricing(pricing: PricingTable) -> Self {
        Self {
            pricing,
            traces: RwLock::new(HashMap::new()),
            total_requests: AtomicU64::new(0),
            total_llm_calls: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
            total_cost_micros: AtomicU64::new(0),
        }
    }

    /// The pricing table this tracker prices calls with
    #[must_use]
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Begin tracking a request.
    ///
    /// A leftover trace under the same id is overwritten with a warning;
    /// it means a previous completion never fired.
    pub async fn start_request(
        &self,
        id: impl Into<String>,
        endpoint: impl Into<String>,
        method: impl Into<String>,
    ) {
        let id = id.into();
        let trace = RequestTrace::new(id.clone(), endpoint, method);

        let mut traces = self.traces.write().await;
        if traces.insert(id.clone(), trace).is_some() {
            warn!(request_id = %id, "overwriting existing trace for request id");
        }
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the start of a named step.
    ///
    /// Returns the step's 1-based sequence number, or
    /// [`UNKNOWN_STEP_SEQUENCE`] when the request id is not tracked.
    pub async fn start_step(&self, id: &str, name: impl Into<String>) -> u32 {
        let mut traces = self.traces.write().await;
        let Some(trace) = traces.get_mut(id) else {
            return UNKNOWN_STEP_SEQUENCE;
        };

        let sequence = trace.steps.len() as u32 + 1;
        trace.steps.push(StepRecord {
            sequence,
            name: name.into(),
            status: StepStatus::Started,
            started_at: Utc::now(),
            duration_ms: None,
            metadata: None,
        });
        sequence
    }

    /// Record the end of a step.
    ///
    /// No-op when the request id or sequence is unknown, or when the step
    /// already ended.
    pub async fn end_step(
        &self,
        id: &str,
        sequence: u32,
        status: StepStatus,
        metadata: Option<serde_json::Value>,
    ) {
        let mut traces = self.traces.write().await;
        let Some(trace) = traces.get_mut(id) else {
            return;
        };
        let Some(step) = trace.steps.iter_mut().find(|s| s.sequence == sequence) else {
            return;
        };
        if step.status != StepStatus::Started {
            return;
        }

        let elapsed = Utc::now().signed_duration_since(step.started_at);
        step.duration_ms = Some(elapsed.num_milliseconds().max(0) as u64);
        step.status = status;
        step.metadata = metadata;
    }

    /// Record one completed LLM call.
    ///
    /// The call is priced from the pricing table. Aggregate counters
    /// update even when the request id is unknown; the per-trace record
    /// and totals are skipped in that case.
    pub async fn log_llm_call(
        &self,
        id: &str,
        model: &str,
        provider: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
        duration_ms: u64,
    ) -> LlmCallRecord {
        let total_tokens = prompt_tokens + completion_tokens;
        let cost = self.pricing.cost(model, prompt_tokens, completion_tokens);

        let record = LlmCallRecord {
            model: model.to_string(),
            provider: provider.to_string(),
            prompt_tokens,
            completion_tokens,
            total_tokens,
            cost,
            duration_ms,
        };

        self.total_llm_calls.fetch_add(1, Ordering::Relaxed);
        self.total_tokens
            .fetch_add(total_tokens as u64, Ordering::Relaxed);
        self.total_cost_micros
            .fetch_add((cost * 1_000_000.0).round() as u64, Ordering::Relaxed);

        let mut traces = self.traces.write().await;
        if let Some(trace) = traces.get_mut(id) {
            trace.total_cost += cost;
            trace.total_tokens += total_tokens as u64;
            trace.llm_calls.push(record.clone());
        } else {
            debug!(request_id = %id, model, "llm call logged for untracked request id");
        }

        record
    }

    /// Finalize a request: compute duration, emit a summary, drop the
    /// trace.
    ///
    /// Idempotent: completion can be signaled by more than one event
    /// source, so a second call for the same id returns `None` and does
    /// nothing.
    pub async fn end_request(
        &self,
        id: &str,
        status: &str,
        status_code: u16,
    ) -> Option<RequestSummary> {
        let trace = self.traces.write().await.remove(id)?;

        let summary = RequestSummary {
            id: trace.id,
            endpoint: trace.endpoint,
            method: trace.method,
            status: status.to_string(),
            status_code,
            duration_ms: trace.started.elapsed().as_millis() as u64,
            steps: trace.steps.len() as u32,
            llm_calls: trace.llm_calls.len() as u32,
            total_tokens: trace.total_tokens,
            total_cost: trace.total_cost,
        };

        info!(
            request_id = %summary.id,
            endpoint = %summary.endpoint,
            method = %summary.method,
            status = %summary.status,
            status_code = summary.status_code,
            duration_ms = summary.duration_ms,
            llm_calls = summary.llm_calls,
            total_tokens = summary.total_tokens,
            total_cost_usd = summary.total_cost,
            "request completed"
        );

        Some(summary)
    }

    /// Read-only copy of a trace's accumulated totals, without removing
    /// the trace.
    pub async fn snapshot(&self, id: &str) -> Option<TraceSnapshot> {
        let traces = self.traces.read().await;
        let trace = traces.get(id)?;

        let prompt_tokens: u64 = trace.llm_calls.iter().map(|c| c.prompt_tokens as u64).sum();
        let completion_tokens: u64 = trace
            .llm_calls
            .iter()
            .map(|c| c.completion_tokens as u64)
            .sum();
        let last = trace.llm_calls.last();

        Some(TraceSnapshot {
            id: trace.id.clone(),
            endpoint: trace.endpoint.clone(),
            method: trace.method.clone(),
            start_time: trace.start_time,
            duration_ms: trace.started.elapsed().as_millis() as u64,
            step_count: trace.steps.len() as u32,
            llm_calls: trace.llm_calls.clone(),
            prompt_tokens,
            completion_tokens,
            total_tokens: trace.total_tokens,
            total_cost: trace.total_cost,
            last_model: last.map(|c| c.model.clone()),
            last_provider: last.map(|c| c.provider.clone()),
        })
    }

    /// Steps recorded so far for a request (for diagnostics/tests)
    pub async fn steps(&self, id: &str) -> Option<Vec<StepRecord>> {
        let traces = self.traces.read().await;
        traces.get(id).map(|t| t.steps.clone())
    }

    /// Number of in-flight traces
    pub async fn in_flight(&self) -> usize {
        self.traces.read().await.len()
    }

    /// Process-wide aggregate counters
    #[must_use]
    pub fn aggregate(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_llm_calls: self.total_llm_calls.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            total_cost: self.total_cost_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}
