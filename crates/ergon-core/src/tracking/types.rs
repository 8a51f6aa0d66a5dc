//! Trace record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Lifecycle status of a processing step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Step has begun and not yet ended
    Started,
    /// Step finished successfully
    Completed,
    /// Step finished with an error
    Failed,
}

impl StepStatus {
    /// String form used in logs and audit metadata
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One named processing step inside a request.
///
/// Immutable once ended: `end_step` only applies to a step still in
/// `Started` state.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// 1-based sequence number, increasing per request
    pub sequence: u32,
    /// Step name (e.g. "parse_resume")
    pub name: String,
    /// Current status
    pub status: StepStatus,
    /// When the step started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration, set when the step ends
    pub duration_ms: Option<u64>,
    /// Arbitrary step metadata, set when the step ends
    pub metadata: Option<serde_json::Value>,
}

/// One completed LLM call inside a request.
///
/// Appended when the call finishes, so list order is completion order,
/// which may differ from issue order when a handler fans out calls
/// concurrently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCallRecord {
    /// Model slug (e.g. "google/gemini-3-flash-preview")
    pub model: String,
    /// Provider name (e.g. "openrouter")
    pub provider: String,
    /// Prompt tokens consumed
    pub prompt_tokens: u32,
    /// Completion tokens generated
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
    /// Priced cost of this call (USD)
    pub cost: f64,
    /// Call latency in milliseconds
    pub duration_ms: u64,
}

/// The accumulated in-memory trace of one in-flight request.
///
/// Created by `start_request`, mutated by any holder of the id, removed
/// exactly once by `end_request`. Not persisted by the tracker itself;
/// snapshot it before ending the request or the data is gone.
#[derive(Debug, Clone)]
pub struct RequestTrace {
    /// Correlation id
    pub id: String,
    /// Request path
    pub endpoint: String,
    /// HTTP method
    pub method: String,
    /// When the request started
    pub start_time: DateTime<Utc>,
    /// Monotonic start instant, for duration arithmetic
    pub started: Instant,
    /// Processing steps, ordered by sequence
    pub steps: Vec<StepRecord>,
    /// Completed LLM calls, in completion order
    pub llm_calls: Vec<LlmCallRecord>,
    /// Running cost total (USD)
    pub total_cost: f64,
    /// Running token total
    pub total_tokens: u64,
}

impl RequestTrace {
    pub(crate) fn new(id: impl Into<String>, endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            method: method.into(),
            start_time: Utc::now(),
            started: Instant::now(),
            steps: Vec::new(),
            llm_calls: Vec::new(),
            total_cost: 0.0,
            total_tokens: 0,
        }
    }
}

/// Read-only copy of a trace's accumulated totals.
///
/// Taken by the billing and audit paths before `end_request` discards
/// the trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceSnapshot {
    /// Correlation id
    pub id: String,
    /// Request path
    pub endpoint: String,
    /// HTTP method
    pub method: String,
    /// When the request started
    pub start_time: DateTime<Utc>,
    /// Elapsed time so far in milliseconds
    pub duration_ms: u64,
    /// Number of recorded steps
    pub step_count: u32,
    /// Completed LLM calls, in completion order
    pub llm_calls: Vec<LlmCallRecord>,
    /// Sum of prompt tokens across calls
    pub prompt_tokens: u64,
    /// Sum of completion tokens across calls
    pub completion_tokens: u64,
    /// Sum of all tokens across calls
    pub total_tokens: u64,
    /// Sum of priced costs across calls (USD)
    pub total_cost: f64,
    /// Model of the most recently completed call
    pub last_model: Option<String>,
    /// Provider of the most recently completed call
    pub last_provider: Option<String>,
}

/// Summary emitted when a request ends
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    /// Correlation id
    pub id: String,
    /// Request path
    pub endpoint: String,
    /// HTTP method
    pub method: String,
    /// Outcome label (e.g. "success", "cancelled")
    pub status: String,
    /// HTTP status code of the response
    pub status_code: u16,
    /// Total request duration in milliseconds
    pub duration_ms: u64,
    /// Number of steps recorded
    pub steps: u32,
    /// Number of LLM calls recorded
    pub llm_calls: u32,
    /// Total tokens across calls
    pub total_tokens: u64,
    /// Total priced cost across calls (USD)
    pub total_cost: f64,
}

/// Process-wide aggregate counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateSnapshot {
    /// Requests started since process start
    pub total_requests: u64,
    /// LLM calls recorded since process start
    pub total_llm_calls: u64,
    /// Tokens consumed since process start
    pub total_tokens: u64,
    /// Accumulated cost since process start (USD)
    pub total_cost: f64,
}
