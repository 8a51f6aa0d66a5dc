use super::*;
use crate::error::{Error, Result};
use crate::store::SqliteAuditStore;

struct FailingSink;

#[async_trait::async_trait]
impl AuditSink for FailingSink {
    async fn record(&self, _entry: &AuditEntry, _calls: &[AuditLlmCall]) -> Result<()> {
        Err(Error::Database("sink offline".to_string()))
    }
}

async fn tracked_request(tracker: &RequestTracker, id: &str) {
    tracker
        .start_request(id, "/api/v1/interviews/42/evaluate", "POST")
        .await;
    tracker
        .log_llm_call(
            id,
            "google/gemini-3-flash-preview",
            "openrouter",
            1000,
            500,
            1200,
        )
        .await;
}

fn completion(id: &str, status_code: u16) -> CompletionInfo {
    CompletionInfo {
        request_id: id.to_string(),
        status_code,
        user_id: Some("user-1".to_string()),
        api_key_id: None,
        ip_address: Some("203.0.113.9".to_string()),
        user_agent: None,
    }
}

#[tokio::test]
async fn test_persists_aggregate_and_child_rows() {
    let store = Arc::new(SqliteAuditStore::in_memory().await.unwrap());
    let tracker = Arc::new(RequestTracker::new());
    let persister = AuditPersister::new(tracker.clone(), store.clone());
    tracked_request(&tracker, "req-1").await;

    let summary = persister
        .on_request_complete(completion("req-1", 200))
        .await
        .unwrap();
    assert_eq!(summary.status, "success");
    assert_eq!(summary.llm_calls, 1);

    let entry = store.get_by_request_id("req-1").await.unwrap();
    assert_eq!(entry.endpoint, "/api/v1/interviews/42/evaluate");
    assert_eq!(entry.module, "interviews");
    assert_eq!(entry.api_name, "interviews.:id.evaluate");
    assert_eq!(entry.status_code, 200);
    assert_eq!(entry.prompt_tokens, 1000);
    assert_eq!(entry.completion_tokens, 500);
    assert_eq!(entry.total_tokens, 1500);
    assert_eq!(entry.llm_call_count, 1);
    assert!((entry.cost - 0.0020).abs() < 1e-9);
    assert_eq!(entry.user_id.as_deref(), Some("user-1"));
    assert_eq!(entry.ip_address.as_deref(), Some("203.0.113.9"));
    assert_eq!(entry.provider.as_deref(), Some("openrouter"));
    assert_eq!(entry.model.as_deref(), Some("google/gemini-3-flash-preview"));

    let calls = store.llm_calls_for(&entry.id).await.unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].model, "google/gemini-3-flash-preview");
    assert_eq!(calls[0].total_tokens, 1500);
    assert_eq!(calls[0].duration_ms, 1200);
}

#[tokio::test]
async fn test_duplicate_completion_writes_single_row() {
    let store = Arc::new(SqliteAuditStore::in_memory().await.unwrap());
    let tracker = Arc::new(RequestTracker::new());
    let persister = AuditPersister::new(tracker.clone(), store.clone());
    tracked_request(&tracker, "req-dup").await;

    let first = persister
        .on_request_complete(completion("req-dup", 200))
        .await;
    let second = persister
        .on_request_complete(completion("req-dup", 499))
        .await;

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(store.count_for_request("req-dup").await.unwrap(), 1);
}

#[tokio::test]
async fn test_client_disconnect_labelled_cancelled() {
    let store = Arc::new(SqliteAuditStore::in_memory().await.unwrap());
    let tracker = Arc::new(RequestTracker::new());
    let persister = AuditPersister::new(tracker.clone(), store.clone());
    tracked_request(&tracker, "req-gone").await;

    let summary = persister
        .on_request_complete(completion("req-gone", 499))
        .await
        .unwrap();
    assert_eq!(summary.status, "cancelled");

    let entry = store.get_by_request_id("req-gone").await.unwrap();
    assert_eq!(entry.status_code, 499);
    // Work done before the disconnect is still accounted
    assert_eq!(entry.llm_call_count, 1);
    assert_eq!(entry.total_tokens, 1500);
}

#[tokio::test]
async fn test_sink_failure_still_finalizes_trace() {
    let tracker = Arc::new(RequestTracker::new());
    let persister = AuditPersister::new(tracker.clone(), Arc::new(FailingSink));
    tracked_request(&tracker, "req-lossy").await;

    let summary = persister
        .on_request_complete(completion("req-lossy", 200))
        .await;

    assert!(summary.is_some());
    assert_eq!(tracker.in_flight().await, 0);
}

#[tokio::test]
async fn test_unknown_request_writes_nothing() {
    let store = Arc::new(SqliteAuditStore::in_memory().await.unwrap());
    let tracker = Arc::new(RequestTracker::new());
    let persister = AuditPersister::new(tracker, store.clone());

    let summary = persister
        .on_request_complete(completion("req-ghost", 200))
        .await;

    assert!(summary.is_none());
    assert_eq!(store.count_for_request("req-ghost").await.unwrap(), 0);
}

#[test]
fn test_guard_fires_exactly_once() {
    let guard = CompletionGuard::new();
    assert!(!guard.has_fired());
    assert!(guard.try_fire());
    assert!(!guard.try_fire());
    assert!(!guard.try_fire());
    assert!(guard.has_fired());
}

#[test]
fn test_status_labels() {
    assert_eq!(status_label(200), "success");
    assert_eq!(status_label(204), "success");
    assert_eq!(status_label(302), "success");
    assert_eq!(status_label(400), "client_error");
    assert_eq!(status_label(404), "client_error");
    assert_eq!(status_label(429), "client_error");
    assert_eq!(status_label(499), "cancelled");
    assert_eq!(status_label(500), "error");
    assert_eq!(status_label(503), "error");
}
