//! Request context middleware
//!
//! Per-request instrumentation: resolves the correlation id (inbound
//! `X-Request-Id` honored, else minted), opens a trace, establishes the
//! ambient scope for the handler's entire async call graph, and reports
//! completion exactly once whether the response finished or the client
//! went away mid-flight.

use axum::http::{HeaderValue, Request};
use axum::response::Response;
use ergon_audit::{AuditPersister, CompletionGuard, CompletionInfo};
use ergon_core::context::{self, RequestScope};
use ergon_core::request_id;
use ergon_core::tracking::RequestTracker;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

use super::{client_ip, header_str};

/// Status recorded when the connection closes before the response
const CLIENT_DISCONNECT_STATUS: u16 = 499;

// ============================================================================
// Completion bookkeeping
// ============================================================================

/// Request metadata captured up front, completed with a status code at
/// whichever completion path fires.
#[derive(Clone)]
struct CompletionParts {
    request_id: String,
    user_id: Option<String>,
    api_key_id: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl CompletionParts {
    fn into_info(self, status_code: u16) -> CompletionInfo {
        CompletionInfo {
            request_id: self.request_id,
            status_code,
            user_id: self.user_id,
            api_key_id: self.api_key_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        }
    }
}

/// Fires the completion event if the request future is dropped before
/// the response path disarms it (client disconnect, server shutdown).
struct DisconnectGuard {
    persister: Arc<AuditPersister>,
    guard: Arc<CompletionGuard>,
    parts: Option<CompletionParts>,
}

impl DisconnectGuard {
    fn disarm(&mut self) {
        self.parts = None;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let Some(parts) = self.parts.take() else {
            return;
        };
        if !self.guard.try_fire() {
            return;
        }

        let info = parts.into_info(CLIENT_DISCONNECT_STATUS);
        debug!(request_id = %info.request_id, "client disconnected before response");

        // No runtime during teardown; the audit row is lost there.
        let persister = self.persister.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                persister.on_request_complete(info).await;
            });
        }
    }
}

// ============================================================================
// Axum Layer
// ============================================================================

/// Request context layer for Axum
#[derive(Clone)]
pub struct RequestContextLayer {
    tracker: Arc<RequestTracker>,
    persister: Arc<AuditPersister>,
}

impl RequestContextLayer {
    /// Create a new request context layer
    pub fn new(tracker: Arc<RequestTracker>, persister: Arc<AuditPersister>) -> Self {
        Self { tracker, persister }
    }
}

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextService {
            inner,
            tracker: self.tracker.clone(),
            persister: self.persister.clone(),
        }
    }
}

// ============================================================================
// Axum Service
// ============================================================================

/// Request context service wrapper
#[derive(Clone)]
pub struct RequestContextService<S> {
    inner: S,
    tracker: Arc<RequestTracker>,
    persister: Arc<AuditPersister>,
}

type BoxFuture<T, E> =
    std::pin::Pin<Box<dyn std::future::Future<Output = std::result::Result<T, E>> + Send>>;

impl<S, B> Service<Request<B>> for RequestContextService<S>
where
    S: Service<Request<B>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Response, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> BoxFuture<Response, S::Error> {
        let tracker = self.tracker.clone();
        let persister = self.persister.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let request_id = request_id::from_header(header_str(req.headers(), "x-request-id"));
            let endpoint = req.uri().path().to_string();
            let method = req.method().to_string();

            let parts = CompletionParts {
                request_id: request_id.clone(),
                user_id: header_str(req.headers(), "x-user-id").map(str::to_string),
                api_key_id: header_str(req.headers(), "x-api-key-id").map(str::to_string),
                ip_address: client_ip(&req),
                user_agent: header_str(req.headers(), "user-agent").map(str::to_string),
            };

            tracker.start_request(&request_id, &endpoint, &method).await;

            let guard = Arc::new(CompletionGuard::new());
            let mut disconnect = DisconnectGuard {
                persister: persister.clone(),
                guard: guard.clone(),
                parts: Some(parts.clone()),
            };

            let scope = RequestScope::new(request_id.clone(), tracker);
            let mut response = context::with_scope(scope, inner.call(req)).await?;

            disconnect.disarm();
            if guard.try_fire() {
                persister
                    .on_request_complete(parts.into_info(response.status().as_u16()))
                    .await;
            }

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert("x-request-id", value);
            }

            Ok(response)
        })
    }
}
