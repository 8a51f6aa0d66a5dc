//! Rate limiting middleware for Axum
//!
//! Wraps the sliding window limiter from ergon-core as an Axum layer.
//! Keyed by API key id, falling back to user id, then caller IP. Every
//! gated response carries `X-RateLimit-*` headers; denials add
//! `Retry-After` and a JSON envelope.

use axum::{
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use ergon_core::rate_limit::{epoch_ms, RateDecision, RateLimitConfig, SlidingWindowRateLimiter};
use ergon_core::request_id;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::{client_ip, header_str};

// ============================================================================
// Config
// ============================================================================

/// Rate limit configuration (deserializable from TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Admitted requests per window per key
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Seconds between sweeps of idle keys
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_max_requests() -> u32 {
    60
}
fn default_window_ms() -> u64 {
    60_000
}
fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

// ============================================================================
// Rate Limit Error Response
// ============================================================================

#[derive(Debug, Serialize)]
struct RateLimitResponse {
    success: bool,
    error: String,
    code: String,
    retry_after: u64,
}

// ============================================================================
// Rate Limit State (shared across requests)
// ============================================================================

/// Shared rate limiter state
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<SlidingWindowRateLimiter>,
    enabled: bool,
}

impl RateLimitState {
    /// Create a new rate limit state from settings
    pub fn new(settings: &RateLimitSettings) -> Self {
        let config = RateLimitConfig {
            max_requests: settings.max_requests,
            window_ms: settings.window_ms,
        };

        Self {
            limiter: Arc::new(SlidingWindowRateLimiter::new(config)),
            enabled: settings.enabled,
        }
    }

    /// Check and record one request for a key
    pub async fn check_request(&self, key: &str) -> RateDecision {
        self.limiter.admit(key, epoch_ms()).await
    }

    /// Spawn the periodic idle-key sweep task
    pub fn spawn_sweep(&self, interval_secs: u64) {
        let limiter = self.limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            loop {
                interval.tick().await;
                let swept = limiter.sweep(epoch_ms()).await;
                if swept > 0 {
                    debug!(swept, "rate limiter swept idle keys");
                }
            }
        });
    }
}

// ============================================================================
// Axum Layer
// ============================================================================

/// Rate limiting layer for Axum
#[derive(Clone)]
pub struct RateLimitLayer {
    state: RateLimitState,
}

impl RateLimitLayer {
    /// Create a new rate limit layer
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            state: RateLimitState::new(settings),
        }
    }

    /// Get the inner state (for sweep task spawning)
    pub fn state(&self) -> &RateLimitState {
        &self.state
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: self.state.clone(),
        }
    }
}

// ============================================================================
// Axum Service
// ============================================================================

/// Rate limiting service wrapper
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: RateLimitState,
}

type BoxFuture<T, E> =
    std::pin::Pin<Box<dyn std::future::Future<Output = std::result::Result<T, E>> + Send>>;

impl<S, B> Service<Request<B>> for RateLimitService<S>
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
        let state = self.state.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // Health probes are never throttled
            if !state.enabled || req.uri().path() == "/health" {
                return inner.call(req).await;
            }

            let key = extract_rate_limit_key(&req);
            let decision = state.check_request(&key).await;

            if decision.allowed {
                let mut response = inner.call(req).await?;
                apply_rate_headers(response.headers_mut(), &decision);
                return Ok(response);
            }

            let retry_after = decision.retry_after_secs.unwrap_or(1);
            warn!(key = %key, retry_after_secs = retry_after, "Rate limit exceeded");

            // Denied requests never reach the request context layer, so
            // the correlation header is resolved here too.
            let request_id = request_id::from_header(header_str(req.headers(), "x-request-id"));

            let body = RateLimitResponse {
                success: false,
                error: "Rate limit exceeded. Please retry later.".to_string(),
                code: "RATE_LIMIT_EXCEEDED".to_string(),
                retry_after,
            };

            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            apply_rate_headers(response.headers_mut(), &decision);
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("retry-after", value);
            }
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert("x-request-id", value);
            }

            Ok(response)
        })
    }
}

fn apply_rate_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    let pairs = [
        ("x-ratelimit-limit", decision.limit as u64),
        ("x-ratelimit-remaining", decision.remaining as u64),
        ("x-ratelimit-reset", decision.reset_at_secs),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
            headers.insert(name, value);
        }
    }
}

/// Extract the rate limit key from a request.
/// Uses the gateway-supplied API key id or user id, falls back to IP.
fn extract_rate_limit_key<B>(req: &Request<B>) -> String {
    if let Some(key_id) = header_str(req.headers(), "x-api-key-id") {
        return format!("key:{key_id}");
    }

    if let Some(user_id) = header_str(req.headers(), "x-user-id") {
        return format!("user:{user_id}");
    }

    match client_ip(req) {
        Some(ip) => format!("ip:{ip}"),
        None => "ip:unknown".to_string(),
    }
}
