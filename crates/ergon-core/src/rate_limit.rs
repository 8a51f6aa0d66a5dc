//! Per-user sliding window rate limiting
//!
//! Each key holds the epoch-millisecond timestamps of its requests
//! inside the current window. Expired timestamps are purged on every
//! admission check, so a key's count always reflects the live window.
//! Callers inject the clock, which keeps the arithmetic testable.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::debug;

/// Limits applied to one key
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per window
    pub max_requests: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_ms: 60_000,
        }
    }
}

/// Outcome of one admission check, with everything the HTTP layer
/// needs for `X-RateLimit-*` and `Retry-After` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured per-window maximum
    pub limit: u32,
    /// Admissions left in the window after this decision
    pub remaining: u32,
    /// Epoch seconds when the oldest counted request leaves the window,
    /// rounded up
    pub reset_at_secs: u64,
    /// Whole seconds to wait before retrying, rounded up. Only set on
    /// denial.
    pub retry_after_secs: Option<u64>,
}

/// Sliding window rate limiter keyed by user id
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Vec<u64>>>,
}

impl SlidingWindowRateLimiter {
    /// Create a limiter with the given per-key limits
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// The limits this limiter enforces
    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Decide whether a request for `key` at `now_ms` may proceed.
    ///
    /// Expired timestamps are purged before counting. A denied request
    /// consumes nothing, so hammering a limit never extends the wait.
    pub async fn admit(&self, key: &str, now_ms: u64) -> RateDecision {
        let RateLimitConfig {
            max_requests,
            window_ms,
        } = self.config;

        let mut windows = self.windows.lock().await;
        let timestamps = windows.entry(key.to_string()).or_default();

        let cutoff = now_ms.saturating_sub(window_ms);
        timestamps.retain(|&ts| ts > cutoff);

        if (timestamps.len() as u32) < max_requests {
            timestamps.push(now_ms);
            let oldest = timestamps.first().copied().unwrap_or(now_ms);
            return RateDecision {
                allowed: true,
                limit: max_requests,
                remaining: max_requests - timestamps.len() as u32,
                reset_at_secs: (oldest + window_ms).div_ceil(1000),
                retry_after_secs: None,
            };
        }

        let oldest = timestamps.first().copied().unwrap_or(now_ms);
        let reset_ms = oldest + window_ms;
        let wait_ms = reset_ms.saturating_sub(now_ms);
        debug!(key, wait_ms, "rate limit exceeded");

        RateDecision {
            allowed: false,
            limit: max_requests,
            remaining: 0,
            reset_at_secs: reset_ms.div_ceil(1000),
            retry_after_secs: Some(wait_ms.div_ceil(1000)),
        }
    }

    /// Drop keys that have been idle for at least two full windows.
    ///
    /// Returns the number of keys removed. Run periodically so keys for
    /// departed users do not accumulate forever.
    pub async fn sweep(&self, now_ms: u64) -> usize {
        let idle_cutoff = now_ms.saturating_sub(self.config.window_ms.saturating_mul(2));

        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, timestamps| {
            timestamps.last().is_some_and(|&newest| newest > idle_cutoff)
        });
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, remaining = windows.len(), "swept idle rate limit keys");
        }
        removed
    }

    /// Number of keys currently tracked
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

/// Milliseconds since the Unix epoch on the system clock
#[must_use]
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests;
