use super::*;

fn limiter(max_requests: u32, window_ms: u64) -> SlidingWindowRateLimiter {
    SlidingWindowRateLimiter::new(RateLimitConfig {
        max_requests,
        window_ms,
    })
}

#[tokio::test]
async fn test_admits_up_to_limit_then_denies() {
    let limiter = limiter(3, 1000);

    let first = limiter.admit("user-1", 0).await;
    assert!(first.allowed);
    assert_eq!(first.remaining, 2);
    assert_eq!(first.retry_after_secs, None);

    let second = limiter.admit("user-1", 100).await;
    assert!(second.allowed);
    assert_eq!(second.remaining, 1);

    let third = limiter.admit("user-1", 200).await;
    assert!(third.allowed);
    assert_eq!(third.remaining, 0);

    let fourth = limiter.admit("user-1", 300).await;
    assert!(!fourth.allowed);
    assert_eq!(fourth.remaining, 0);
    assert_eq!(fourth.limit, 3);
    // Oldest request was at t=0 in a 1000ms window, so 700ms to wait,
    // reported as one whole second
    assert_eq!(fourth.reset_at_secs, 1);
    assert_eq!(fourth.retry_after_secs, Some(1));
}

#[tokio::test]
async fn test_window_slides_as_old_requests_expire() {
    let limiter = limiter(3, 1000);

    for t in [0, 100, 200] {
        assert!(limiter.admit("user-1", t).await.allowed);
    }
    assert!(!limiter.admit("user-1", 300).await.allowed);

    // At t=1001 the t=0 request has left the window
    let decision = limiter.admit("user-1", 1001).await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 0);
}

#[tokio::test]
async fn test_denied_requests_consume_nothing() {
    let limiter = limiter(2, 1000);

    assert!(limiter.admit("user-1", 0).await.allowed);
    assert!(limiter.admit("user-1", 10).await.allowed);

    // A burst of denials must not extend the window
    for t in [20, 30, 40, 50] {
        assert!(!limiter.admit("user-1", t).await.allowed);
    }

    // Once the two admitted requests expire the key is fully open again
    let decision = limiter.admit("user-1", 1011).await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 1);
}

#[tokio::test]
async fn test_keys_are_limited_independently() {
    let limiter = limiter(1, 1000);

    assert!(limiter.admit("user-a", 0).await.allowed);
    assert!(!limiter.admit("user-a", 1).await.allowed);
    assert!(limiter.admit("user-b", 1).await.allowed);
}

#[tokio::test]
async fn test_retry_after_rounds_up_to_whole_seconds() {
    let limiter = limiter(1, 5000);

    assert!(limiter.admit("user-1", 0).await.allowed);

    // 4900ms remaining rounds up to 5s
    assert_eq!(
        limiter.admit("user-1", 100).await.retry_after_secs,
        Some(5)
    );
    // 1ms remaining still reports at least 1s
    assert_eq!(
        limiter.admit("user-1", 4999).await.retry_after_secs,
        Some(1)
    );
}

#[tokio::test]
async fn test_sweep_drops_idle_keys_only() {
    let limiter = limiter(3, 1000);

    limiter.admit("idle", 0).await;
    limiter.admit("active", 1900).await;
    assert_eq!(limiter.tracked_keys().await, 2);

    // At t=2000 the idle key last fired 2000ms ago (two windows), the
    // active key 100ms ago
    let removed = limiter.sweep(2000).await;
    assert_eq!(removed, 1);
    assert_eq!(limiter.tracked_keys().await, 1);

    // The surviving key still carries its history
    limiter.admit("active", 1950).await;
    limiter.admit("active", 1960).await;
    assert!(!limiter.admit("active", 1970).await.allowed);
}

#[tokio::test]
async fn test_sweep_on_empty_limiter_is_harmless() {
    let limiter = limiter(3, 1000);
    assert_eq!(limiter.sweep(10_000).await, 0);
}
