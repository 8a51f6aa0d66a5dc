//! Middleware module for the Ergon HTTP server
//!
//! Provides:
//! - Request context middleware (correlation id, trace, audit completion)
//! - Rate limiting middleware (sliding window, per caller key)
//! - Identity extraction (gateway-supplied user / API key headers)

pub mod identity;
pub mod rate_limit;
pub mod request_context;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use std::net::SocketAddr;

/// Non-empty, trimmed string value of a header, when present and ASCII
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Best-effort client IP: socket address when the server was built with
/// connect info, `X-Forwarded-For` first hop otherwise.
pub(crate) fn client_ip<B>(req: &Request<B>) -> Option<String> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip().to_string());
    }

    header_str(req.headers(), "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
}
