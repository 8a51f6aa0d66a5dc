//! Ergon Core - Request Lifecycle Instrumentation
//!
//! This crate provides the instrumentation backbone for the Ergon API:
//! - Request identity: correlation id sanitization and minting
//! - Context: ambient request scope that survives async suspension
//! - Tracking: per-request traces (steps, LLM calls) and process aggregates
//! - Pricing: token-cost table and cost calculation
//! - Rate limiting: per-key sliding window admission control

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod pricing;
pub mod rate_limit;
pub mod request_id;
pub mod tracking;

pub use context::RequestScope;
pub use pricing::{PricingEntry, PricingTable};
pub use rate_limit::{RateDecision, RateLimitConfig, SlidingWindowRateLimiter};
pub use tracking::{
    AggregateSnapshot, LlmCallRecord, RequestSummary, RequestTracker, StepRecord, StepStatus,
    TraceSnapshot,
};
