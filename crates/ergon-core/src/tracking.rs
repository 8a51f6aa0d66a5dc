//! Request tracking - per-request traces and process aggregates
//!
//! This module owns the mutable in-memory trace of each in-flight
//! request (processing steps, LLM calls, running totals) plus the
//! process-wide aggregate counters.
//!
//! # Module Structure
//!
//! - `types`: trace, step and LLM-call record types
//! - `tracker`: the `RequestTracker` registry

mod tracker;
mod types;


pub use tracker::{RequestTracker, UNKNOWN_STEP_SEQUENCE};
pub use types::{
    AggregateSnapshot, LlmCallRecord, RequestSummary, RequestTrace, StepRecord, StepStatus,
    TraceSnapshot,
};
