//! Ergon LLM - Provider abstraction and instrumented clients
//!
//! This crate defines the provider trait the scoring and evaluation
//! logic talks to, the OpenRouter implementation of it, and a wrapper
//! that reports token usage and latency of every completion into the
//! ambient request trace from `ergon-core`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod instrumented;
pub mod openrouter;
pub mod provider;

pub use error::{Error, Result};
pub use instrumented::InstrumentedProvider;
pub use openrouter::{OpenRouterConfig, OpenRouterProvider};
pub use provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, MessageRole, TokenUsage,
};
