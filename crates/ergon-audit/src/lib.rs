//! Ergon Audit - durable request audit trail
//!
//! When a request completes (response finished or connection closed,
//! coalesced to fire once), the persister snapshots the in-memory
//! trace, classifies the endpoint path into low-cardinality
//! `{module, api_name}` labels, and writes one aggregate audit row plus
//! one child row per LLM call. Audit failures are logged and swallowed;
//! they never affect a response that has already been sent.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classifier;
pub mod error;
pub mod persister;
pub mod store;

pub use classifier::{classify, EndpointClass};
pub use error::{Error, Result};
pub use persister::{AuditPersister, CompletionGuard, CompletionInfo};
pub use store::{AuditEntry, AuditLlmCall, AuditSink, SqliteAuditStore};
