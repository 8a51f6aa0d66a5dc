//! Error types for ergon-audit

use thiserror::Error;

/// Audit error type
#[derive(Debug, Error)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Audit row not found
    #[error("audit entry not found for request: {0}")]
    NotFound(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
