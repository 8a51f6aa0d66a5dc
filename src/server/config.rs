//! Server configuration types
//!
//! Contains all configuration structures for the Ergon server.

use std::collections::HashMap;

use crate::middleware::rate_limit::RateLimitSettings;
use ergon_core::PricingEntry;
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Per-model pricing overrides, merged over the built-in table.
    /// A `default` key replaces the unknown-model fallback.
    #[serde(default)]
    pub pricing: HashMap<String, PricingEntry>,
}

/// HTTP server bind settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

/// SQLite file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Usage account store
    #[serde(default = "default_billing_path")]
    pub billing_path: String,
    /// Audit trail store
    #[serde(default = "default_audit_path")]
    pub audit_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            billing_path: default_billing_path(),
            audit_path: default_audit_path(),
        }
    }
}

fn default_billing_path() -> String {
    "data/billing.db".to_string()
}

fn default_audit_path() -> String {
    "data/audit.db".to_string()
}

/// LLM provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Model slug; empty means the provider default
    #[serde(default)]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    120
}
