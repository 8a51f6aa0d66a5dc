//! OpenRouter - Multi-provider LLM Gateway
//!
//! All production traffic goes through OpenRouter, which fronts the
//! OpenAI, Anthropic, Google and open-weight models behind one
//! OpenAI-compatible API. The response's `usage` block is the source of
//! truth for token counts fed into cost tracking.

use crate::error::{Error, Result};
use crate::provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, TokenUsage,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

// ============================================================================
// Constants
// ============================================================================

/// OpenRouter API base URL
pub const BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Models the scoring and evaluation pipelines are tuned for
pub const MODELS: &[&str] = &[
    // Google
    "google/gemini-3-flash-preview",
    "google/gemini-3-pro",
    // OpenAI
    "openai/gpt-5-mini",
    "openai/gpt-5",
    // Anthropic
    "anthropic/claude-sonnet-4.5",
    "anthropic/claude-haiku-4.5",
    // Open weight
    "meta-llama/llama-3.3-70b-instruct",
    "deepseek/deepseek-chat",
];

/// Default model for scoring traffic
pub const DEFAULT_MODEL: &str = "google/gemini-3-flash-preview";

// ============================================================================
// Security Utilities
// ============================================================================

/// Sanitize API error messages before they reach logs or clients
fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("invalid key")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return "API authentication error. Please check your API key configuration.".to_string();
    }

    if lower.contains("rate limit") || lower.contains("quota") {
        return "API rate limit exceeded. Please try again later.".to_string();
    }

    if error.len() < 100 {
        return error.to_string();
    }

    "An API error occurred. Please try again.".to_string()
}

/// Mask API key for safe display
fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 {
        return "****".to_string();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}

// ============================================================================
// Configuration
// ============================================================================

/// OpenRouter provider configuration
#[derive(Clone)]
pub struct OpenRouterConfig {
    /// API key
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Request timeout
    pub timeout: Duration,
    /// App name (for OpenRouter analytics)
    pub app_name: Option<String>,
    /// Site URL (for OpenRouter analytics)
    pub site_url: Option<String>,
}

impl fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouterConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .field("app_name", &self.app_name)
            .finish()
    }
}

impl OpenRouterConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
            app_name: Some("Ergon".to_string()),
            site_url: None,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| Error::NotConfigured("OPENROUTER_API_KEY not set".to_string()))?;

        let base_url =
            std::env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| BASE_URL.to_string());
        let default_model =
            std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_key,
            base_url,
            default_model,
            timeout: Duration::from_secs(120),
            app_name: std::env::var("OPENROUTER_APP_NAME").ok(),
            site_url: std::env::var("OPENROUTER_SITE_URL").ok(),
        })
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ============================================================================
// API Types (OpenAI compatible)
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<OpenRouterMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenRouterMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct OpenRouterResponse {
    id: String,
    model: String,
    choices: Vec<OpenRouterChoice>,
    usage: Option<OpenRouterUsage>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct OpenRouterChoice {
    index: u32,
    message: OpenRouterMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenRouterError {
    error: OpenRouterErrorDetail,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct OpenRouterErrorDetail {
    message: String,
    code: Option<i32>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// OpenRouter LLM provider
pub struct OpenRouterProvider {
    client: Client,
    config: OpenRouterConfig,
}

impl OpenRouterProvider {
    /// Create a new OpenRouter provider
    #[must_use]
    pub fn new(config: OpenRouterConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let config = OpenRouterConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Convert our message to OpenRouter format
    fn convert_message(msg: &Message) -> OpenRouterMessage {
        OpenRouterMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }

    /// Make API request
    async fn request<T: serde::de::DeserializeOwned>(&self, body: &OpenRouterRequest) -> Result<T> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        // OpenRouter attribution headers
        if let Some(app_name) = &self.config.app_name {
            request = request.header("X-Title", app_name);
        }
        if let Some(site_url) = &self.config.site_url {
            request = request.header("HTTP-Referer", site_url);
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if status.as_u16() == 429 {
            return Err(Error::RateLimit);
        }
        if !status.is_success() {
            let error: std::result::Result<OpenRouterError, _> = serde_json::from_str(&text);
            let message = error
                .map(|e| e.error.message)
                .unwrap_or_else(|_| text.clone());
            return Err(Error::Api(sanitize_api_error(&message)));
        }

        serde_json::from_str(&text).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn available_models(&self) -> Vec<String> {
        MODELS.iter().map(|s| (*s).to_string()).collect()
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = if request.model.is_empty() {
            &self.config.default_model
        } else {
            &request.model
        };

        let messages: Vec<OpenRouterMessage> =
            request.messages.iter().map(Self::convert_message).collect();

        let openrouter_request = OpenRouterRequest {
            model: model.to_string(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!("Sending request to OpenRouter API");

        let response: OpenRouterResponse = self.request(&openrouter_request).await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| Error::InvalidResponse("No choices in response".to_string()))?;

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            content: choice.message.content.clone(),
            usage,
            finish_reason: choice.finish_reason.clone(),
            model: response.model,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = OpenRouterConfig::new("test-key")
            .with_model("openai/gpt-5-mini")
            .with_timeout(Duration::from_secs(60))
            .with_base_url("http://localhost:9999/api/v1");

        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.default_model, "openai/gpt-5-mini");
        assert_eq!(config.base_url, "http://localhost:9999/api/v1");
    }

    #[test]
    fn test_default_model_is_in_catalog() {
        assert!(MODELS.contains(&DEFAULT_MODEL));
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("short"), "****");
        assert_eq!(mask_api_key("sk-or-1234567890abcdef"), "sk-o...cdef");
    }

    #[test]
    fn test_sanitize_api_error_redacts_auth_details() {
        let sanitized = sanitize_api_error("Invalid key: sk-or-v1-deadbeef");
        assert!(!sanitized.contains("deadbeef"));
        assert!(sanitized.contains("authentication"));

        let sanitized = sanitize_api_error("Rate limit exceeded for org");
        assert!(sanitized.contains("rate limit"));
    }

    #[test]
    fn test_convert_message_uses_wire_roles() {
        let converted =
            OpenRouterProvider::convert_message(&Message::assistant("score: 82"));
        assert_eq!(converted.role, "assistant");
        assert_eq!(converted.content, "score: 82");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "id": "gen-abc123",
            "model": "google/gemini-3-flash-preview",
            "choices": [
                {
                    "index": 0,
                    "message": {"role": "assistant", "content": "{\"score\": 82}"},
                    "finish_reason": "stop"
                }
            ],
            "usage": {"prompt_tokens": 1000, "completion_tokens": 500, "total_tokens": 1500}
        }"#;

        let parsed: OpenRouterResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.choices[0].message.content, "{\"score\": 82}");
        let usage = parsed.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 1000);
        assert_eq!(usage.total_tokens, 1500);
    }

    #[test]
    fn test_error_body_parsing() {
        let raw = r#"{"error": {"message": "quota exhausted", "code": 402}}"#;
        let parsed: OpenRouterError = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.message, "quota exhausted");
    }
}
