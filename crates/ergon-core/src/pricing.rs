//! Model pricing and cost calculation
//!
//! Every LLM call is priced from a per-model table of USD rates per 1M
//! tokens. Models are keyed by their OpenRouter-style slug; unknown
//! models fall back to a default entry so pricing never fails.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Constants
// ============================================================================

/// Default cost per 1M input tokens (USD) for unknown models
pub const DEFAULT_INPUT_COST_PER_MILLION: f64 = 5.0;

/// Default cost per 1M output tokens (USD) for unknown models
pub const DEFAULT_OUTPUT_COST_PER_MILLION: f64 = 15.0;

// Model pricing constants (USD per 1M tokens)
/// Gemini 3 Flash input cost per 1M tokens
const GEMINI3_FLASH_INPUT_COST: f64 = 0.50;
/// Gemini 3 Flash output cost per 1M tokens
const GEMINI3_FLASH_OUTPUT_COST: f64 = 3.00;
/// Gemini 3 Pro input cost per 1M tokens
const GEMINI3_PRO_INPUT_COST: f64 = 2.00;
/// Gemini 3 Pro output cost per 1M tokens
const GEMINI3_PRO_OUTPUT_COST: f64 = 12.00;
/// GPT-5 mini input cost per 1M tokens
const GPT5_MINI_INPUT_COST: f64 = 0.25;
/// GPT-5 mini output cost per 1M tokens
const GPT5_MINI_OUTPUT_COST: f64 = 2.00;
/// GPT-5 input cost per 1M tokens
const GPT5_INPUT_COST: f64 = 1.25;
/// GPT-5 output cost per 1M tokens
const GPT5_OUTPUT_COST: f64 = 10.00;
/// Claude Sonnet 4.5 input cost per 1M tokens
const CLAUDE_SONNET45_INPUT_COST: f64 = 3.00;
/// Claude Sonnet 4.5 output cost per 1M tokens
const CLAUDE_SONNET45_OUTPUT_COST: f64 = 15.00;
/// Claude Haiku 4.5 input cost per 1M tokens
const CLAUDE_HAIKU45_INPUT_COST: f64 = 1.00;
/// Claude Haiku 4.5 output cost per 1M tokens
const CLAUDE_HAIKU45_OUTPUT_COST: f64 = 5.00;
/// Llama 3.3 70B input cost per 1M tokens
const LLAMA33_70B_INPUT_COST: f64 = 0.59;
/// Llama 3.3 70B output cost per 1M tokens
const LLAMA33_70B_OUTPUT_COST: f64 = 0.79;
/// DeepSeek Chat input cost per 1M tokens
const DEEPSEEK_CHAT_INPUT_COST: f64 = 0.14;
/// DeepSeek Chat output cost per 1M tokens
const DEEPSEEK_CHAT_OUTPUT_COST: f64 = 0.28;

// ============================================================================
// Types
// ============================================================================

/// Pricing for a single model (USD per 1M tokens)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    /// Cost per 1M prompt tokens (USD)
    pub input_per_million: f64,
    /// Cost per 1M completion tokens (USD)
    pub output_per_million: f64,
}

impl PricingEntry {
    /// Create a new pricing entry
    #[must_use]
    pub fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Calculate cost for given token counts
    #[must_use]
    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (completion_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

/// Pricing table keyed by model slug, with a default entry for unknowns
#[derive(Debug, Clone)]
pub struct PricingTable {
    entries: HashMap<String, PricingEntry>,
    default_entry: PricingEntry,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingTable {
    /// Create a table with the built-in model entries
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: builtin_pricing(),
            default_entry: PricingEntry::new(
                DEFAULT_INPUT_COST_PER_MILLION,
                DEFAULT_OUTPUT_COST_PER_MILLION,
            ),
        }
    }

    /// Merge configured overrides on top of the built-in entries.
    ///
    /// An override keyed `default` replaces the fallback entry instead of
    /// adding a model.
    #[must_use]
    pub fn with_overrides(mut self, overrides: HashMap<String, PricingEntry>) -> Self {
        for (model, entry) in overrides {
            if model == "default" {
                self.default_entry = entry;
            } else {
                self.entries.insert(model, entry);
            }
        }
        self
    }

    /// Look up pricing for a model, falling back to the default entry
    #[must_use]
    pub fn entry_for(&self, model: &str) -> PricingEntry {
        self.entries.get(model).copied().unwrap_or(self.default_entry)
    }

    /// Compute the cost of one LLM call.
    ///
    /// Never fails, always non-negative, monotonically non-decreasing in
    /// both token counts.
    #[must_use]
    pub fn cost(&self, model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        self.entry_for(model).cost(prompt_tokens, completion_tokens)
    }

    /// Number of known model entries (excluding the default)
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no model entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Built-in pricing for the models the product routes to via OpenRouter
#[must_use]
pub fn builtin_pricing() -> HashMap<String, PricingEntry> {
    let mut pricing = HashMap::new();

    pricing.insert(
        "google/gemini-3-flash-preview".to_string(),
        PricingEntry::new(GEMINI3_FLASH_INPUT_COST, GEMINI3_FLASH_OUTPUT_COST),
    );
    pricing.insert(
        "google/gemini-3-pro".to_string(),
        PricingEntry::new(GEMINI3_PRO_INPUT_COST, GEMINI3_PRO_OUTPUT_COST),
    );
    pricing.insert(
        "openai/gpt-5-mini".to_string(),
        PricingEntry::new(GPT5_MINI_INPUT_COST, GPT5_MINI_OUTPUT_COST),
    );
    pricing.insert(
        "openai/gpt-5".to_string(),
        PricingEntry::new(GPT5_INPUT_COST, GPT5_OUTPUT_COST),
    );
    pricing.insert(
        "anthropic/claude-sonnet-4.5".to_string(),
        PricingEntry::new(CLAUDE_SONNET45_INPUT_COST, CLAUDE_SONNET45_OUTPUT_COST),
    );
    pricing.insert(
        "anthropic/claude-haiku-4.5".to_string(),
        PricingEntry::new(CLAUDE_HAIKU45_INPUT_COST, CLAUDE_HAIKU45_OUTPUT_COST),
    );
    pricing.insert(
        "meta-llama/llama-3.3-70b-instruct".to_string(),
        PricingEntry::new(LLAMA33_70B_INPUT_COST, LLAMA33_70B_OUTPUT_COST),
    );
    pricing.insert(
        "deepseek/deepseek-chat".to_string(),
        PricingEntry::new(DEEPSEEK_CHAT_INPUT_COST, DEEPSEEK_CHAT_OUTPUT_COST),
    );

    pricing
}
