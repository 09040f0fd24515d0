//! Generation request options and results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation type recorded when the caller does not name one.
pub const DEFAULT_OPERATION: &str = "suggestion";

/// Options accompanying a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// Model override.
    pub model: Option<String>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// System instruction sent ahead of the prompt.
    pub system_prompt: Option<String>,
    /// Label used for cost accounting (e.g. "suggestion", "summary").
    pub operation_type: String,
    /// Vendor-specific passthrough options.
    pub extra: BTreeMap<String, Value>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: None,
            temperature: None,
            system_prompt: None,
            operation_type: DEFAULT_OPERATION.to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl GenerationOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the maximum number of generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the operation type used for cost accounting.
    pub fn with_operation(mut self, operation_type: impl Into<String>) -> Self {
        self.operation_type = operation_type.into();
        self
    }
}

/// A generated suggestion as returned by a single provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Generated text.
    pub text: String,
    /// Prompt tokens consumed.
    pub tokens_in: u64,
    /// Completion tokens produced.
    pub tokens_out: u64,
    /// Estimated cost in USD.
    pub cost_estimate: f64,
    /// Wall-clock latency of the call.
    pub latency_ms: u64,
    /// Model that served the request.
    pub model: Option<String>,
}

impl Suggestion {
    /// Total tokens for this call.
    pub fn total_tokens(&self) -> u64 {
        self.tokens_in + self.tokens_out
    }
}
