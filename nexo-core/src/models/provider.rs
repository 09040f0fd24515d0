//! Provider-related types.
//!
//! - [`ProviderInfo`] - Descriptive metadata reported by a provider
//! - [`ModelPricing`] - Per-model token pricing
//! - [`ProviderConfig`] - Field map handed to `configure()`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder shown instead of secret values.
pub const MASK: &str = "********";

// ============================================================================
// Pricing
// ============================================================================

/// Token pricing for one model, in USD per million tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Model identifier.
    pub model: String,
    /// Cost per million input tokens.
    pub input_per_million: f64,
    /// Cost per million output tokens.
    pub output_per_million: f64,
}

impl ModelPricing {
    /// Creates a pricing entry.
    pub fn new(model: impl Into<String>, input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            model: model.into(),
            input_per_million,
            output_per_million,
        }
    }

    /// Pricing for a model that costs nothing (local runtimes).
    pub fn free(model: impl Into<String>) -> Self {
        Self::new(model, 0.0, 0.0)
    }

    /// Estimates the cost of a call.
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate(&self, tokens_in: u64, tokens_out: u64) -> f64 {
        (tokens_in as f64 / 1_000_000.0) * self.input_per_million
            + (tokens_out as f64 / 1_000_000.0) * self.output_per_million
    }
}

// ============================================================================
// Provider Info
// ============================================================================

/// Descriptive metadata a provider reports about itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Unique registration key (e.g. "openai").
    pub name: String,
    /// Human readable name.
    pub display_name: String,
    /// Vendor label.
    pub vendor: String,
    /// Default model used when the caller does not pick one.
    pub default_model: String,
    /// Models the provider is known to serve.
    pub models: Vec<String>,
    /// Configuration fields that must be present and non-empty.
    pub required_fields: Vec<String>,
    /// Pricing table.
    pub pricing: Vec<ModelPricing>,
    /// Whether the provider runs locally (no network egress).
    pub is_local: bool,
}

impl ProviderInfo {
    /// Returns the pricing for a model, falling back to the default model.
    pub fn pricing_for(&self, model: &str) -> Option<&ModelPricing> {
        self.pricing
            .iter()
            .find(|p| p.model == model)
            .or_else(|| self.pricing.iter().find(|p| p.model == self.default_model))
    }

    /// Returns true if an API credential is required.
    pub fn requires_api_key(&self) -> bool {
        self.required_fields.iter().any(|f| f == "api_key")
    }
}

// ============================================================================
// Provider Config
// ============================================================================

/// Returns true if a configuration field name looks like a credential.
pub fn is_sensitive_field(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("api_key")
        || lower.contains("apikey")
        || lower.contains("token")
        || lower.contains("secret")
        || lower.contains("password")
        || lower.contains("credential")
}

/// Configuration for a single provider.
///
/// Stored as an ordered field map so that vendor-specific options pass
/// through untouched. Well-known fields have typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderConfig {
    fields: BTreeMap<String, Value>,
}

impl ProviderConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Gets a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Gets a field as a string slice.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Removes a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Returns true if the field is present and, for strings, non-blank.
    pub fn has_value(&self, key: &str) -> bool {
        match self.fields.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// Iterates over all fields.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Iterates mutably over all fields.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.fields.iter_mut()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// API credential.
    pub fn api_key(&self) -> Option<&str> {
        self.get_str("api_key").filter(|s| !s.trim().is_empty())
    }

    /// Base URL override.
    pub fn base_url(&self) -> Option<&str> {
        self.get_str("base_url").filter(|s| !s.trim().is_empty())
    }

    /// Model override.
    pub fn model(&self) -> Option<&str> {
        self.get_str("model").filter(|s| !s.trim().is_empty())
    }

    /// Per-call timeout in seconds.
    pub fn timeout_secs(&self) -> Option<u64> {
        self.get("timeout_secs").and_then(Value::as_u64)
    }

    /// Local rate limit cap.
    pub fn max_requests_per_window(&self) -> Option<u32> {
        self.get("max_requests_per_window")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Names of fields that hold credentials.
    pub fn sensitive_fields(&self) -> Vec<String> {
        self.fields
            .keys()
            .filter(|k| is_sensitive_field(k))
            .cloned()
            .collect()
    }

    /// Returns a copy with every sensitive field masked.
    pub fn redacted(&self) -> Self {
        let fields = self
            .fields
            .iter()
            .map(|(k, v)| {
                if is_sensitive_field(k) && !v.is_null() {
                    (k.clone(), Value::String(MASK.to_string()))
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();
        Self { fields }
    }
}

impl From<BTreeMap<String, Value>> for ProviderConfig {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

// ============================================================================
// Tests
// ============================================================================
