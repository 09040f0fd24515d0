//! Provider descriptor system.
//!
//! A descriptor holds the static facts about a vendor: where it lives,
//! which models it serves, what they cost and which configuration fields
//! it cannot work without.

use nexo_core::{ModelPricing, ProviderInfo};

// ============================================================================
// Pricing
// ============================================================================

/// Static price entry, USD per million tokens.
#[derive(Debug, Clone, Copy)]
pub struct PriceEntry {
    /// Model identifier.
    pub model: &'static str,
    /// Input price.
    pub input_per_million: f64,
    /// Output price.
    pub output_per_million: f64,
}

impl PriceEntry {
    /// Converts to the shared pricing type.
    pub fn to_pricing(self) -> ModelPricing {
        ModelPricing::new(self.model, self.input_per_million, self.output_per_million)
    }
}

// ============================================================================
// Provider Descriptor
// ============================================================================

/// Complete static description of a vendor.
#[derive(Debug)]
pub struct ProviderDescriptor {
    /// Registration key.
    pub name: &'static str,
    /// Display name.
    pub display_name: &'static str,
    /// Vendor label.
    pub vendor: &'static str,
    /// Endpoint used when no `base_url` is configured.
    pub default_base_url: &'static str,
    /// Domain requests are pinned to when the default endpoint is used.
    pub allowed_domain: Option<&'static str>,
    /// Model used when neither config nor options name one.
    pub default_model: &'static str,
    /// Known models.
    pub models: &'static [&'static str],
    /// Fields `configure()` insists on.
    pub required_fields: &'static [&'static str],
    /// Price table.
    pub pricing: &'static [PriceEntry],
    /// Default fallback priority (lower is tried first).
    pub priority: i32,
    /// Whether the backend runs on this machine.
    pub is_local: bool,
}

impl ProviderDescriptor {
    /// Builds the metadata reported through `provider_info()`.
    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.to_string(),
            display_name: self.display_name.to_string(),
            vendor: self.vendor.to_string(),
            default_model: self.default_model.to_string(),
            models: self.models.iter().map(ToString::to_string).collect(),
            required_fields: self.required_fields.iter().map(ToString::to_string).collect(),
            pricing: self.pricing.iter().map(|p| p.to_pricing()).collect(),
            is_local: self.is_local,
        }
    }

    /// Estimates the cost of a call for `model`.
    ///
    /// Unknown models are priced like the default model; a provider with
    /// no price table is free.
    pub fn estimate_cost(&self, model: &str, tokens_in: u64, tokens_out: u64) -> f64 {
        self.pricing
            .iter()
            .find(|p| p.model == model)
            .or_else(|| self.pricing.iter().find(|p| p.model == self.default_model))
            .map_or(0.0, |p| p.to_pricing().estimate(tokens_in, tokens_out))
    }
}
