//! Domain models for Nexo.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider metadata, pricing and configuration
//! - [`generation`] - Generation options and suggestion results
//! - [`status`] - Provider lifecycle state and health records

mod generation;
mod provider;
mod status;

pub use generation::{DEFAULT_OPERATION, GenerationOptions, Suggestion};
pub use provider::{MASK, ModelPricing, ProviderConfig, ProviderInfo, is_sensitive_field};
pub use status::{HealthRecord, ProviderState};
