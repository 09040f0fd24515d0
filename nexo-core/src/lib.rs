// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Nexo Core
//!
//! Core types, the provider capability contract, event types and the
//! privacy filter shared by every other Nexo crate.
//!
//! ## Key Types
//!
//! ### Providers
//! - [`TextProvider`] - Capability contract every backend implements
//! - [`ProviderInfo`] - Descriptive metadata and pricing
//! - [`ProviderConfig`] - Field map passed to `configure()`
//! - [`ProviderState`] / [`HealthRecord`] - Lifecycle and health
//!
//! ### Generation
//! - [`GenerationOptions`] - Options accompanying a prompt
//! - [`Suggestion`] - Result returned by one provider
//!
//! ### Cross-cutting
//! - [`EventBus`] / [`NexoEvent`] - Typed notifications
//! - [`PrivacyFilter`] - Outbound prompt redaction

pub mod error;
pub mod events;
pub mod models;
pub mod privacy;
pub mod traits;

pub use error::ProviderError;
pub use events::{EventBus, NexoEvent};
pub use models::{
    DEFAULT_OPERATION, GenerationOptions, HealthRecord, MASK, ModelPricing, ProviderConfig,
    ProviderInfo, ProviderState, Suggestion, is_sensitive_field,
};
pub use privacy::{FilteredPrompt, PrivacyFilter, PrivacyReport, REDACTION_MARKER, SensitiveKind};
pub use traits::{DEFAULT_PROVIDER_TIMEOUT, ProviderRegistration, TextProvider};
