//! Provider capability contract.
//!
//! Every text-generation backend implements [`TextProvider`]. The manager
//! holds providers as `Arc<dyn TextProvider>` and never depends on a
//! vendor type.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::{GenerationOptions, ProviderConfig, ProviderInfo, Suggestion};

/// Default per-call timeout.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Capability contract for a text-generation backend.
///
/// Implementors are shared across concurrent requests, so configuration
/// lives behind interior mutability.
///
/// ## Implementing a Provider
///
/// ```ignore
/// struct EchoProvider;
///
/// #[async_trait]
/// impl TextProvider for EchoProvider {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     async fn configure(&self, _config: ProviderConfig) -> Result<(), ProviderError> {
///         Ok(())
///     }
///
///     async fn test_connection(&self) -> bool {
///         true
///     }
///
///     async fn generate_suggestion(
///         &self,
///         prompt: &str,
///         _options: &GenerationOptions,
///     ) -> Result<Suggestion, ProviderError> {
///         // build a Suggestion from the prompt
///     }
///
///     fn provider_info(&self) -> ProviderInfo {
///         // static metadata
///     }
/// }
/// ```
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Unique registration key.
    fn name(&self) -> &str;

    /// One-time setup before configuration (e.g. building HTTP clients).
    async fn initialize(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Applies a configuration.
    ///
    /// Fails with [`ProviderError::Config`] when a field is invalid.
    async fn configure(&self, config: ProviderConfig) -> Result<(), ProviderError>;

    /// Lightweight connectivity check. Never errors, only reports.
    async fn test_connection(&self) -> bool;

    /// Generates a suggestion for the prompt.
    async fn generate_suggestion(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Suggestion, ProviderError>;

    /// Descriptive metadata.
    fn provider_info(&self) -> ProviderInfo;

    /// Per-call timeout applied by the caller.
    fn timeout(&self) -> Duration {
        DEFAULT_PROVIDER_TIMEOUT
    }
}

/// A provider instance plus its static ordering, handed to the manager.
#[derive(Clone)]
pub struct ProviderRegistration {
    /// Unique registration key.
    pub name: String,
    /// Lower is tried first.
    pub priority: i32,
    /// The backend.
    pub instance: Arc<dyn TextProvider>,
}

impl ProviderRegistration {
    /// Registers `instance` under its own name.
    pub fn new(priority: i32, instance: Arc<dyn TextProvider>) -> Self {
        Self {
            name: instance.name().to_string(),
            priority,
            instance,
        }
    }
}

impl std::fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
