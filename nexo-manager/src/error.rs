//! Manager error types.

use nexo_core::ProviderError;
use nexo_fetch::FallbackAttempt;
use nexo_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the [`ProviderManager`](crate::ProviderManager).
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No provider is registered under that name.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// The provider exists but is not currently available.
    #[error("Provider {0} is not available")]
    ProviderUnavailable(String),

    /// No candidate was left, or every candidate failed.
    #[error("All providers unavailable{}", describe(.attempts))]
    AllProvidersUnavailable {
        /// One record per candidate tried, in order. Empty when there was
        /// nothing to try.
        attempts: Vec<FallbackAttempt>,
    },

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A provider rejected a direct call (e.g. `configure`).
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

fn describe(attempts: &[FallbackAttempt]) -> String {
    if attempts.is_empty() {
        return ": no providers to try".to_string();
    }
    let tried: Vec<String> = attempts
        .iter()
        .map(|a| format!("{} ({})", a.candidate, a.error.as_deref().unwrap_or("ok")))
        .collect();
    format!(": {}", tried.join(", "))
}

impl ManagerError {
    /// Returns true if the caller supplied bad input.
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Store(e) => e.is_config_error(),
            Self::Provider(e) => e.is_config_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_all_unavailable_message() {
        let err = ManagerError::AllProvidersUnavailable { attempts: vec![] };
        assert_eq!(err.to_string(), "All providers unavailable: no providers to try");

        let err = ManagerError::AllProvidersUnavailable {
            attempts: vec![
                FallbackAttempt::failure("openai", "timeout", Duration::ZERO),
                FallbackAttempt::failure("ollama", "refused", Duration::ZERO),
            ],
        };
        assert_eq!(
            err.to_string(),
            "All providers unavailable: openai (timeout), ollama (refused)"
        );
    }

    #[test]
    fn test_is_config_error() {
        assert!(ManagerError::Config("x".into()).is_config_error());
        assert!(ManagerError::Store(StoreError::Format("x".into())).is_config_error());
        assert!(!ManagerError::ProviderUnavailable("x".into()).is_config_error());
    }
}
