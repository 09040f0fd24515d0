//! Core error types for Nexo.

use std::time::Duration;

use thiserror::Error;

/// Error raised by a text-generation provider.
///
/// Every variant is recoverable by falling back to the next provider;
/// only [`ProviderError::Config`] is also surfaced directly by
/// configuration calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A configuration field is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The provider has not been configured yet.
    #[error("Provider {0} is not configured")]
    NotConfigured(String),

    /// Authentication with the vendor failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The vendor rejected the request because of its own rate limit.
    #[error("Rate limited by vendor, retry after {retry_after:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, when the vendor says.
        retry_after: Option<u64>,
    },

    /// The call did not complete within the provider timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The vendor answered with something we could not interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Vendor returned a non-success status.
    #[error("Provider returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Body or message excerpt.
        message: String,
    },

    /// Generic failure.
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Returns true if this error stems from bad configuration rather than
    /// a transient backend failure.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::NotConfigured(_) | Self::AuthenticationFailed(_)
        )
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
