//! Fetch error types.

use nexo_core::ProviderError;
use thiserror::Error;

use crate::fallback::FallbackAttempt;

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Client could not be built.
    #[error("Client build failed: {0}")]
    Build(String),
}

impl From<HttpError> for ProviderError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Request(e) if e.is_decode() => ProviderError::InvalidResponse(e.to_string()),
            HttpError::Request(e) => ProviderError::Http(e.to_string()),
            HttpError::DomainNotAllowed(host) => {
                ProviderError::Config(format!("domain not allowed: {host}"))
            }
            HttpError::InvalidUrl(msg) => ProviderError::Config(format!("invalid URL: {msg}")),
            HttpError::Build(msg) => ProviderError::Other(msg),
        }
    }
}

// ============================================================================
// Fallback Error
// ============================================================================

/// Error returned when a fallback run produced no result.
#[derive(Debug, Clone, Error)]
pub enum FallbackError {
    /// The candidate list was empty.
    #[error("No candidates available")]
    NoCandidates,

    /// Every candidate was tried and failed.
    #[error("All candidates failed: {}", summarize(.attempts))]
    AllCandidatesFailed {
        /// One record per candidate, in the order tried.
        attempts: Vec<FallbackAttempt>,
    },
}

fn summarize(attempts: &[FallbackAttempt]) -> String {
    attempts
        .iter()
        .map(|a| {
            format!(
                "{} ({})",
                a.candidate,
                a.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}
