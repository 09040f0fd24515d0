//! HTTP client with tracing and an optional domain allowlist.
//!
//! Vendor adapters talk to their backends through [`HttpClient`] so that
//! every outbound request is logged the same way and can be restricted to
//! the hosts a provider is expected to reach.

use std::time::Duration;

use reqwest::{Client, Response, header::HeaderMap};
use tracing::{debug, instrument};
use url::Url;

use crate::error::HttpError;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for Nexo.
const USER_AGENT: &str = concat!("Nexo/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and domain allowlist.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpClient {
    /// Creates a client with the default timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let inner = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(Self {
            inner,
            allowed_domains: None,
        })
    }

    /// Restricts requests to the given domains and their subdomains.
    #[must_use]
    pub fn allow_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    fn check_domain(&self, url: &str) -> Result<(), HttpError> {
        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        let Some(ref allowed) = self.allowed_domains else {
            return Ok(());
        };

        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(HttpError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Performs a GET request with custom headers.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<Response, HttpError> {
        self.check_domain(url)?;
        debug!("GET request");

        let response = self.inner.get(url).headers(headers).send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a POST request with a JSON body and custom headers.
    #[instrument(skip(self, headers, body), fields(url = %url))]
    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &T,
    ) -> Result<Response, HttpError> {
        self.check_domain(url)?;
        debug!("POST request with JSON");

        let response = self
            .inner
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }
}

// ============================================================================
// Response Extensions
// ============================================================================

/// Extension trait for Response handling.
pub trait ResponseExt {
    /// Check if the response indicates rate limiting.
    fn is_rate_limited(&self) -> bool;

    /// Get the Retry-After header value in seconds.
    fn retry_after_secs(&self) -> Option<u64>;
}

impl ResponseExt for Response {
    fn is_rate_limited(&self) -> bool {
        self.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
    }

    fn retry_after_secs(&self) -> Option<u64> {
        self.headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_allowlist() {
        let client = HttpClient::new()
            .unwrap()
            .allow_domains(vec!["api.anthropic.com".to_string(), "openai.com".to_string()]);

        assert!(client.check_domain("https://api.anthropic.com/v1/messages").is_ok());
        assert!(client.check_domain("https://api.openai.com/v1/chat/completions").is_ok());
        assert!(matches!(
            client.check_domain("https://evil.com/steal"),
            Err(HttpError::DomainNotAllowed(_))
        ));
    }

    #[test]
    fn test_unrestricted_client_still_rejects_garbage() {
        let client = HttpClient::new().unwrap();

        assert!(client.check_domain("http://localhost:11434/api/tags").is_ok());
        assert!(matches!(
            client.check_domain("not-a-valid-url"),
            Err(HttpError::InvalidUrl(_))
        ));
    }
}
