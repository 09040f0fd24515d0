//! Shared plumbing for HTTP-backed adapters.
//!
//! Every vendor adapter owns an [`AdapterCore`]. It holds the applied
//! configuration, the HTTP client built from it and the local request
//! throttle, and turns raw vendor answers into [`Suggestion`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use nexo_core::{
    DEFAULT_PROVIDER_TIMEOUT, GenerationOptions, ProviderConfig, ProviderError, Suggestion,
};
use nexo_fetch::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, FixedWindowLimiter, HttpClient, ResponseExt};
use reqwest::Response;
use reqwest::header::HeaderMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::descriptor::ProviderDescriptor;

/// Longest error body excerpt kept in a [`ProviderError::Status`].
const MAX_ERROR_BODY: usize = 200;

// ============================================================================
// Request Context
// ============================================================================

/// Snapshot of what one request needs, taken under the state lock.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Client built for the current configuration.
    pub client: HttpClient,
    /// Base URL without trailing slash.
    pub base_url: String,
    /// The applied configuration.
    pub config: ProviderConfig,
}

impl RequestContext {
    /// Joins `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Credential, or an empty string for keyless backends.
    pub fn api_key(&self) -> &str {
        self.config.api_key().unwrap_or_default()
    }
}

// ============================================================================
// Adapter Core
// ============================================================================

#[derive(Debug, Default)]
struct AdapterState {
    config: ProviderConfig,
    client: Option<HttpClient>,
    configured: bool,
}

/// Configuration, client and throttle shared by all adapters.
#[derive(Debug)]
pub struct AdapterCore {
    descriptor: &'static ProviderDescriptor,
    state: RwLock<AdapterState>,
    limiter: RwLock<Arc<FixedWindowLimiter>>,
    timeout_secs: AtomicU64,
}

impl AdapterCore {
    /// Creates an unconfigured core for `descriptor`.
    pub fn new(descriptor: &'static ProviderDescriptor) -> Self {
        Self {
            descriptor,
            state: RwLock::new(AdapterState::default()),
            limiter: RwLock::new(Arc::new(FixedWindowLimiter::new(
                DEFAULT_MAX_REQUESTS,
                DEFAULT_WINDOW,
            ))),
            timeout_secs: AtomicU64::new(DEFAULT_PROVIDER_TIMEOUT.as_secs()),
        }
    }

    /// The static descriptor.
    pub fn descriptor(&self) -> &'static ProviderDescriptor {
        self.descriptor
    }

    /// Builds a default client so connection checks work before configuration.
    pub async fn initialize(&self) -> Result<(), ProviderError> {
        let mut state = self.state.write().await;
        if state.client.is_none() {
            state.client = Some(self.build_client(None, DEFAULT_PROVIDER_TIMEOUT)?);
        }
        debug!(provider = self.descriptor.name, "Adapter initialized");
        Ok(())
    }

    /// Validates and applies `config`.
    ///
    /// On failure the previous configuration stays in effect.
    pub async fn configure(&self, config: ProviderConfig) -> Result<(), ProviderError> {
        for field in self.descriptor.required_fields {
            if !config.has_value(field) {
                return Err(ProviderError::Config(format!(
                    "{} requires field '{field}'",
                    self.descriptor.name
                )));
            }
        }

        let base_url = match config.base_url() {
            Some(raw) => Some(parse_base_url(raw)?),
            None => None,
        };

        if config.has_value("timeout_secs") && !config.timeout_secs().is_some_and(|t| t > 0) {
            return Err(ProviderError::Config(
                "timeout_secs must be a positive integer".to_string(),
            ));
        }
        let timeout = config
            .timeout_secs()
            .map_or(DEFAULT_PROVIDER_TIMEOUT, Duration::from_secs);
        let max_requests = config
            .max_requests_per_window()
            .unwrap_or(DEFAULT_MAX_REQUESTS);

        let client = self.build_client(base_url.as_deref(), timeout)?;

        {
            let mut state = self.state.write().await;
            state.config = config;
            state.client = Some(client);
            state.configured = true;
        }
        *self.limiter.write().await = Arc::new(FixedWindowLimiter::new(max_requests, DEFAULT_WINDOW));
        self.timeout_secs.store(timeout.as_secs(), Ordering::Relaxed);

        debug!(
            provider = self.descriptor.name,
            timeout_secs = timeout.as_secs(),
            max_requests,
            "Adapter configured"
        );
        Ok(())
    }

    fn build_client(
        &self,
        base_url_override: Option<&str>,
        timeout: Duration,
    ) -> Result<HttpClient, ProviderError> {
        let client = HttpClient::with_timeout(timeout)?;
        // A custom endpoint is the user's choice; only pin the vendor's own host.
        Ok(match (base_url_override, self.descriptor.allowed_domain) {
            (None, Some(domain)) => client.allow_domains(vec![domain.to_string()]),
            _ => client,
        })
    }

    /// Per-call timeout from the applied configuration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.load(Ordering::Relaxed))
    }

    /// Whether `configure()` has succeeded at least once.
    pub async fn is_configured(&self) -> bool {
        self.state.read().await.configured
    }

    /// Snapshot for a generation request. Fails when unconfigured.
    pub async fn request_context(&self) -> Result<RequestContext, ProviderError> {
        let state = self.state.read().await;
        let (true, Some(client)) = (state.configured, state.client.clone()) else {
            return Err(ProviderError::NotConfigured(self.descriptor.name.to_string()));
        };
        Ok(RequestContext {
            client,
            base_url: self.base_url_of(&state.config),
            config: state.config.clone(),
        })
    }

    /// Snapshot for a connection probe. Works before configuration.
    async fn probe_context(&self) -> Option<RequestContext> {
        let state = self.state.read().await;
        let client = state.client.clone()?;
        Some(RequestContext {
            client,
            base_url: self.base_url_of(&state.config),
            config: state.config.clone(),
        })
    }

    fn base_url_of(&self, config: &ProviderConfig) -> String {
        config
            .base_url()
            .unwrap_or(self.descriptor.default_base_url)
            .trim_end_matches('/')
            .to_string()
    }

    /// Waits for a slot in the local request window.
    pub async fn throttle(&self) {
        let limiter = Arc::clone(&*self.limiter.read().await);
        limiter.acquire().await;
    }

    /// Resolves the model: options, then configuration, then the default.
    pub fn model_for(&self, ctx: &RequestContext, options: &GenerationOptions) -> String {
        options
            .model
            .as_deref()
            .or_else(|| ctx.config.model())
            .unwrap_or(self.descriptor.default_model)
            .to_string()
    }

    /// Issues a GET and reports whether the backend answered with success.
    pub async fn probe<F>(&self, path: &str, headers: F) -> bool
    where
        F: FnOnce(&RequestContext) -> Result<HeaderMap, ProviderError>,
    {
        let Some(ctx) = self.probe_context().await else {
            return false;
        };
        let headers = match headers(&ctx) {
            Ok(h) => h,
            Err(e) => {
                debug!(provider = self.descriptor.name, error = %e, "Probe skipped");
                return false;
            }
        };

        match ctx.client.get_with_headers(&ctx.url(path), headers).await {
            Ok(response) => {
                let ok = response.status().is_success();
                debug!(provider = self.descriptor.name, status = %response.status(), ok, "Probe finished");
                ok
            }
            Err(e) => {
                debug!(provider = self.descriptor.name, error = %e, "Probe failed");
                false
            }
        }
    }

    /// Builds the suggestion, pricing it from the descriptor table.
    pub fn finish(
        &self,
        model: String,
        text: String,
        tokens: (u64, u64),
        started: Instant,
    ) -> Suggestion {
        let (tokens_in, tokens_out) = tokens;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Suggestion {
            cost_estimate: self.descriptor.estimate_cost(&model, tokens_in, tokens_out),
            text,
            tokens_in,
            tokens_out,
            latency_ms,
            model: Some(model),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Validates a configured endpoint and strips any trailing slash.
pub fn parse_base_url(raw: &str) -> Result<String, ProviderError> {
    let url = Url::parse(raw).map_err(|e| ProviderError::Config(format!("invalid base_url: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProviderError::Config(format!(
            "base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Maps a vendor response status onto [`ProviderError`], passing success through.
pub async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if response.is_rate_limited() {
        return Err(ProviderError::RateLimited {
            retry_after: response.retry_after_secs(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, "Vendor request failed");

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ProviderError::AuthenticationFailed(format!(
            "status {status}"
        )));
    }

    Err(ProviderError::Status {
        status: status.as_u16(),
        message: excerpt(&body),
    })
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Rough token count for vendors that omit usage figures.
pub fn approximate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

// ============================================================================
// Tests
// ============================================================================
