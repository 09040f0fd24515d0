//! Anthropic messages adapter.
//!
//! # API Endpoint
//!
//! ```text
//! POST https://api.anthropic.com/v1/messages
//! x-api-key: <api_key>
//! anthropic-version: 2023-06-01
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use nexo_core::{
    GenerationOptions, ProviderConfig, ProviderError, ProviderInfo, Suggestion, TextProvider,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::adapter::{AdapterCore, RequestContext, check_status};
use crate::descriptor::{PriceEntry, ProviderDescriptor};

/// Static description of the Anthropic backend.
pub static ANTHROPIC: ProviderDescriptor = ProviderDescriptor {
    name: "anthropic",
    display_name: "Anthropic",
    vendor: "Anthropic",
    default_base_url: "https://api.anthropic.com",
    allowed_domain: Some("anthropic.com"),
    default_model: "claude-3-5-haiku-latest",
    models: &["claude-3-5-haiku-latest", "claude-sonnet-4-0"],
    required_fields: &["api_key"],
    pricing: &[
        PriceEntry {
            model: "claude-3-5-haiku-latest",
            input_per_million: 0.80,
            output_per_million: 4.00,
        },
        PriceEntry {
            model: "claude-sonnet-4-0",
            input_per_million: 3.00,
            output_per_million: 15.00,
        },
    ],
    priority: 20,
    is_local: false,
};

const MESSAGES_ENDPOINT: &str = "/v1/messages";
const MODELS_ENDPOINT: &str = "/v1/models";
const API_VERSION: &str = "2023-06-01";

/// The messages API requires `max_tokens`; used when the caller sets none.
const DEFAULT_MAX_TOKENS: u32 = 1024;

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u64,
    output_tokens: u64,
}

// ============================================================================
// Provider
// ============================================================================

/// Anthropic adapter.
#[derive(Debug)]
pub struct AnthropicProvider {
    core: AdapterCore,
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AnthropicProvider {
    /// Creates an unconfigured adapter.
    pub fn new() -> Self {
        Self {
            core: AdapterCore::new(&ANTHROPIC),
        }
    }
}

fn auth_headers(ctx: &RequestContext) -> Result<HeaderMap, ProviderError> {
    let mut headers = HeaderMap::new();
    let key = HeaderValue::from_str(ctx.api_key())
        .map_err(|_| ProviderError::Config("api_key contains invalid characters".to_string()))?;
    headers.insert(HeaderName::from_static("x-api-key"), key);
    headers.insert(
        HeaderName::from_static("anthropic-version"),
        HeaderValue::from_static(API_VERSION),
    );
    Ok(headers)
}

fn build_request(model: &str, prompt: &str, options: &GenerationOptions) -> Value {
    let mut body = json!({
        "model": model,
        "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": [{"role": "user", "content": prompt}],
    });
    if let Some(system) = &options.system_prompt {
        body["system"] = json!(system);
    }
    if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }
    for (key, value) in &options.extra {
        body[key.as_str()] = value.clone();
    }
    body
}

/// Joins the text blocks of a messages response.
fn parse_response(body: &str) -> Result<(String, (u64, u64)), ProviderError> {
    let response: MessagesResponse = serde_json::from_str(body)?;
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();

    if text.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "no text content in response".to_string(),
        ));
    }
    Ok((
        text,
        (response.usage.input_tokens, response.usage.output_tokens),
    ))
}

#[async_trait]
impl TextProvider for AnthropicProvider {
    fn name(&self) -> &str {
        ANTHROPIC.name
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        self.core.initialize().await
    }

    async fn configure(&self, config: ProviderConfig) -> Result<(), ProviderError> {
        self.core.configure(config).await
    }

    async fn test_connection(&self) -> bool {
        self.core.probe(MODELS_ENDPOINT, auth_headers).await
    }

    #[instrument(skip(self, prompt, options), fields(provider = ANTHROPIC.name))]
    async fn generate_suggestion(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Suggestion, ProviderError> {
        let ctx = self.core.request_context().await?;
        let model = self.core.model_for(&ctx, options);
        self.core.throttle().await;

        let started = Instant::now();
        let response = ctx
            .client
            .post_json(
                &ctx.url(MESSAGES_ENDPOINT),
                auth_headers(&ctx)?,
                &build_request(&model, prompt, options),
            )
            .await?;
        let body = check_status(response)
            .await?
            .text()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let (text, tokens) = parse_response(&body)?;
        debug!(model = %model, tokens_in = tokens.0, tokens_out = tokens.1, "Message received");
        Ok(self.core.finish(model, text, tokens, started))
    }

    fn provider_info(&self) -> ProviderInfo {
        ANTHROPIC.info()
    }

    fn timeout(&self) -> Duration {
        self.core.timeout()
    }
}

// ============================================================================
// Tests
// ============================================================================
