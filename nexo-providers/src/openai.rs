//! OpenAI chat completions adapter.
//!
//! # API Endpoint
//!
//! ```text
//! POST https://api.openai.com/v1/chat/completions
//! Authorization: Bearer <api_key>
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use nexo_core::{
    GenerationOptions, ProviderConfig, ProviderError, ProviderInfo, Suggestion, TextProvider,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::adapter::{AdapterCore, RequestContext, approximate_tokens, check_status};
use crate::descriptor::{PriceEntry, ProviderDescriptor};

/// Static description of the OpenAI backend.
pub static OPENAI: ProviderDescriptor = ProviderDescriptor {
    name: "openai",
    display_name: "OpenAI",
    vendor: "OpenAI",
    default_base_url: "https://api.openai.com",
    allowed_domain: Some("openai.com"),
    default_model: "gpt-4o-mini",
    models: &["gpt-4o-mini", "gpt-4o"],
    required_fields: &["api_key"],
    pricing: &[
        PriceEntry {
            model: "gpt-4o-mini",
            input_per_million: 0.15,
            output_per_million: 0.60,
        },
        PriceEntry {
            model: "gpt-4o",
            input_per_million: 2.50,
            output_per_million: 10.00,
        },
    ],
    priority: 10,
    is_local: false,
};

const COMPLETIONS_ENDPOINT: &str = "/v1/chat/completions";
const MODELS_ENDPOINT: &str = "/v1/models";

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

// ============================================================================
// Provider
// ============================================================================

/// OpenAI adapter.
#[derive(Debug)]
pub struct OpenAiProvider {
    core: AdapterCore,
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiProvider {
    /// Creates an unconfigured adapter.
    pub fn new() -> Self {
        Self {
            core: AdapterCore::new(&OPENAI),
        }
    }
}

fn auth_headers(ctx: &RequestContext) -> Result<HeaderMap, ProviderError> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&format!("Bearer {}", ctx.api_key()))
        .map_err(|_| ProviderError::Config("api_key contains invalid characters".to_string()))?;
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

fn build_request(model: &str, prompt: &str, options: &GenerationOptions) -> Value {
    let mut messages = Vec::new();
    if let Some(system) = &options.system_prompt {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({"role": "user", "content": prompt}));

    let mut body = json!({"model": model, "messages": messages});
    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }
    for (key, value) in &options.extra {
        body[key.as_str()] = value.clone();
    }
    body
}

/// Extracts text and token usage from a chat completion body.
fn parse_response(body: &str, prompt: &str) -> Result<(String, (u64, u64)), ProviderError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".to_string()))?;

    let tokens = match response.usage {
        Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
        None => (approximate_tokens(prompt), approximate_tokens(&text)),
    };
    Ok((text, tokens))
}

#[async_trait]
impl TextProvider for OpenAiProvider {
    fn name(&self) -> &str {
        OPENAI.name
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

    #[instrument(skip(self, prompt, options), fields(provider = OPENAI.name))]
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
                &ctx.url(COMPLETIONS_ENDPOINT),
                auth_headers(&ctx)?,
                &build_request(&model, prompt, options),
            )
            .await?;
        let body = check_status(response)
            .await?
            .text()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let (text, tokens) = parse_response(&body, prompt)?;
        debug!(model = %model, tokens_in = tokens.0, tokens_out = tokens.1, "Completion received");
        Ok(self.core.finish(model, text, tokens, started))
    }

    fn provider_info(&self) -> ProviderInfo {
        OPENAI.info()
    }

    fn timeout(&self) -> Duration {
        self.core.timeout()
    }
}

// ============================================================================
// Tests
// ============================================================================
