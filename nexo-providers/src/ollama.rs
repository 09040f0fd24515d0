//! Ollama adapter for locally served models.
//!
//! No credential is needed and every call is free.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use nexo_core::{
    GenerationOptions, ProviderConfig, ProviderError, ProviderInfo, Suggestion, TextProvider,
};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::adapter::{AdapterCore, RequestContext, approximate_tokens, check_status};
use crate::descriptor::ProviderDescriptor;

/// Static description of a local Ollama server.
pub static OLLAMA: ProviderDescriptor = ProviderDescriptor {
    name: "ollama",
    display_name: "Ollama",
    vendor: "Ollama",
    default_base_url: "http://localhost:11434",
    allowed_domain: None,
    default_model: "llama3.2",
    models: &["llama3.2"],
    required_fields: &[],
    pricing: &[],
    priority: 30,
    is_local: true,
};

const GENERATE_ENDPOINT: &str = "/api/generate";
const TAGS_ENDPOINT: &str = "/api/tags";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

/// Ollama adapter.
#[derive(Debug)]
pub struct OllamaProvider {
    core: AdapterCore,
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaProvider {
    /// Creates an unconfigured adapter.
    pub fn new() -> Self {
        Self {
            core: AdapterCore::new(&OLLAMA),
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
fn no_headers(_ctx: &RequestContext) -> Result<HeaderMap, ProviderError> {
    Ok(HeaderMap::new())
}

fn build_request(model: &str, prompt: &str, options: &GenerationOptions) -> Value {
    let mut body = json!({"model": model, "prompt": prompt, "stream": false});
    if let Some(system) = &options.system_prompt {
        body["system"] = json!(system);
    }

    let mut model_options = serde_json::Map::new();
    if let Some(max_tokens) = options.max_tokens {
        model_options.insert("num_predict".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = options.temperature {
        model_options.insert("temperature".to_string(), json!(temperature));
    }
    for (key, value) in &options.extra {
        model_options.insert(key.clone(), value.clone());
    }
    if !model_options.is_empty() {
        body["options"] = Value::Object(model_options);
    }
    body
}

fn parse_response(body: &str, prompt: &str) -> Result<(String, (u64, u64)), ProviderError> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    let tokens_in = response
        .prompt_eval_count
        .unwrap_or_else(|| approximate_tokens(prompt));
    let tokens_out = response
        .eval_count
        .unwrap_or_else(|| approximate_tokens(&response.response));
    Ok((response.response, (tokens_in, tokens_out)))
}

#[async_trait]
impl TextProvider for OllamaProvider {
    fn name(&self) -> &str {
        OLLAMA.name
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        self.core.initialize().await
    }

    async fn configure(&self, config: ProviderConfig) -> Result<(), ProviderError> {
        self.core.configure(config).await
    }

    async fn test_connection(&self) -> bool {
        self.core.probe(TAGS_ENDPOINT, no_headers).await
    }

    #[instrument(skip(self, prompt, options), fields(provider = OLLAMA.name))]
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
                &ctx.url(GENERATE_ENDPOINT),
                HeaderMap::new(),
                &build_request(&model, prompt, options),
            )
            .await?;
        let body = check_status(response)
            .await?
            .text()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let (text, tokens) = parse_response(&body, prompt)?;
        debug!(model = %model, tokens_in = tokens.0, tokens_out = tokens.1, "Generation received");
        Ok(self.core.finish(model, text, tokens, started))
    }

    fn provider_info(&self) -> ProviderInfo {
        OLLAMA.info()
    }

    fn timeout(&self) -> Duration {
        self.core.timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = r#"{"model": "llama3.2", "response": "Hi!", "done": true,
            "prompt_eval_count": 8, "eval_count": 2}"#;
        assert_eq!(
            parse_response(body, "hello").unwrap(),
            ("Hi!".to_string(), (8, 2))
        );

        let body = r#"{"response": "abcd", "done": true}"#;
        assert_eq!(parse_response(body, "abcdefgh").unwrap().1, (2, 1));
    }

    #[test]
    fn test_build_request_nests_options() {
        let body = build_request("llama3.2", "hi", &GenerationOptions::new());
        assert_eq!(body["stream"], false);
        assert!(body.get("options").is_none());

        let body = build_request("llama3.2", "hi", &GenerationOptions::new().with_max_tokens(32));
        assert_eq!(body["options"]["num_predict"], 32);
    }

    #[tokio::test]
    async fn test_free_and_keyless() {
        let provider = OllamaProvider::new();
        let info = provider.provider_info();
        assert!(info.is_local);
        assert!(!info.requires_api_key());

        provider.configure(ProviderConfig::new()).await.unwrap();
        let suggestion = provider.core.finish(
            "llama3.2".to_string(),
            "x".to_string(),
            (1000, 1000),
            Instant::now(),
        );
        assert!(suggestion.cost_estimate.abs() < f64::EPSILON);
    }
}
