use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use betaflow_core::config::ModelConfig;
use betaflow_core::error::{FlowError, Result};
use betaflow_core::traits::LlmClient;
use betaflow_core::types::CompletionRequest;

use super::error_body;
use super::openai::request_error;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The messages API requires max_tokens; used when neither step nor config set it.
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct AnthropicClient {
    http: Client,
}

impl AnthropicClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http }
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}

// Anthropic API request types
#[derive(Serialize, Debug)]
pub(crate) struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<ApiMessage>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Serialize, Debug)]
struct ApiMessage {
    role: String,
    content: String,
}

// Anthropic API response types
#[derive(Deserialize, Debug)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct UsageInfo {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

pub(crate) fn build_request(config: &ModelConfig, request: CompletionRequest) -> AnthropicRequest {
    AnthropicRequest {
        model: request.model,
        max_tokens: request
            .max_tokens
            .or(config.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: request.temperature.or(config.temperature),
        messages: vec![ApiMessage {
            role: "user".to_string(),
            content: request.prompt,
        }],
        extra: request.extra,
    }
}

/// Concatenate the text blocks of a messages API response.
pub(crate) fn parse_response(body: &str) -> Result<String> {
    let parsed: MessageResponse =
        serde_json::from_str(body).map_err(|e| FlowError::LlmParse(e.to_string()))?;

    if let Some(usage) = &parsed.usage {
        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Anthropic usage"
        );
    }

    let text: String = parsed
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect();
    Ok(text)
}

impl LlmClient for AnthropicClient {
    fn complete(
        &self,
        config: &ModelConfig,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<String>> {
        let config = config.clone();

        Box::pin(async move {
            let api_key = config
                .resolved_api_key()
                .ok_or_else(|| FlowError::MissingApiKey(config.provider.clone()))?;
            let base_url = config.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL);

            let body = build_request(&config, request);
            info!(model = %body.model, "Making Anthropic API request");

            let response = self
                .http
                .post(base_url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(request_error)?;

            if !response.status().is_success() {
                let status = response.status();
                let body = error_body(response).await;
                return Err(FlowError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let text = response.text().await.map_err(request_error)?;
            let content = parse_response(&text)?;
            info!("Anthropic API request completed successfully");
            Ok(content)
        })
    }
}
