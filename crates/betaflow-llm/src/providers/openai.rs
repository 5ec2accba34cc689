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

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    /// Client whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

// Request types
#[derive(Serialize, Debug)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Serialize, Debug)]
pub(crate) struct OaiMessage {
    role: String,
    content: String,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Build the request body. Step-level values win over config defaults.
pub(crate) fn build_request(config: &ModelConfig, request: CompletionRequest) -> ChatRequest {
    ChatRequest {
        model: request.model,
        messages: vec![OaiMessage {
            role: "user".to_string(),
            content: request.prompt,
        }],
        max_tokens: request.max_tokens.or(config.max_tokens),
        temperature: request.temperature.or(config.temperature),
        extra: request.extra,
    }
}

/// Pull the first choice's text out of a response body.
pub(crate) fn parse_response(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| FlowError::LlmParse(e.to_string()))?;

    if let Some(usage) = &parsed.usage {
        debug!(
            input_tokens = usage.prompt_tokens,
            output_tokens = usage.completion_tokens,
            "OpenAI usage"
        );
    }

    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| FlowError::LlmParse("response contained no choices".into()))
}

pub(crate) fn request_error(e: reqwest::Error) -> FlowError {
    if e.is_timeout() {
        FlowError::LlmRequest(format!("timeout: {}", e))
    } else if e.is_connect() {
        FlowError::LlmRequest(format!("connection error: {}", e))
    } else {
        FlowError::LlmRequest(e.to_string())
    }
}

impl LlmClient for OpenAiClient {
    fn complete(
        &self,
        config: &ModelConfig,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<String>> {
        let config = config.clone();

        Box::pin(async move {
            let base_url = config.base_url.as_deref().unwrap_or(OPENAI_API_URL);
            let api_key = config.resolved_api_key();

            // Only the hosted OpenAI endpoint insists on a key; local servers don't.
            if api_key.is_none() && config.base_url.is_none() {
                return Err(FlowError::MissingApiKey(config.provider.clone()));
            }

            let body = build_request(&config, request);
            info!(model = %body.model, "Making OpenAI API request");

            let mut req = self.http.post(base_url).json(&body);
            if let Some(api_key) = api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            let response = req.send().await.map_err(request_error)?;

            if !response.status().is_success() {
                let status = response.status();
                let body = error_body(response).await;
                return Err(FlowError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let text = response.text().await.map_err(request_error)?;
            let content = parse_response(&text)?;
            info!("OpenAI API request completed successfully");
            Ok(content)
        })
    }
}
