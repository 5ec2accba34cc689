pub mod providers;
pub mod retry;

use std::time::Duration;

use betaflow_core::config::{AppConfig, ModelConfig};
use betaflow_core::traits::LlmClient;

pub use providers::anthropic::AnthropicClient;
pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Box<dyn LlmClient> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.provider.as_str() {
        "anthropic" | "claude" => Box::new(AnthropicClient::with_timeout(timeout)),
        // Everything else uses the OpenAI-compatible client
        _ => Box::new(OpenAiClient::with_timeout(timeout)),
    }
}

/// Build the client for the configured model, wrapped for retries and
/// fallbacks when the config asks for either.
pub fn client_from_config(config: &AppConfig) -> Box<dyn LlmClient> {
    let primary = create_client(&config.model);
    if config.model.retry.is_none() && config.fallback_models.is_empty() {
        return primary;
    }

    let fallbacks = config
        .fallback_models
        .iter()
        .map(|fb| (fb.clone(), create_client(fb)))
        .collect();

    Box::new(RetryingClient::new(
        primary,
        fallbacks,
        config.model.retry.clone().unwrap_or_default(),
    ))
}
