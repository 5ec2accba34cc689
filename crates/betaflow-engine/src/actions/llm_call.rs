use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use betaflow_core::config::ModelConfig;
use betaflow_core::error::{FlowError, Result};
use betaflow_core::traits::{ActionHandler, LlmClient};
use betaflow_core::types::CompletionRequest;

/// Action name steps use to call a text-generation model.
pub const LLM_CALL_ACTION: &str = "llm-call";

/// Typed parameters of an `llm-call` step.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmCallInput {
    pub prompt: String,
    /// Falls back to the configured model when absent.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Any other generation parameters, forwarded to the provider as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LlmCallInput {
    pub fn from_parameters(parameters: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(parameters)).map_err(|e| {
            FlowError::InvalidParameters {
                action: LLM_CALL_ACTION.to_string(),
                message: e.to_string(),
            }
        })
    }

    fn into_request(self, default_model: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.model.unwrap_or_else(|| default_model.to_string()),
            prompt: self.prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            extra: self.extra,
        }
    }
}

/// Sends a step's prompt to the configured text-generation provider.
pub struct LlmCallAction {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
}

impl LlmCallAction {
    pub fn new(llm: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        Self { llm, model }
    }
}

impl ActionHandler for LlmCallAction {
    fn name(&self) -> &str {
        LLM_CALL_ACTION
    }

    fn description(&self) -> &str {
        "Generate text from a prompt with a language model"
    }

    fn invoke(&self, parameters: Map<String, Value>) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let input = LlmCallInput::from_parameters(parameters)?;
            let request = input.into_request(&self.model.model_id);
            debug!(model = %request.model, "Dispatching llm-call");
            self.llm.complete(&self.model, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use betaflow_test_utils::MockLlmClient;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_input_splits_known_and_extra_fields() {
        let input = LlmCallInput::from_parameters(params(json!({
            "prompt": "Tell me a joke",
            "model": "gpt-4o",
            "temperature": 0.7,
            "presence_penalty": 0.5
        })))
        .unwrap();

        assert_eq!(input.prompt, "Tell me a joke");
        assert_eq!(input.model.as_deref(), Some("gpt-4o"));
        assert_eq!(input.temperature, Some(0.7));
        assert_eq!(input.max_tokens, None);
        assert_eq!(input.extra.len(), 1);
        assert_eq!(input.extra["presence_penalty"], json!(0.5));
    }

    #[test]
    fn test_missing_prompt_is_invalid() {
        let err = LlmCallInput::from_parameters(params(json!({"model": "gpt-4o"}))).unwrap_err();
        assert!(matches!(err, FlowError::InvalidParameters { .. }));
    }

    #[test]
    fn test_non_string_prompt_is_invalid() {
        let err = LlmCallInput::from_parameters(params(json!({"prompt": 42}))).unwrap_err();
        assert!(err.to_string().starts_with("Invalid parameters for llm-call"));
    }

    #[tokio::test]
    async fn test_invoke_uses_default_model() {
        let mock = MockLlmClient::new().with_response("Four");
        let calls = mock.calls();
        let action = LlmCallAction::new(Arc::new(mock), ModelConfig::default());

        let out = action
            .invoke(params(json!({"prompt": "What is 2+2?", "max_tokens": 5})))
            .await
            .unwrap();

        assert_eq!(out, "Four");
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].model, "gpt-4-turbo");
        assert_eq!(calls[0].prompt, "What is 2+2?");
        assert_eq!(calls[0].max_tokens, Some(5));
        assert!(calls[0].extra.is_empty());
    }

    #[tokio::test]
    async fn test_invoke_propagates_client_error() {
        let mock = MockLlmClient::new().with_error(FlowError::LlmRequest("HTTP 500: oops".into()));
        let action = LlmCallAction::new(Arc::new(mock), ModelConfig::default());
        let err = action
            .invoke(params(json!({"prompt": "hi"})))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::LlmRequest(_)));
    }
}
