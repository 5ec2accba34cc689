use thiserror::Error;

use crate::types::WorkflowId;

#[derive(Debug, Error)]
pub enum FlowError {
    // Run errors
    #[error("Workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    // Step errors
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Invalid parameters for {action}: {message}")]
    InvalidParameters { action: String, message: String },

    #[error("Action failed: {action}: {message}")]
    ActionFailed { action: String, message: String },

    #[error("Action handler panicked: {0}")]
    HandlerPanicked(String),

    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    #[error("API key not configured for provider: {0}")]
    MissingApiKey(String),

    // Definition errors
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Workflow store error: {0}")]
    Store(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// Whether this error aborts the whole run rather than a single step.
    pub fn is_run_level(&self) -> bool {
        matches!(self, FlowError::WorkflowNotFound(_) | FlowError::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = FlowError::WorkflowNotFound(WorkflowId(999));
        assert_eq!(err.to_string(), "Workflow 999 not found");
        assert!(err.is_run_level());
    }

    #[test]
    fn test_step_errors_are_not_run_level() {
        let err = FlowError::UnsupportedAction("unknown-action".into());
        assert_eq!(err.to_string(), "Unsupported action: unknown-action");
        assert!(!err.is_run_level());
    }
}
