use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::config::ModelConfig;
use crate::definition::WorkflowDefinition;
use crate::error::Result;
use crate::types::{CompletionRequest, Workflow, WorkflowId};

/// The pluggable work a step performs.
pub trait ActionHandler: Send + Sync + 'static {
    /// Action name steps refer to (e.g. "llm-call").
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Run the action with already-resolved parameters and return its text output.
    fn invoke(&self, parameters: Map<String, Value>) -> BoxFuture<'_, Result<String>>;
}

/// Single-shot text generation.
pub trait LlmClient: Send + Sync + 'static {
    /// Send one prompt and return the generated text.
    fn complete(
        &self,
        config: &ModelConfig,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<String>>;
}

/// Where workflow definitions live between runs.
pub trait WorkflowStore: Send + Sync + 'static {
    /// Persist a new workflow, assigning its id and step orders.
    fn create(&self, definition: WorkflowDefinition) -> BoxFuture<'_, Result<Workflow>>;

    /// Load a workflow with its steps.
    fn get(&self, id: WorkflowId) -> BoxFuture<'_, Result<Option<Workflow>>>;

    /// List workflows by ascending id.
    fn list(&self, skip: usize, limit: usize) -> BoxFuture<'_, Result<Vec<Workflow>>>;
}
