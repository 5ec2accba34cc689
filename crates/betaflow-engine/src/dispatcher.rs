use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};

use betaflow_core::config::ModelConfig;
use betaflow_core::error::{FlowError, Result};
use betaflow_core::traits::{ActionHandler, LlmClient};

use crate::actions::llm_call::LlmCallAction;

/// Registry of available actions, keyed by action name.
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its own name, replacing any previous one.
    pub fn register(&mut self, handler: impl ActionHandler) {
        let name = handler.name().to_string();
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Get a handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Names of all registered actions, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Invoke the handler registered for `action`.
    ///
    /// An unknown action is `UnsupportedAction`; a panicking handler is turned
    /// into `HandlerPanicked` instead of unwinding into the scheduler.
    pub async fn dispatch(&self, action: &str, parameters: Map<String, Value>) -> Result<String> {
        let handler = self
            .get(action)
            .ok_or_else(|| FlowError::UnsupportedAction(action.to_string()))?;

        match AssertUnwindSafe(handler.invoke(parameters)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(FlowError::HandlerPanicked(panic_message(panic.as_ref()))),
        }
    }

    /// Create a registry with the built-in `llm-call` action.
    pub fn with_builtins(llm: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        let mut registry = Self::new();
        registry.register(LlmCallAction::new(llm, model));
        registry
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
