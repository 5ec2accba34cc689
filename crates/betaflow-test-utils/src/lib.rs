//! Mocks and fixtures shared by the betaflow test suites.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use betaflow_core::config::ModelConfig;
use betaflow_core::error::{FlowError, Result};
use betaflow_core::traits::{ActionHandler, LlmClient};
use betaflow_core::types::{CompletionRequest, Step};

/// Recorded parameter maps, in invocation order.
pub type Invocations = Arc<Mutex<Vec<Map<String, Value>>>>;

fn prompt_of(parameters: &Map<String, Value>) -> Option<&str> {
    parameters.get("prompt").and_then(|v| v.as_str())
}

// ── Action handlers ─────────────────────────────────────────────

/// Handler that answers from a script.
///
/// Replies registered for a specific prompt win; otherwise replies are handed
/// out from a queue in invocation order. An exhausted queue is an error.
pub struct ScriptedHandler {
    name: String,
    by_prompt: HashMap<String, String>,
    queue: Mutex<VecDeque<String>>,
    invocations: Invocations,
}

impl ScriptedHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            by_prompt: HashMap::new(),
            queue: Mutex::new(VecDeque::new()),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue replies handed out in invocation order.
    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(replies.into_iter().map(Into::into));
        }
        self
    }

    /// Answer `reply` whenever the `prompt` parameter equals `prompt`.
    pub fn with_reply_for(mut self, prompt: impl Into<String>, reply: impl Into<String>) -> Self {
        self.by_prompt.insert(prompt.into(), reply.into());
        self
    }

    /// Handle to the recorded invocations.
    pub fn invocations(&self) -> Invocations {
        self.invocations.clone()
    }
}

impl ActionHandler for ScriptedHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, parameters: Map<String, Value>) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let reply = prompt_of(&parameters)
                .and_then(|p| self.by_prompt.get(p).cloned())
                .or_else(|| self.queue.lock().ok().and_then(|mut q| q.pop_front()));
            if let Ok(mut calls) = self.invocations.lock() {
                calls.push(parameters);
            }
            reply.ok_or_else(|| FlowError::ActionFailed {
                action: self.name.clone(),
                message: "no scripted reply left".into(),
            })
        })
    }
}

/// Handler that returns its `prompt` parameter, or the JSON of all parameters
/// when the prompt is missing or not a string.
pub struct EchoHandler {
    name: String,
}

impl EchoHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ActionHandler for EchoHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, parameters: Map<String, Value>) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            Ok(match prompt_of(&parameters) {
                Some(p) => p.to_string(),
                None => Value::Object(parameters).to_string(),
            })
        })
    }
}

/// Handler that sleeps for its `delay_ms` parameter, then returns its `reply`
/// parameter. Tracks how many invocations were in flight at once.
pub struct DelayedHandler {
    name: String,
    in_flight: AtomicUsize,
    peak: Arc<AtomicUsize>,
}

impl DelayedHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            in_flight: AtomicUsize::new(0),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Highest number of simultaneous invocations observed.
    pub fn peak(&self) -> Arc<AtomicUsize> {
        self.peak.clone()
    }
}

impl ActionHandler for DelayedHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, parameters: Map<String, Value>) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = parameters
                .get("delay_ms")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(parameters
                .get("reply")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string())
        })
    }
}

/// Handler that always fails with the given message.
pub struct FailingHandler {
    name: String,
    message: String,
}

impl FailingHandler {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl ActionHandler for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, _parameters: Map<String, Value>) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            Err(FlowError::ActionFailed {
                action: self.name.clone(),
                message: self.message.clone(),
            })
        })
    }
}

/// Handler that panics when invoked.
pub struct PanickingHandler {
    name: String,
}

impl PanickingHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ActionHandler for PanickingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, _parameters: Map<String, Value>) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move { explode(&self.name) })
    }
}

fn explode(name: &str) -> Result<String> {
    panic!("handler {} exploded", name)
}

// ── LLM client ──────────────────────────────────────────────────

/// LLM client returning queued outcomes, then a fixed fallback text.
pub struct MockLlmClient {
    outcomes: Mutex<VecDeque<Result<String>>>,
    fallback: String,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            fallback: "mock response".to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(self, text: impl Into<String>) -> Self {
        if let Ok(mut q) = self.outcomes.lock() {
            q.push_back(Ok(text.into()));
        }
        self
    }

    pub fn with_error(self, error: FlowError) -> Self {
        if let Ok(mut q) = self.outcomes.lock() {
            q.push_back(Err(error));
        }
        self
    }

    /// Handle to the recorded requests.
    pub fn calls(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        self.calls.clone()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmClient for MockLlmClient {
    fn complete(
        &self,
        _config: &ModelConfig,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(request);
            }
            self.outcomes
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        })
    }
}

// ── Fixtures ────────────────────────────────────────────────────

/// An `llm-call` step with the given prompt.
pub fn llm_step(name: &str, prompt: &str, order: usize) -> Step {
    Step::new(name, "llm-call", order)
        .with_param("prompt", prompt)
        .with_param("model", "gpt-4-turbo")
}

/// Steps for the classic `[Init, P1, P2, Final]` workflow with P1/P2 in group "g".
pub fn init_parallel_final() -> Vec<Step> {
    vec![
        llm_step("Init", "Start", 0),
        llm_step("P1", "What is 2+2?", 1).in_group("g"),
        llm_step("P2", "What is 3+3?", 2).in_group("g"),
        llm_step("Final", "End", 3),
    ]
}
