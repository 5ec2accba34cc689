use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identifier of a stored workflow.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub u64);

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a single execution of a workflow.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a condition compares the referenced field against its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Equals,
    NotEquals,
    Contains,
    /// Any type name we do not recognise. Always evaluates to false.
    #[serde(other)]
    Unknown,
}

/// A gate on a step, referencing the result of an earlier step by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub step_name: String,
    #[serde(default = "default_condition_key")]
    pub key: String,
    pub value: String,
}

fn default_condition_key() -> String {
    "result".to_string()
}

impl Condition {
    fn new(kind: ConditionKind, step_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind,
            step_name: step_name.into(),
            key: default_condition_key(),
            value: value.into(),
        }
    }

    pub fn equals(step_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ConditionKind::Equals, step_name, value)
    }

    pub fn not_equals(step_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ConditionKind::NotEquals, step_name, value)
    }

    pub fn contains(step_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ConditionKind::Contains, step_name, value)
    }

    /// Compare against a field other than `result`.
    pub fn on_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

/// One named unit of work inside a workflow.
///
/// `order` is the zero-based position the step was submitted at and is the
/// only ordering key. Steps sharing a `group` run concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "step_name", alias = "name")]
    pub name: String,
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub order: usize,
}

impl Step {
    /// Create a step with no parameters, condition or group.
    pub fn new(name: impl Into<String>, action: impl Into<String>, order: usize) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            parameters: Map::new(),
            condition: None,
            group: None,
            order,
        }
    }

    /// Set a single parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Replace the whole parameter map.
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Gate this step on a condition.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Place this step in a named parallel group.
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Outcome of a single step in a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn success(step_name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            result: result.into(),
            skipped: false,
            error: None,
        }
    }

    pub fn skipped(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            result: String::new(),
            skipped: true,
            error: None,
        }
    }

    pub fn failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            result: String::new(),
            skipped: false,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Read a field by name as text.
    ///
    /// `result` is the field conditions and output references normally use;
    /// the remaining fields are readable the same way. Unknown keys and an
    /// absent `error` yield `None`.
    pub fn field(&self, key: &str) -> Option<String> {
        match key {
            "result" => Some(self.result.clone()),
            "step_name" => Some(self.step_name.clone()),
            "skipped" => Some(self.skipped.to_string()),
            "error" => self.error.clone(),
            _ => None,
        }
    }
}

/// A stored workflow: a name plus its ordered steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub workflow_name: String,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Steps sorted by their `order` field.
    pub fn ordered_steps(&self) -> Vec<Step> {
        let mut steps = self.steps.clone();
        steps.sort_by_key(|s| s.order);
        steps
    }
}

/// Summary of one execution of a workflow.
///
/// `results[i]` always belongs to the i-th step in declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionResult {
    pub workflow_id: WorkflowId,
    pub workflow_name: String,
    pub results: Vec<StepResult>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl WorkflowExecutionResult {
    /// Look up the result of a step by name.
    pub fn result_for(&self, step_name: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step_name == step_name)
    }

    /// Number of steps that ended with an error.
    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }
}

/// How an execution unit runs its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum UnitKind {
    Sequential,
    Parallel { group: String },
}

/// A single text-generation request, as built by the `llm-call` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Provider-specific generation parameters passed through untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_builder() {
        let step = Step::new("Summarize", "llm-call", 2)
            .with_param("prompt", "Summarize this")
            .with_param("temperature", 0.2)
            .with_condition(Condition::contains("Fetch", "ok"))
            .in_group("g1");

        assert_eq!(step.name, "Summarize");
        assert_eq!(step.order, 2);
        assert_eq!(step.parameters["prompt"], json!("Summarize this"));
        assert_eq!(step.group.as_deref(), Some("g1"));
        assert_eq!(step.condition.unwrap().kind, ConditionKind::Contains);
    }

    #[test]
    fn test_condition_defaults_key_to_result() {
        let cond: Condition = serde_json::from_value(json!({
            "type": "equals",
            "step_name": "Init",
            "value": "Started"
        }))
        .unwrap();
        assert_eq!(cond.key, "result");
        assert_eq!(cond.kind, ConditionKind::Equals);
    }

    #[test]
    fn test_unknown_condition_type_parses() {
        let cond: Condition = serde_json::from_value(json!({
            "type": "greater_than",
            "step_name": "Init",
            "value": "3"
        }))
        .unwrap();
        assert_eq!(cond.kind, ConditionKind::Unknown);
    }

    #[test]
    fn test_step_result_fields() {
        let ok = StepResult::success("A", "hello");
        assert_eq!(ok.field("result").as_deref(), Some("hello"));
        assert_eq!(ok.field("skipped").as_deref(), Some("false"));
        assert_eq!(ok.field("error"), None);
        assert_eq!(ok.field("nope"), None);

        let failed = StepResult::failed("B", "boom");
        assert!(failed.is_error());
        assert_eq!(failed.result, "");
        assert_eq!(failed.field("error").as_deref(), Some("boom"));
    }

    #[test]
    fn test_step_result_serialization_omits_empty_error() {
        let json = serde_json::to_value(StepResult::skipped("C")).unwrap();
        assert_eq!(json, json!({"step_name": "C", "result": "", "skipped": true}));
    }

    #[test]
    fn test_unit_kind_serialization() {
        let json = serde_json::to_value(UnitKind::Parallel { group: "g".into() }).unwrap();
        assert_eq!(json, json!({"mode": "parallel", "group": "g"}));
    }
}
