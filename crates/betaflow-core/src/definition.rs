use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FlowError, Result};
use crate::types::{Condition, Step};

/// A step as submitted, before it is assigned an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    #[serde(alias = "name")]
    pub step_name: String,
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub group: Option<String>,
}

/// A workflow as submitted for creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(alias = "name")]
    pub workflow_name: String,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

impl WorkflowDefinition {
    /// Load a definition from a `.toml` file, or JSON for any other extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(&content).map_err(|e| FlowError::InvalidDefinition(e.to_string()))
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    /// Check the definition and turn its specs into ordered steps.
    ///
    /// Each step's `order` is its zero-based position in `steps`. References
    /// between steps are not checked here.
    pub fn into_steps(self) -> Result<(String, Vec<Step>)> {
        if self.workflow_name.trim().is_empty() {
            return Err(FlowError::InvalidDefinition(
                "workflow_name must not be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        let mut steps = Vec::with_capacity(self.steps.len());

        for (order, spec) in self.steps.into_iter().enumerate() {
            if spec.step_name.trim().is_empty() {
                return Err(FlowError::InvalidDefinition(format!(
                    "step {} has an empty step_name",
                    order
                )));
            }
            if spec.action.trim().is_empty() {
                return Err(FlowError::InvalidDefinition(format!(
                    "step '{}' has an empty action",
                    spec.step_name
                )));
            }
            if !seen.insert(spec.step_name.clone()) {
                return Err(FlowError::InvalidDefinition(format!(
                    "duplicate step_name '{}'",
                    spec.step_name
                )));
            }

            steps.push(Step {
                name: spec.step_name,
                action: spec.action,
                parameters: spec.parameters,
                condition: spec.condition,
                group: spec.group.filter(|g| !g.is_empty()),
                order,
            });
        }

        Ok((self.workflow_name, steps))
    }
}
