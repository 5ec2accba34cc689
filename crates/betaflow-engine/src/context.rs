use std::sync::Arc;

use betaflow_core::types::StepResult;

/// Read-only view of the results produced by units that already finished.
///
/// Every member of a unit receives the same snapshot, taken before the unit
/// started. Cloning is cheap; there is no way to add results through a
/// snapshot, only by taking a new one from the coordinator's accumulator.
#[derive(Debug, Clone)]
pub struct PriorResults {
    results: Arc<[StepResult]>,
}

impl PriorResults {
    pub fn new() -> Self {
        Self {
            results: Arc::from(Vec::new()),
        }
    }

    /// Freeze the given results into a snapshot.
    pub fn snapshot(results: &[StepResult]) -> Self {
        Self {
            results: Arc::from(results),
        }
    }

    /// The latest result recorded for `step_name`, if that step already ran.
    pub fn get(&self, step_name: &str) -> Option<&StepResult> {
        self.results.iter().rev().find(|r| r.step_name == step_name)
    }

    /// Read a field of a prior step's result as text.
    pub fn field(&self, step_name: &str, key: &str) -> Option<String> {
        self.get(step_name).and_then(|r| r.field(key))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter()
    }
}

impl Default for PriorResults {
    fn default() -> Self {
        Self::new()
    }
}
