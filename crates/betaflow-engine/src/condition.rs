use tracing::debug;

use betaflow_core::types::{Condition, ConditionKind};

use crate::context::PriorResults;

/// Decide whether a step gated by `condition` should run.
///
/// - no condition: always runs
/// - referenced step has no result yet (or the field is absent): skipped
/// - `equals` / `not_equals`: exact string comparison
/// - `contains`: `value` is a substring of the field
/// - unknown condition type: skipped
pub fn evaluate_condition(condition: Option<&Condition>, prior: &PriorResults) -> bool {
    let Some(condition) = condition else {
        return true;
    };

    let Some(actual) = prior.field(&condition.step_name, &condition.key) else {
        debug!(
            step = %condition.step_name,
            key = %condition.key,
            "Condition references a step or field with no result"
        );
        return false;
    };

    compare(condition.kind, &actual, &condition.value)
}

fn compare(kind: ConditionKind, actual: &str, expected: &str) -> bool {
    match kind {
        ConditionKind::Equals => actual == expected,
        ConditionKind::NotEquals => actual != expected,
        ConditionKind::Contains => actual.contains(expected),
        ConditionKind::Unknown => false,
    }
}
