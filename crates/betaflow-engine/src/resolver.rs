use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::PriorResults;

/// Matches a value that is exactly one `{{ ... }}` token.
fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\{\{\s*([^{}]+?)\s*\}\}$").expect("output reference pattern is valid")
    })
}

/// A parsed `{{step_name}}` or `{{step_name.field}}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputReference<'a> {
    /// Everything between the braces, trimmed.
    pub token: &'a str,
}

impl<'a> OutputReference<'a> {
    /// Parse a parameter value that consists of a single reference.
    /// Surrounding whitespace is ignored; any other text disqualifies it.
    pub fn parse(value: &'a str) -> Option<Self> {
        let caps = reference_pattern().captures(value.trim())?;
        caps.get(1).map(|m| Self { token: m.as_str() })
    }

    /// Look the reference up among prior results.
    ///
    /// `step.field` is read first, splitting at the last dot. When that does
    /// not match, the whole token is tried as a step name (reading `result`),
    /// so step names containing dots still resolve.
    pub fn lookup(&self, prior: &PriorResults) -> Option<String> {
        if let Some((step_name, field)) = self.token.rsplit_once('.') {
            if let Some(value) = prior.field(step_name.trim(), field.trim()) {
                return Some(value);
            }
        }
        prior.field(self.token, "result")
    }
}

/// Substitute output references in a step's parameters.
///
/// Only string values that are one complete reference are rewritten.
/// References to steps or fields that have no prior result are left as the
/// original placeholder text. Everything else is copied unchanged.
pub fn resolve_parameters(parameters: &Map<String, Value>, prior: &PriorResults) -> Map<String, Value> {
    parameters
        .iter()
        .map(|(key, value)| (key.clone(), resolve_value(key, value, prior)))
        .collect()
}

fn resolve_value(key: &str, value: &Value, prior: &PriorResults) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    let Some(reference) = OutputReference::parse(text) else {
        return value.clone();
    };

    match reference.lookup(prior) {
        Some(resolved) => Value::String(resolved),
        None => {
            debug!(param = %key, reference = %reference.token, "Output reference left unresolved");
            value.clone()
        }
    }
}
