use std::io::Write;
use std::sync::Arc;

use betaflow_core::config::ModelConfig;
use betaflow_core::definition::WorkflowDefinition;
use betaflow_core::traits::WorkflowStore;
use betaflow_core::types::ConditionKind;
use betaflow_engine::{partition, ActionRegistry, InMemoryWorkflowStore, WorkflowExecutor};
use betaflow_test_utils::MockLlmClient;

const RESEARCH_TOML: &str = r#"
workflow_name = "research"

[[steps]]
step_name = "Outline"
action = "llm-call"
parameters = { prompt = "Outline a post about Rust", model = "gpt-4o-mini" }

[[steps]]
step_name = "Intro"
action = "llm-call"
group = "draft"
parameters = { prompt = "{{Outline.result}}" }

[[steps]]
step_name = "Body"
action = "llm-call"
group = "draft"
parameters = { prompt = "{{Outline}}", temperature = 0.3 }

[[steps]]
step_name = "Review"
action = "llm-call"
parameters = { prompt = "Review it" }
condition = { type = "contains", step_name = "Outline", value = "Rust" }
"#;

fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    tmp.write_all(content.as_bytes()).expect("write definition");
    tmp
}

#[test]
fn test_load_toml_definition() {
    let tmp = write_temp(".toml", RESEARCH_TOML);
    let definition = WorkflowDefinition::load(tmp.path()).expect("load definition");
    let (name, steps) = definition.into_steps().expect("valid definition");

    assert_eq!(name, "research");
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[2].order, 2);
    assert_eq!(steps[2].group.as_deref(), Some("draft"));
    assert_eq!(
        steps[3].condition.as_ref().map(|c| c.kind),
        Some(ConditionKind::Contains)
    );

    let units = partition(&steps);
    assert_eq!(units.len(), 3);
    assert_eq!(units[1].len(), 2);
}

#[test]
fn test_load_json_definition_with_aliases() {
    let json = r#"{
        "name": "short",
        "steps": [
            {"name": "Only", "action": "llm-call", "parameters": {"prompt": "hi"}}
        ]
    }"#;
    let tmp = write_temp(".json", json);
    let definition = WorkflowDefinition::load(tmp.path()).expect("load definition");
    assert_eq!(definition.workflow_name, "short");
    assert_eq!(definition.steps[0].step_name, "Only");
}

#[tokio::test]
async fn test_run_definition_file_end_to_end() {
    let tmp = write_temp(".toml", RESEARCH_TOML);
    let definition = WorkflowDefinition::load(tmp.path()).expect("load definition");

    let mock = MockLlmClient::new().with_response("Rust ownership outline");
    let calls = mock.calls();
    let registry = ActionRegistry::with_builtins(Arc::new(mock), ModelConfig::default());
    let store = Arc::new(InMemoryWorkflowStore::new());
    let workflow = store.create(definition).await.expect("create workflow");
    let executor = WorkflowExecutor::new(store, Arc::new(registry));

    let run = executor.execute(workflow.id).await.expect("run workflow");

    let names: Vec<&str> = run.results.iter().map(|r| r.step_name.as_str()).collect();
    assert_eq!(names, vec!["Outline", "Intro", "Body", "Review"]);
    assert_eq!(run.results[0].result, "Rust ownership outline");
    assert!(!run.results[3].skipped);
    assert_eq!(run.error_count(), 0);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0].model, "gpt-4o-mini");
    // Both group members saw the outline; only the unnamed model falls back.
    let group_prompts: Vec<&str> = calls[1..3].iter().map(|c| c.prompt.as_str()).collect();
    assert!(group_prompts.iter().all(|p| *p == "Rust ownership outline"));
    assert!(calls[1..3].iter().all(|c| c.model == "gpt-4-turbo"));

    let json = serde_json::to_value(&run).expect("serialize result");
    assert_eq!(json["workflow_name"], "research");
    assert_eq!(json["results"].as_array().map(|a| a.len()), Some(4));
}
