use std::io::Write;

use betaflow_core::config::AppConfig;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
provider = "anthropic"
model_id = "claude-sonnet-4-20250514"
api_key = "sk-test-key"
max_tokens = 4096
temperature = 0.5
timeout_secs = 30

[model.retry]
max_retries = 2
initial_backoff_ms = 500

[[fallback_models]]
provider = "openai"
model_id = "gpt-4o-mini"

[[fallback_models]]
provider = "openai"
model_id = "llama3.2"
base_url = "http://localhost:11434/v1/chat/completions"

[engine]
event_capacity = 64

[log]
filter = "betaflow=debug"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "anthropic");
    assert_eq!(config.model.model_id, "claude-sonnet-4-20250514");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, Some(4096));
    assert_eq!(config.model.timeout_secs, 30);

    let retry = config.model.retry.expect("retry present");
    assert_eq!(retry.max_retries, 2);
    assert_eq!(retry.initial_backoff_ms, 500);
    assert_eq!(retry.max_backoff_ms, 30000);

    assert_eq!(config.fallback_models.len(), 2);
    assert_eq!(config.fallback_models[1].model_id, "llama3.2");
    assert!(config.fallback_models[1].base_url.is_some());

    assert_eq!(config.engine.event_capacity, 64);
    assert_eq!(config.log.filter, "betaflow=debug");
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("BETAFLOW_TEST_API_KEY", "expanded-key-value");

    let toml_content = r#"
[model]
model_id = "test-model"
api_key = "${BETAFLOW_TEST_API_KEY}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.model.api_key, Some("expanded-key-value".to_string()));
    assert_eq!(
        config.model.resolved_api_key().as_deref(),
        Some("expanded-key-value")
    );

    std::env::remove_var("BETAFLOW_TEST_API_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[model]
model_id = "llama3.2"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "openai");
    assert_eq!(config.model.model_id, "llama3.2");
    assert!(config.model.api_key.is_none());
    assert!(config.model.max_tokens.is_none());
    assert!(config.model.retry.is_none());
    assert!(config.fallback_models.is_empty());
    assert_eq!(config.engine.event_capacity, 256);
    assert_eq!(config.log.filter, "betaflow=info,warn");
}

#[test]
fn test_missing_config_file() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/betaflow.toml")).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
fn test_malformed_config() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[model\nprovider = ").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(err.to_string().starts_with("Config error"));
}
