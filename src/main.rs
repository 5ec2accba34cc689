use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use betaflow_core::config::AppConfig;
use betaflow_core::definition::WorkflowDefinition;
use betaflow_core::event::{EventBus, RunEvent};
use betaflow_core::traits::WorkflowStore;
use betaflow_core::types::{Step, UnitKind};

use betaflow_engine::{
    partition, ActionRegistry, InMemoryWorkflowStore, WorkflowExecutor, LLM_CALL_ACTION,
};

#[derive(Parser)]
#[command(name = "betaflow", version, about = "Run multi-step LLM workflows with parallel groups")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "betaflow.toml", env = "BETAFLOW_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow definition and print its results as JSON
    Run {
        /// Workflow definition (.toml or .json)
        file: PathBuf,
        /// Print step progress to stderr while running
        #[arg(long)]
        progress: bool,
        /// Print single-line JSON
        #[arg(long)]
        compact: bool,
    },
    /// Send a single prompt to the configured model and print the reply
    Prompt {
        /// Prompt text (read from stdin when omitted)
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
        /// Model to use instead of the configured one
        #[arg(long)]
        model: Option<String>,
        #[arg(long, default_value_t = 0.7)]
        temperature: f32,
        #[arg(long, default_value_t = 1000)]
        max_tokens: u32,
    },
    /// Show a workflow's steps and the units they run in
    Show {
        /// Workflow definition (.toml or .json)
        file: PathBuf,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "betaflow", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            file,
            progress,
            compact,
        } => run_workflow(&config, &file, progress, compact).await?,
        Commands::Prompt {
            text,
            model,
            temperature,
            max_tokens,
        } => {
            let mut text = text.join(" ");
            if text.is_empty() {
                io::stdin().read_to_string(&mut text)?;
            }
            let parameters = prompt_parameters(text.trim(), model, temperature, max_tokens);
            run_prompt(&build_registry(&config), parameters).await?;
        }
        Commands::Show { file } => show_workflow(&file)?,
        Commands::Config => {
            let mut shown = config.clone();
            shown.model = shown.model.redacted();
            shown.fallback_models = shown.fallback_models.iter().map(|m| m.redacted()).collect();
            println!("{}", toml::to_string_pretty(&shown)?);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Load the config file, or fall back to defaults (keys from the environment).
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        Ok(AppConfig::load(path)?)
    } else {
        eprintln!(
            "Warning: No config file found at {}. Using defaults; set OPENAI_API_KEY or ANTHROPIC_API_KEY.",
            path.display()
        );
        Ok(AppConfig::default())
    }
}

async fn run_workflow(
    config: &AppConfig,
    file: &Path,
    progress: bool,
    compact: bool,
) -> anyhow::Result<()> {
    let definition = WorkflowDefinition::load(file)?;
    let registry = build_registry(config);

    let store = Arc::new(InMemoryWorkflowStore::new());
    let workflow = store.create(definition).await?;

    let events = Arc::new(EventBus::new(config.engine.event_capacity));
    let printer = progress.then(|| spawn_progress_printer(&events));

    let executor = WorkflowExecutor::new(store, Arc::new(registry)).with_events(events);
    let result = executor.execute(workflow.id).await?;

    if let Some(handle) = printer {
        handle.await.ok();
    }

    let errors = result.error_count();
    if errors > 0 {
        warn!(errors, "Some steps failed");
    }

    let json = if compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{}", json);
    Ok(())
}

/// Registry with the built-in actions, backed by the configured model.
fn build_registry(config: &AppConfig) -> ActionRegistry {
    let llm: Arc<dyn betaflow_core::traits::LlmClient> =
        Arc::from(betaflow_llm::client_from_config(config));
    let registry = ActionRegistry::with_builtins(llm, config.model.clone());
    info!(actions = ?registry.list(), "Action registry ready");
    registry
}

/// Parameters of a one-off `llm-call`; without `model` the configured one is used.
fn prompt_parameters(
    text: &str,
    model: Option<String>,
    temperature: f32,
    max_tokens: u32,
) -> Map<String, Value> {
    let mut parameters = Map::new();
    parameters.insert("prompt".into(), json!(text));
    if let Some(model) = model {
        parameters.insert("model".into(), json!(model));
    }
    parameters.insert("temperature".into(), json!(temperature));
    parameters.insert("max_tokens".into(), json!(max_tokens));
    parameters
}

async fn prompt_reply(
    registry: &ActionRegistry,
    parameters: Map<String, Value>,
) -> anyhow::Result<Value> {
    let result = registry.dispatch(LLM_CALL_ACTION, parameters).await?;
    Ok(json!({ "result": result }))
}

async fn run_prompt(
    registry: &ActionRegistry,
    parameters: Map<String, Value>,
) -> anyhow::Result<()> {
    let reply = prompt_reply(registry, parameters).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

fn spawn_progress_printer(events: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(RunEvent::RunStarted {
                    workflow_name,
                    total_steps,
                    ..
                }) => {
                    eprintln!("[run] {} ({} steps)", workflow_name, total_steps);
                }
                Ok(RunEvent::UnitStarted { unit, size, .. }) => {
                    if let UnitKind::Parallel { group } = unit {
                        eprintln!("[group: {}] {} steps in parallel", group, size);
                    }
                }
                Ok(RunEvent::StepStarted { step_name, .. }) => {
                    eprintln!("[step: {}]", step_name);
                }
                Ok(RunEvent::StepFinished { result, .. }) => {
                    if let Some(ref error) = result.error {
                        eprintln!("[{}: ERROR] {}", result.step_name, truncate(error, 200));
                    } else if result.skipped {
                        eprintln!("[{}: skipped]", result.step_name);
                    } else {
                        eprintln!("[{}: ok] {}", result.step_name, truncate(&result.result, 200));
                    }
                }
                Ok(RunEvent::RunComplete { elapsed_ms, .. }) => {
                    eprintln!("[done] {}ms", elapsed_ms);
                    break;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    eprintln!("[progress: {} events dropped]", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn show_workflow(file: &Path) -> anyhow::Result<()> {
    let definition = WorkflowDefinition::load(file)?;
    let (name, steps) = definition.into_steps()?;

    println!("Workflow: {}", name);
    println!();
    for step in &steps {
        println!("  {}", describe_step(step));
    }

    println!();
    println!("Execution units:");
    for (i, unit) in partition(&steps).iter().enumerate() {
        let names: Vec<&str> = unit.steps().iter().map(|s| s.name.as_str()).collect();
        match unit.kind() {
            UnitKind::Sequential => println!("  {}. {}", i + 1, names.join(", ")),
            UnitKind::Parallel { group } => {
                println!("  {}. [{}] {}", i + 1, group, names.join(" | "))
            }
        }
    }
    Ok(())
}

fn describe_step(step: &Step) -> String {
    let mut line = format!("{:>3}  {}  ({})", step.order, step.name, step.action);
    if let Some(ref group) = step.group {
        line.push_str(&format!("  group={}", group));
    }
    if let Some(ref cond) = step.condition {
        line.push_str(&format!(
            "  if {}.{} {:?} {:?}",
            cond.step_name, cond.key, cond.kind, cond.value
        ));
    }
    line
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_describe_step() {
        let step = Step::new("P1", "llm-call", 1)
            .in_group("g")
            .with_condition(betaflow_core::types::Condition::equals("Init", "Started"));
        let line = describe_step(&step);
        assert!(line.contains("P1"));
        assert!(line.contains("group=g"));
        assert!(line.contains("if Init.result Equals \"Started\""));
    }

    #[test]
    fn test_cli_parses_prompt_with_defaults() {
        let cli = Cli::try_parse_from(["betaflow", "prompt", "What", "is", "2+2?"]).unwrap();
        match cli.command {
            Commands::Prompt {
                text,
                model,
                temperature,
                max_tokens,
            } => {
                assert_eq!(text.join(" "), "What is 2+2?");
                assert!(model.is_none());
                assert_eq!(temperature, 0.7);
                assert_eq!(max_tokens, 1000);
            }
            _ => panic!("expected prompt"),
        }
    }

    #[test]
    fn test_prompt_parameters() {
        let params = prompt_parameters("hi", Some("gpt-4o".into()), 0.2, 50);
        assert_eq!(params["prompt"], json!("hi"));
        assert_eq!(params["model"], json!("gpt-4o"));
        assert_eq!(params["max_tokens"], json!(50));

        let params = prompt_parameters("hi", None, 0.7, 1000);
        assert!(!params.contains_key("model"));
    }

    #[tokio::test]
    async fn test_prompt_goes_through_llm_call() {
        let mock = betaflow_test_utils::MockLlmClient::new().with_response("4");
        let calls = mock.calls();
        let registry = ActionRegistry::with_builtins(Arc::new(mock), Default::default());

        let reply = prompt_reply(&registry, prompt_parameters("What is 2+2?", None, 0.7, 1000))
            .await
            .unwrap();

        assert_eq!(reply, json!({"result": "4"}));
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].model, "gpt-4-turbo");
        assert_eq!(calls[0].temperature, Some(0.7));
        assert_eq!(calls[0].max_tokens, Some(1000));
    }

    #[tokio::test]
    async fn test_prompt_surfaces_llm_errors() {
        let mock = betaflow_test_utils::MockLlmClient::new()
            .with_error(betaflow_core::error::FlowError::MissingApiKey("openai".into()));
        let registry = ActionRegistry::with_builtins(Arc::new(mock), Default::default());

        let err = prompt_reply(&registry, prompt_parameters("hi", None, 0.7, 1000))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key not configured"));
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from(["betaflow", "run", "flow.toml", "--progress"]).unwrap();
        match cli.command {
            Commands::Run { file, progress, compact } => {
                assert_eq!(file, PathBuf::from("flow.toml"));
                assert!(progress);
                assert!(!compact);
            }
            _ => panic!("expected run"),
        }
    }
}
