//! Thin command line adapter over the orchestration runtime.
//!
//! Two entry points: `run-dsl <file.ct>` validates and executes a workflow
//! file, and `--task <desc>` (repeatable) coordinates ad-hoc tasks against
//! the default agent roster. Exit code 0 means every task succeeded.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use maestro::agent_selector::CapabilitySelector;
use maestro::coordinator::{AgentCoordinator, TaskCoordinator};
use maestro::dsl::interpreter::CoordinatorTaskExecutor;
use maestro::dsl::run_workflow;
use maestro::executor::LlmAgentExecutor;
use maestro::model_selector::{ModelCapabilities, ModelSelector};
use maestro::orchestrator::ModelOrchestrator;
use maestro::planner::LlmTaskPlanner;
use maestro::provider::{LlmConfig, MockProvider, ProviderRegistry, TextGenerator};
use maestro::roster;
use maestro::task::Task;

#[derive(Parser)]
#[command(name = "maestro", version, about = "Multi-agent task orchestration")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Task description to execute; repeat for a batch.
    #[arg(long = "task")]
    tasks: Vec<String>,

    /// Provider backend: mock, grok, tongyi, tongyi-local, replicate,
    /// qwen3_zerogpu, or auto for orchestrated selection.
    #[arg(long, default_value = "auto")]
    provider: String,

    /// Extra provider configuration as a JSON object
    /// (e.g. '{"temperature": 0.2, "max_tokens": 512}').
    #[arg(long)]
    config: Option<String>,

    /// Wall-clock budget for the whole run, in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long, global = true)]
    verbose: bool,

    /// Accepted for compatibility; frontier execution is already parallel.
    #[arg(long)]
    parallel: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and execute a workflow (.ct) file.
    RunDsl {
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolve the provider flag to a text generator.
///
/// Only the mock provider ships in-process; network backends are created
/// through registered adapters, so naming one without its adapter is an
/// error rather than a silent fallback.
fn build_provider(
    name: &str,
    config: Option<&serde_json::Value>,
) -> Result<Arc<dyn TextGenerator>, String> {
    let mock_response = config
        .and_then(|c| c.get("response"))
        .and_then(|v| v.as_str())
        .unwrap_or("Mock response")
        .to_owned();

    match name {
        "mock" => Ok(Arc::new(MockProvider::new(mock_response))),
        "auto" => {
            let mut registry = ProviderRegistry::new();
            let response = mock_response.clone();
            registry.register("mock", move || {
                Ok(Arc::new(MockProvider::new(response.clone())))
            });

            let mut selector = ModelSelector::new();
            selector.register_model(
                "mock",
                ModelCapabilities {
                    name: "Mock".to_owned(),
                    success_rate: 1.0,
                    avg_latency_s: 0.1,
                    cost_per_month_usd: 0.0,
                    requires_internet: false,
                    max_tokens: 4096,
                    supports_tools: false,
                },
            );

            Ok(Arc::new(
                ModelOrchestrator::with_providers(registry, vec!["mock".to_owned()])
                    .with_selector(selector),
            ))
        }
        other => Err(format!(
            "provider '{other}' requires an external adapter; register one or use mock/auto"
        )),
    }
}

fn llm_config(config: Option<&serde_json::Value>) -> LlmConfig {
    let mut llm = LlmConfig::default();
    if let Some(config) = config {
        if let Some(temperature) = config.get("temperature").and_then(|v| v.as_f64()) {
            llm.temperature = temperature;
        }
        if let Some(max_tokens) = config.get("max_tokens").and_then(|v| v.as_u64()) {
            llm.max_tokens = max_tokens;
        }
    }
    llm
}

fn build_coordinator(
    provider: Arc<dyn TextGenerator>,
    config: LlmConfig,
    timeout: Option<u64>,
) -> TaskCoordinator {
    let planner = LlmTaskPlanner::new(Arc::clone(&provider), Arc::new(CapabilitySelector));
    let executor = LlmAgentExecutor::new(provider).with_config(config);
    let mut coordinator = TaskCoordinator::new(Arc::new(planner), Arc::new(executor));
    if let Some(seconds) = timeout {
        coordinator = coordinator.with_run_timeout(Duration::from_secs(seconds));
    }
    coordinator
}

async fn run_dsl_file(cli: &Cli, file: &std::path::Path) -> ExitCode {
    let source = match tokio::fs::read_to_string(file).await {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", file.display());
            return ExitCode::FAILURE;
        }
    };

    let config = parse_config(cli);
    let provider = match build_provider(&cli.provider, config.as_ref()) {
        Ok(provider) => provider,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::FAILURE;
        }
    };

    let coordinator = Arc::new(build_coordinator(
        provider,
        llm_config(config.as_ref()),
        cli.timeout,
    ));
    let executor = Arc::new(CoordinatorTaskExecutor::new(
        coordinator,
        roster::default_agents(),
    ));

    match run_workflow(&source, executor, false).await {
        Ok(run) => {
            if cli.verbose {
                for warning in &run.warnings {
                    eprintln!("warning: {warning}");
                }
            }
            println!("{:?}", run.output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_tasks(cli: &Cli) -> ExitCode {
    let config = parse_config(cli);
    let provider = match build_provider(&cli.provider, config.as_ref()) {
        Ok(provider) => provider,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::FAILURE;
        }
    };

    let coordinator = build_coordinator(provider, llm_config(config.as_ref()), cli.timeout);
    let tasks: Vec<Task> = cli
        .tasks
        .iter()
        .enumerate()
        .map(|(i, desc)| Task::new(desc.clone()).with_id(format!("task_{}", i + 1)))
        .collect();

    let agents = roster::default_agents();
    let results = coordinator.coordinate(&tasks, &agents, None).await;

    let mut failed = false;
    for (task, result) in tasks.iter().zip(&results) {
        let id = task.task_id.as_deref().unwrap_or("?");
        if result.is_success() {
            let output = result
                .output
                .as_ref()
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default();
            println!("[{id}] ok\n{output}\n");
        } else {
            failed = true;
            let message = result.errors.first().map(String::as_str).unwrap_or("unknown");
            eprintln!("[{id}] FAILED: {message}");
            if cli.verbose {
                if let Some(details) = &result.error_details {
                    eprintln!("  cause: {}", details.root_cause);
                    if let Some(suggestion) = &details.suggestion {
                        eprintln!("  suggestion: {suggestion}");
                    }
                }
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn parse_config(cli: &Cli) -> Option<serde_json::Value> {
    let raw = cli.config.as_ref()?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            eprintln!("warning: ignoring malformed --config JSON: {e}");
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.parallel {
        tracing::debug!("--parallel accepted; frontier execution is already parallel");
    }

    match &cli.command {
        Some(Command::RunDsl { file }) => {
            let file = file.clone();
            run_dsl_file(&cli, &file).await
        }
        None if !cli.tasks.is_empty() => run_tasks(&cli).await,
        None => {
            eprintln!("error: provide --task <description> or the run-dsl subcommand");
            ExitCode::FAILURE
        }
    }
}
