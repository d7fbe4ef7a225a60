//! A runtime for orchestrating batches of tasks across role-specialised agents.
//!
//! Maestro accepts a batch of natural-language tasks, plans an execution
//! order across a set of agents, and drives those agents concurrently
//! through a pluggable LLM backend, producing one result per task. On top
//! of the runtime, a small workflow DSL expresses pipelines as categorical
//! compositions (sequential `∘` and parallel `×`) over named tasks, type
//! checked before anything executes.
//!
//! # A Tour of Maestro
//!
//! ## Tasks and Agents
//!
//! The [`task`] and [`agent`] modules hold the core entities:
//!
//! * [`Task`] — a unit of work with optional id, priority, and dependencies,
//!   validated by [`TaskValidator`] before execution.
//! * [`Agent`] — a role plus capability keywords, fuzzily matched against
//!   task descriptions.
//! * [`AgentTeam`] — a domain grouping of agents with its own internal
//!   routing rules; [`roster`] ships ready-made agent and team sets.
//!
//! [`Task`]: crate::task::Task
//! [`TaskValidator`]: crate::task::TaskValidator
//! [`Agent`]: crate::agent::Agent
//! [`AgentTeam`]: crate::agent::AgentTeam
//!
//! ## Planning and Coordination
//!
//! [`planner::LlmTaskPlanner`] asks the configured provider for a plan and
//! falls back to tier-aware topological layering when the reply is missing
//! or malformed. [`coordinator::TaskCoordinator`] executes the plan
//! frontier by frontier with retries and exponential backoff, returning
//! results in the caller's task order:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use maestro::agent_selector::CapabilitySelector;
//! use maestro::coordinator::{AgentCoordinator, TaskCoordinator};
//! use maestro::executor::LlmAgentExecutor;
//! use maestro::planner::LlmTaskPlanner;
//! use maestro::provider::{MockProvider, TextGenerator};
//! use maestro::roster;
//! use maestro::task::Task;
//!
//! # async fn run() {
//! let provider: Arc<dyn TextGenerator> = Arc::new(MockProvider::default());
//! let planner = LlmTaskPlanner::new(Arc::clone(&provider), Arc::new(CapabilitySelector));
//! let executor = LlmAgentExecutor::new(provider);
//! let coordinator = TaskCoordinator::new(Arc::new(planner), Arc::new(executor));
//!
//! let tasks = [Task::new("write code for authentication")];
//! let results = coordinator.coordinate(&tasks, &roster::default_agents(), None).await;
//! assert!(results[0].is_success());
//! # }
//! ```
//!
//! ## Providers
//!
//! [`provider::TextGenerator`] is the single contract every LLM backend
//! implements. [`orchestrator::ModelOrchestrator`] implements it too,
//! layering criteria-scored selection (speed, quality, cost, privacy,
//! balanced) and a fallback chain over a [`provider::ProviderRegistry`] of
//! backend creators.
//!
//! ## Workflow DSL
//!
//! The [`dsl`] module parses `.ct` programs such as
//!
//! ```text
//! get_files :: () -> FileList
//! analyse_style :: FileList -> StyleReport
//! analyse_security :: FileList -> SecurityReport
//! (analyse_style × analyse_security) ∘ duplicate ∘ get_files
//! ```
//!
//! type checks them with Robinson unification, and interprets them
//! asynchronously: compositions run right to left, products run both sides
//! concurrently, and `duplicate` broadcasts one value into a pair.
//! [`dsl::run_workflow`] bundles parse, validate, and execute.
//!
//! ## Observability
//!
//! [`metrics::MetricsCollector`] records routing, model selection, and team
//! utilisation, persisting one JSON document per session.
//! [`collector::DataCollector`] captures agent interactions as JSONL for
//! the training pipeline.

pub mod agent;
pub mod agent_selector;
pub mod collector;
pub mod coordinator;
pub mod dsl;
pub mod execution;
pub mod executor;
pub mod hybrid;
pub mod metrics;
pub mod model_selector;
pub mod orchestrator;
pub mod persistence;
pub mod planner;
pub mod provider;
pub mod roster;
pub mod task;
pub mod team_router;

pub use agent::{Agent, AgentTeam};
pub use coordinator::{AgentCoordinator, TaskCoordinator};
pub use execution::{ExecutionContext, ExecutionResult, ExecutionStatus};
pub use orchestrator::ModelOrchestrator;
pub use planner::ExecutionPlan;
pub use task::Task;
