use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::coordinator::{AgentCoordinator, TaskCoordinator};
use crate::execution::{ExecutionContext, ExecutionResult};
use crate::executor::AgentExecutor;
use crate::planner::TaskPlanner;
use crate::task::Task;

/// How involved a task looks to the hybrid router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskComplexity {
    Simple,
    MultiStep,
}

/// Heuristic complexity classifier.
///
/// A task counts as multi-step when its description chains work items
/// (connectives, several sentences) or is long enough that one agent pass
/// is unlikely to cover it.
pub fn classify_complexity(task: &Task) -> TaskComplexity {
    let desc = task.description.to_lowercase();

    let connectives = [" and then ", " then ", " after ", " followed by ", "; "];
    if connectives.iter().any(|c| desc.contains(c)) {
        return TaskComplexity::MultiStep;
    }

    let sentences = desc
        .split(['.', '\n'])
        .filter(|s| !s.trim().is_empty())
        .count();
    if sentences > 1 {
        return TaskComplexity::MultiStep;
    }

    if desc.split_whitespace().count() > 30 {
        return TaskComplexity::MultiStep;
    }

    TaskComplexity::Simple
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HybridStats {
    pub sdk_mode: u64,
    pub simple_mode: u64,
    pub total_tasks: u64,
}

/// Routes each task to one of two coordinators by complexity.
///
/// Simple tasks go to the SDK-style coordinator when one is configured; the
/// multi-step remainder goes to the plan-driven coordinator. Without an SDK
/// coordinator everything routes to the plan-driven one. Results are
/// reordered to the caller's task order after both batches complete.
pub struct HybridCoordinator {
    simple: Arc<dyn AgentCoordinator>,
    sdk: Option<Arc<dyn AgentCoordinator>>,
    stats: Mutex<HybridStats>,
}

impl HybridCoordinator {
    pub fn new(
        simple: Arc<dyn AgentCoordinator>,
        sdk: Option<Arc<dyn AgentCoordinator>>,
    ) -> Self {
        match &sdk {
            Some(_) => tracing::info!("hybrid coordinator initialized with SDK support"),
            None => tracing::info!("hybrid coordinator initialized without SDK"),
        }
        Self {
            simple,
            sdk,
            stats: Mutex::new(HybridStats::default()),
        }
    }

    pub fn stats(&self) -> HybridStats {
        *self.stats.lock().expect("hybrid stats lock poisoned")
    }

    async fn coordinate_inner(
        &self,
        tasks: &[Task],
        agents: &[Agent],
        context: Option<&ExecutionContext>,
    ) -> Vec<ExecutionResult> {
        if tasks.is_empty() {
            return Vec::new();
        }
        tracing::info!(tasks = tasks.len(), "hybrid coordinator routing tasks");

        let mut sdk_batch: Vec<(usize, Task)> = Vec::new();
        let mut simple_batch: Vec<(usize, Task)> = Vec::new();

        for (idx, task) in tasks.iter().enumerate() {
            let to_sdk = self.sdk.is_some()
                && classify_complexity(task) == TaskComplexity::Simple;
            if to_sdk {
                sdk_batch.push((idx, task.clone()));
            } else {
                simple_batch.push((idx, task.clone()));
            }
        }

        {
            let mut stats = self.stats.lock().expect("hybrid stats lock poisoned");
            stats.sdk_mode += sdk_batch.len() as u64;
            stats.simple_mode += simple_batch.len() as u64;
            stats.total_tasks += tasks.len() as u64;
        }
        tracing::info!(
            sdk = sdk_batch.len(),
            simple = simple_batch.len(),
            "hybrid routing decided"
        );

        let mut slots: Vec<Option<ExecutionResult>> = vec![None; tasks.len()];

        if let (Some(sdk), false) = (&self.sdk, sdk_batch.is_empty()) {
            let batch: Vec<Task> = sdk_batch.iter().map(|(_, t)| t.clone()).collect();
            let results = sdk.coordinate(&batch, agents, context).await;
            for ((idx, _), result) in sdk_batch.iter().zip(results) {
                slots[*idx] = Some(result);
            }
        }

        if !simple_batch.is_empty() {
            let batch: Vec<Task> = simple_batch.iter().map(|(_, t)| t.clone()).collect();
            let results = self.simple.coordinate(&batch, agents, context).await;
            for ((idx, _), result) in simple_batch.iter().zip(results) {
                slots[*idx] = Some(result);
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    crate::coordinator::failure_result(
                        "Not executed",
                        "ExecutionError",
                        "HybridCoordinator",
                    )
                })
            })
            .collect()
    }
}

impl AgentCoordinator for HybridCoordinator {
    fn coordinate<'a>(
        &'a self,
        tasks: &'a [Task],
        agents: &'a [Agent],
        context: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, Vec<ExecutionResult>> {
        Box::pin(self.coordinate_inner(tasks, agents, context))
    }
}

/// Coordinator wiring modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestrationMode {
    Simple,
    Hybrid,
}

/// Builds coordinators from their parts.
pub struct OrchestrationFactory;

impl OrchestrationFactory {
    /// Build a coordinator for the requested mode.
    ///
    /// `sdk` is an optional framework-based coordinator satisfying the same
    /// contract; hybrid mode degrades to simple routing when it is absent.
    pub fn create_orchestrator(
        mode: OrchestrationMode,
        planner: Arc<dyn TaskPlanner>,
        executor: Arc<dyn AgentExecutor>,
        sdk: Option<Arc<dyn AgentCoordinator>>,
    ) -> Arc<dyn AgentCoordinator> {
        tracing::info!(mode = ?mode, "creating orchestrator");
        match mode {
            OrchestrationMode::Simple => Arc::new(TaskCoordinator::new(planner, executor)),
            OrchestrationMode::Hybrid => {
                let simple: Arc<dyn AgentCoordinator> =
                    Arc::new(TaskCoordinator::new(planner, executor));
                Arc::new(HybridCoordinator::new(simple, sdk))
            }
        }
    }
}
