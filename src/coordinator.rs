use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::json;

use crate::agent::Agent;
use crate::execution::{ErrorDetails, ExecutionContext, ExecutionResult};
use crate::executor::AgentExecutor;
use crate::planner::{ExecutionPlan, TaskPlanner};
use crate::task::{Task, TaskValidator, ValidationError};

/// Drives a batch of tasks to completion and returns one result per task.
///
/// `coordinate` never fails for per-task reasons: every task yields an
/// [`ExecutionResult`], and result *i* corresponds to task *i* in the
/// caller's order regardless of internal parallelism.
pub trait AgentCoordinator: Send + Sync {
    fn coordinate<'a>(
        &'a self,
        tasks: &'a [Task],
        agents: &'a [Agent],
        context: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, Vec<ExecutionResult>>;
}

/// Plan-driven coordinator: validates, plans, executes frontier by frontier
/// with retries and exponential backoff, then restores caller order.
pub struct TaskCoordinator {
    planner: Arc<dyn TaskPlanner>,
    executor: Arc<dyn AgentExecutor>,
    max_retries: u32,
    run_timeout: Option<Duration>,
}

impl TaskCoordinator {
    pub fn new(planner: Arc<dyn TaskPlanner>, executor: Arc<dyn AgentExecutor>) -> Self {
        Self {
            planner,
            executor,
            max_retries: 3,
            run_timeout: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Wall-clock budget for one `coordinate` call. Retries that would
    /// overshoot the remaining budget are abandoned; a frontier that
    /// overruns it is cancelled.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Convenience wrapper for a single task.
    ///
    /// Builds the default agent roster internally, so callers that need a
    /// specific agent set must use `coordinate` directly.
    pub async fn coordinate_task(
        &self,
        task: &Task,
        context: Option<&ExecutionContext>,
    ) -> ExecutionResult {
        if let Err(validation_error) = TaskValidator::validate(task) {
            tracing::warn!("task validation failed: {}", validation_error.message);
            return validation_failure(task, &validation_error);
        }

        let agents = crate::roster::default_agents();
        let mut results = self
            .coordinate(std::slice::from_ref(task), &agents, context)
            .await;

        if results.is_empty() {
            return failure_result(
                "Coordination returned empty results",
                "ExecutionError",
                "TaskCoordinator",
            );
        }
        results.remove(0)
    }

    async fn coordinate_inner(
        &self,
        tasks: &[Task],
        agents: &[Agent],
        context: Option<&ExecutionContext>,
    ) -> Vec<ExecutionResult> {
        tracing::info!(tasks = tasks.len(), "coordinating tasks");
        tracing::debug!(agents = ?agents.iter().map(|a| &a.role).collect::<Vec<_>>(), "available agents");

        let deadline = self
            .run_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);

        // Invalid tasks fail up front and are excluded from planning.
        let mut upfront: HashMap<usize, ExecutionResult> = HashMap::new();
        let mut valid_tasks: Vec<Task> = Vec::new();
        for (i, task) in tasks.iter().enumerate() {
            match TaskValidator::validate(task) {
                Ok(()) => valid_tasks.push(task.clone()),
                Err(validation_error) => {
                    tracing::warn!(index = i, "task rejected: {}", validation_error.message);
                    upfront.insert(i, validation_failure(task, &validation_error));
                }
            }
        }
        let plan = self.planner.create_plan(&valid_tasks, agents, context).await;
        tracing::debug!(assignments = plan.task_assignments.len(), "plan created");

        let results = self
            .execute_plan(&plan, &valid_tasks, agents, context, deadline)
            .await;

        // Restore caller order, merging the up-front failures back in.
        let timed_out = deadline.is_some_and(|d| tokio::time::Instant::now() >= d);
        let mut ordered = Vec::with_capacity(tasks.len());
        let mut valid_iter = valid_tasks.iter().enumerate();
        for i in 0..tasks.len() {
            if let Some(result) = upfront.remove(&i) {
                ordered.push(result);
                continue;
            }
            let (valid_index, task) = valid_iter.next().expect("valid task accounting is off");
            let task_id = task.effective_id(valid_index);
            let result = results.remove(&task_id).map(|(_, r)| r).unwrap_or_else(|| {
                if timed_out {
                    failure_result(
                        &format!("Run timeout exceeded before task {task_id} completed"),
                        "TimeoutError",
                        "TaskCoordinator",
                    )
                } else {
                    failure_result("Not executed", "ExecutionError", "TaskCoordinator")
                }
            });
            ordered.push(result);
        }

        tracing::info!(results = ordered.len(), "coordination complete");
        ordered
    }

    async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        tasks: &[Task],
        agents: &[Agent],
        context: Option<&ExecutionContext>,
        deadline: Option<tokio::time::Instant>,
    ) -> DashMap<String, ExecutionResult> {
        let task_map: HashMap<String, &Task> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.effective_id(i), t))
            .collect();
        let agent_map: HashMap<&str, &Agent> =
            agents.iter().map(|a| (a.role.as_str(), a)).collect();

        let results: DashMap<String, ExecutionResult> = DashMap::new();

        // Frontiers run sequentially; tasks inside one frontier run
        // concurrently and are joined before the next frontier starts.
        for group in &plan.parallel_groups {
            let group_futures = group.iter().map(|task_id| {
                let results = &results;
                let task_map = &task_map;
                let agent_map = &agent_map;
                async move {
                    let result = self
                        .run_task(task_id, plan, task_map, agent_map, context, deadline)
                        .await;
                    results.insert(task_id.clone(), result);
                }
            });

            let join = futures::future::join_all(group_futures);
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, join).await.is_err() {
                        tracing::error!("run timeout expired, cancelling outstanding tasks");
                        return results;
                    }
                }
                None => {
                    join.await;
                }
            }
        }

        results
    }

    async fn run_task(
        &self,
        task_id: &str,
        plan: &ExecutionPlan,
        task_map: &HashMap<String, &Task>,
        agent_map: &HashMap<&str, &Agent>,
        context: Option<&ExecutionContext>,
        deadline: Option<tokio::time::Instant>,
    ) -> ExecutionResult {
        let Some(task) = task_map.get(task_id) else {
            return failure_result("Task not found", "ExecutionError", "TaskCoordinator");
        };

        let Some(agent_role) = plan.task_assignments.get(task_id) else {
            return failure_result(
                "No suitable agent found for task",
                "NoSuitableAgent",
                "TaskCoordinator",
            );
        };

        tracing::debug!(task_id, agent = agent_role.as_str(), "task assigned");

        let Some(agent) = agent_map.get(agent_role.as_str()) else {
            return failure_result(
                &format!("No suitable agent ({agent_role}) available for task {task_id}"),
                "NoSuitableAgent",
                "TaskCoordinator",
            );
        };

        self.execute_with_retry(task, agent, context, task_id, deadline)
            .await
    }

    async fn execute_with_retry(
        &self,
        task: &Task,
        agent: &Agent,
        context: Option<&ExecutionContext>,
        task_id: &str,
        deadline: Option<tokio::time::Instant>,
    ) -> ExecutionResult {
        let mut last_errors: Vec<String> = Vec::new();

        for attempt in 0..self.max_retries {
            tracing::info!(
                task_id,
                agent = agent.role.as_str(),
                attempt = attempt + 1,
                "executing task"
            );

            let result = self.executor.execute(agent, task, context).await;
            if result.is_success() {
                tracing::info!(task_id, "task completed successfully");
                return result;
            }
            tracing::warn!(task_id, errors = ?result.errors, "task attempt failed");
            last_errors = result.errors.clone();

            if attempt < self.max_retries - 1 {
                let backoff = Duration::from_secs(1 << attempt);
                if let Some(deadline) = deadline {
                    if tokio::time::Instant::now() + backoff >= deadline {
                        tracing::warn!(task_id, "backoff would exceed run budget, giving up");
                        break;
                    }
                }
                tokio::time::sleep(backoff).await;
            }
        }

        let mut result = failure_result(
            &format!("Max retries exceeded for task {task_id}"),
            "ExecutionError",
            "TaskCoordinator",
        );
        if let Some(details) = &mut result.error_details {
            details
                .context
                .insert("last_errors".to_owned(), json!(last_errors));
            details
                .context
                .insert("attempts".to_owned(), json!(self.max_retries));
        }
        result
    }
}

impl AgentCoordinator for TaskCoordinator {
    fn coordinate<'a>(
        &'a self,
        tasks: &'a [Task],
        agents: &'a [Agent],
        context: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, Vec<ExecutionResult>> {
        Box::pin(self.coordinate_inner(tasks, agents, context))
    }
}

pub(crate) fn failure_result(
    message: &str,
    error_type: &str,
    component: &str,
) -> ExecutionResult {
    ExecutionResult::failure(
        message,
        ErrorDetails {
            error_type: error_type.to_owned(),
            component: component.to_owned(),
            input: None,
            root_cause: message.to_owned(),
            user_message: format!("Task execution failed: {message}"),
            suggestion: Some(
                "Check task description and try again. Use --verbose flag for more details."
                    .to_owned(),
            ),
            context: HashMap::new(),
        },
    )
    .with_metadata("error_type", "execution_failure")
}

fn validation_failure(task: &Task, validation_error: &ValidationError) -> ExecutionResult {
    ExecutionResult::failure(
        validation_error.message.clone(),
        ErrorDetails {
            error_type: "ValidationError".to_owned(),
            component: "TaskValidator".to_owned(),
            input: Some(json!({
                "description": task.description,
                "priority": task.priority,
                "task_id": task.task_id,
            })),
            root_cause: format!("Field '{}' failed validation", validation_error.field),
            user_message: validation_error.message.clone(),
            suggestion: validation_error.suggestion.clone(),
            context: HashMap::from([
                (
                    "field".to_owned(),
                    serde_json::Value::from(validation_error.field),
                ),
                (
                    "validator".to_owned(),
                    serde_json::Value::from("TaskValidator"),
                ),
            ]),
        },
    )
}
