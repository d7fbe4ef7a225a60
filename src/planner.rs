use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use petgraph::prelude::StableGraph;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::agent_selector::AgentSelector;
use crate::execution::ExecutionContext;
use crate::provider::{LlmConfig, Message, TextGenerator};
use crate::task::Task;

/// Ordered tasks, role assignments, and parallel frontiers.
///
/// `parallel_groups` is a list of frontiers: tasks within one frontier may
/// run concurrently, frontiers run sequentially.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub task_order: Vec<String>,
    pub task_assignments: HashMap<String, String>,
    pub parallel_groups: Vec<Vec<String>>,
}

/// The JSON document the planning model is asked to produce.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct PlanOutline {
    /// Task ids in suggested execution order.
    task_order: Vec<String>,
    /// Task id to agent role.
    task_assignments: BTreeMap<String, String>,
    /// Frontiers of task ids that may run concurrently.
    parallel_groups: Vec<Vec<String>>,
}

/// Produces an [`ExecutionPlan`] for a batch of tasks. Never fails: planners
/// degrade to a deterministic fallback plan instead of erroring.
pub trait TaskPlanner: Send + Sync {
    fn create_plan<'a>(
        &'a self,
        tasks: &'a [Task],
        agents: &'a [Agent],
        context: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, ExecutionPlan>;
}

/// LLM-assisted planner with a tier-aware topological fallback.
///
/// The provider is asked for a plan outline; any field that is missing,
/// malformed, or inconsistent with the submitted tasks is recomputed
/// locally. Fallback grouping layers tasks tier by tier (1 first) and
/// breaks dependency cycles by flushing whatever remains of a tier.
pub struct LlmTaskPlanner {
    provider: Arc<dyn TextGenerator>,
    selector: Arc<dyn AgentSelector>,
}

impl LlmTaskPlanner {
    pub fn new(provider: Arc<dyn TextGenerator>, selector: Arc<dyn AgentSelector>) -> Self {
        Self { provider, selector }
    }

    fn build_planning_prompt(tasks: &[Task], agents: &[Agent]) -> String {
        let task_desc = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    "- {}: {} (deps: {:?})",
                    t.effective_id(i),
                    t.description,
                    t.dependencies
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let agent_desc = agents
            .iter()
            .map(|a| format!("- {}: {:?}", a.role, a.capabilities))
            .collect::<Vec<_>>()
            .join("\n");
        let schema = serde_json::to_string_pretty(&schemars::schema_for!(PlanOutline))
            .unwrap_or_default();

        format!(
            "Given these tasks:\n{task_desc}\n\n\
             And these available agents:\n{agent_desc}\n\n\
             Create an execution plan that:\n\
             1. Respects task dependencies\n\
             2. Assigns each task to the most suitable agent\n\
             3. Identifies tasks that can run in parallel\n\n\
             Reply with a single JSON object matching this schema:\n{schema}"
        )
    }

    async fn invoke_llm_planner(&self, tasks: &[Task], agents: &[Agent]) -> Option<String> {
        let prompt = Self::build_planning_prompt(tasks, agents);
        let messages = [Message::user(prompt)];
        let config = LlmConfig::new(0.3, 500);
        match self.provider.generate(&messages, Some(&config)).await {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!("LLM planning failed: {e}, using fallback");
                None
            }
        }
    }

    /// Merge the LLM reply with locally computed fallbacks, field by field.
    fn parse_llm_response(
        &self,
        response: &str,
        tasks: &[Task],
        agents: &[Agent],
    ) -> ExecutionPlan {
        let task_ids: Vec<String> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| t.effective_id(i))
            .collect();

        let parsed: Option<serde_json::Value> = serde_json::from_str(response).ok();
        let field = |key: &str| parsed.as_ref().and_then(|v| v.get(key).cloned());

        let task_order = field("task_order")
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
            .filter(|order| is_permutation(order, &task_ids))
            .unwrap_or_else(|| task_ids.clone());

        let task_assignments = field("task_assignments")
            .and_then(|v| serde_json::from_value::<HashMap<String, String>>(v).ok())
            .filter(|assignments| assignments.keys().all(|id| task_ids.contains(id)))
            .unwrap_or_else(|| self.assign_tasks_to_agents(tasks, agents));

        let parallel_groups = field("parallel_groups")
            .and_then(|v| serde_json::from_value::<Vec<Vec<String>>>(v).ok())
            .filter(|groups| is_partition(groups, &task_ids))
            .unwrap_or_else(|| compute_parallel_groups(tasks, &task_assignments, agents));

        ExecutionPlan {
            task_order,
            task_assignments,
            parallel_groups,
        }
    }

    fn assign_tasks_to_agents(&self, tasks: &[Task], agents: &[Agent]) -> HashMap<String, String> {
        let mut assignments = HashMap::new();
        for (i, task) in tasks.iter().enumerate() {
            if let Some(agent) = self.selector.select_agent(task, agents) {
                assignments.insert(task.effective_id(i), agent.role);
            }
        }
        assignments
    }

    fn fallback_plan(&self, tasks: &[Task], agents: &[Agent]) -> ExecutionPlan {
        self.parse_llm_response("", tasks, agents)
    }
}

impl TaskPlanner for LlmTaskPlanner {
    fn create_plan<'a>(
        &'a self,
        tasks: &'a [Task],
        agents: &'a [Agent],
        _context: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, ExecutionPlan> {
        Box::pin(async move {
            tracing::info!(tasks = tasks.len(), "planning execution");

            let plan = match self.invoke_llm_planner(tasks, agents).await {
                Some(response) => self.parse_llm_response(&response, tasks, agents),
                None => self.fallback_plan(tasks, agents),
            };

            tracing::info!(
                groups = plan.parallel_groups.len(),
                assignments = plan.task_assignments.len(),
                "plan created"
            );
            plan
        })
    }
}

fn is_permutation(order: &[String], task_ids: &[String]) -> bool {
    let mut sorted_order = order.to_vec();
    let mut sorted_ids = task_ids.to_vec();
    sorted_order.sort();
    sorted_ids.sort();
    sorted_order == sorted_ids
}

fn is_partition(groups: &[Vec<String>], task_ids: &[String]) -> bool {
    let flat: Vec<String> = groups.iter().flatten().cloned().collect();
    is_permutation(&flat, task_ids)
}

/// Tier-aware topological layering.
///
/// Tiers run 1 → 2 → 3 (unassigned tasks count as tier 3). Within a tier,
/// each frontier takes every task whose dependencies are already covered by
/// earlier frontiers of any tier. A tier with no ready task has a
/// dependency cycle; its remaining tasks are flushed as one frontier so the
/// plan always covers everything.
pub(crate) fn compute_parallel_groups(
    tasks: &[Task],
    task_assignments: &HashMap<String, String>,
    agents: &[Agent],
) -> Vec<Vec<String>> {
    if agents.is_empty() {
        return compute_parallel_groups_legacy(tasks);
    }

    for cycle in dependency_cycles(tasks) {
        tracing::warn!(?cycle, "dependency cycle among tasks, will break ordering");
    }

    let agent_tier_map: HashMap<&str, u8> =
        agents.iter().map(|a| (a.role.as_str(), a.tier)).collect();

    let task_map: HashMap<String, &Task> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.effective_id(i), t))
        .collect();

    let mut tier_groups: BTreeMap<u8, Vec<String>> = BTreeMap::new();
    for (i, task) in tasks.iter().enumerate() {
        let task_id = task.effective_id(i);
        let tier = task_assignments
            .get(&task_id)
            .map(|role| agent_tier_map.get(role.as_str()).copied().unwrap_or(3))
            .unwrap_or(3);
        tier_groups.entry(tier).or_default().push(task_id);
    }

    let mut all_groups: Vec<Vec<String>> = Vec::new();
    let mut completed: HashSet<String> = HashSet::new();

    for tier_task_ids in tier_groups.values() {
        let mut tier_completed: HashSet<String> = HashSet::new();

        while tier_completed.len() < tier_task_ids.len() {
            let mut level: Vec<String> = tier_task_ids
                .iter()
                .filter(|id| !tier_completed.contains(*id))
                .filter(|id| {
                    task_map[*id]
                        .dependencies
                        .iter()
                        .all(|dep| completed.contains(dep))
                })
                .cloned()
                .collect();

            if level.is_empty() {
                // Cycle inside this tier: flush what remains to keep moving.
                level = tier_task_ids
                    .iter()
                    .filter(|id| !tier_completed.contains(*id))
                    .cloned()
                    .collect();
            }

            tier_completed.extend(level.iter().cloned());
            completed.extend(level.iter().cloned());
            all_groups.push(level);
        }
    }

    if all_groups.is_empty() {
        all_groups.push(
            tasks
                .iter()
                .enumerate()
                .map(|(i, t)| t.effective_id(i))
                .collect(),
        );
    }
    all_groups
}

/// Dependency-only layering, for callers that supply no agents.
fn compute_parallel_groups_legacy(tasks: &[Task]) -> Vec<Vec<String>> {
    let task_map: HashMap<String, &Task> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.effective_id(i), t))
        .collect();
    let task_ids: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| t.effective_id(i))
        .collect();

    let mut completed: HashSet<String> = HashSet::new();
    let mut levels: Vec<Vec<String>> = Vec::new();

    while completed.len() < task_ids.len() {
        let mut level: Vec<String> = task_ids
            .iter()
            .filter(|id| !completed.contains(*id))
            .filter(|id| {
                task_map[*id]
                    .dependencies
                    .iter()
                    .all(|dep| completed.contains(dep))
            })
            .cloned()
            .collect();

        if level.is_empty() {
            level = task_ids
                .iter()
                .filter(|id| !completed.contains(*id))
                .cloned()
                .collect();
        }

        completed.extend(level.iter().cloned());
        levels.push(level);
    }

    levels
}

/// Non-trivial strongly connected components of the task dependency graph.
pub fn dependency_cycles(tasks: &[Task]) -> Vec<Vec<String>> {
    let mut graph: StableGraph<String, ()> = StableGraph::new();
    let mut nodes = HashMap::new();

    for (i, task) in tasks.iter().enumerate() {
        let id = task.effective_id(i);
        let idx = graph.add_node(id.clone());
        nodes.insert(id, idx);
    }

    for (i, task) in tasks.iter().enumerate() {
        let target = nodes[&task.effective_id(i)];
        for dep in &task.dependencies {
            if let Some(&source) = nodes.get(dep) {
                graph.add_edge(source, target, ());
            }
        }
    }

    petgraph::algo::kosaraju_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| scc.into_iter().map(|idx| graph[idx].clone()).collect())
        .collect()
}
