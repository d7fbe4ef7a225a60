use crate::agent::{Agent, AgentTeam, sequence_ratio};
use crate::task::Task;
use crate::team_router::TeamRouter;

/// Only capability matches at or above this ratio count toward the score.
const SCORING_THRESHOLD: f32 = 0.8;

/// Picks the agent to run a task, or `None` when nobody fits.
pub trait AgentSelector: Send + Sync {
    fn select_agent(&self, task: &Task, agents: &[Agent]) -> Option<Agent>;
}

/// Capability-matching selector.
///
/// For each word of the description, the best-matching capability ratio is
/// added to the agent's score when it reaches 0.8. The highest score wins;
/// ties go to the agent with fewer capabilities (the more specialised one).
pub struct CapabilitySelector;

impl CapabilitySelector {
    fn match_score(agent: &Agent, task: &Task) -> f64 {
        let description = task.description.to_lowercase();
        let mut total = 0.0f64;
        for word in description.split_whitespace() {
            let best = agent
                .capabilities
                .iter()
                .map(|cap| sequence_ratio(&cap.to_lowercase(), word))
                .fold(0.0f32, f32::max);
            if best >= SCORING_THRESHOLD {
                total += f64::from(best);
            }
        }
        total
    }
}

impl AgentSelector for CapabilitySelector {
    fn select_agent(&self, task: &Task, agents: &[Agent]) -> Option<Agent> {
        let mut best: Option<(&Agent, f64)> = None;
        for agent in agents {
            if !agent.can_handle(task) {
                continue;
            }
            let score = Self::match_score(agent, task);
            let better = match best {
                None => true,
                Some((current, best_score)) => {
                    score > best_score
                        || (score == best_score
                            && agent.capabilities.len() < current.capabilities.len())
                }
            };
            if better {
                best = Some((agent, score));
            }
        }
        best.map(|(agent, score)| {
            tracing::debug!(
                agent = agent.role.as_str(),
                score,
                "capability selector picked agent"
            );
            agent.clone()
        })
    }
}

/// Selector that routes through agent teams instead of the flat agent list.
///
/// The `agents` argument of [`AgentSelector::select_agent`] is ignored; the
/// configured teams are authoritative. The signature is kept so the planner
/// can swap selectors without caring which strategy is behind it.
pub struct TeamBasedSelector {
    teams: Vec<AgentTeam>,
    router: TeamRouter,
}

impl TeamBasedSelector {
    pub fn new(teams: Vec<AgentTeam>) -> Self {
        Self {
            teams,
            router: TeamRouter::new(),
        }
    }

    pub fn with_router(mut self, router: TeamRouter) -> Self {
        self.router = router;
        self
    }

    /// Every agent known to the configured teams.
    pub fn all_agents(&self) -> Vec<Agent> {
        self.teams
            .iter()
            .flat_map(|team| team.agents.iter().cloned())
            .collect()
    }
}

impl AgentSelector for TeamBasedSelector {
    fn select_agent(&self, task: &Task, _agents: &[Agent]) -> Option<Agent> {
        match self.router.route(task, &self.teams) {
            Ok(agent) => Some(agent),
            Err(e) => {
                tracing::error!("team routing failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selects_best_matching_agent() {
        let coder = Agent::new("coder", vec!["code", "write"]);
        let tester = Agent::new("tester", vec!["test", "verify"]);
        let task = Task::new("write code for authentication");

        let selected = CapabilitySelector
            .select_agent(&task, &[coder, tester])
            .unwrap();
        assert_eq!(selected.role, "coder");
    }

    #[test]
    fn test_returns_none_when_nobody_matches() {
        let coder = Agent::new("coder", vec!["code"]);
        let writer = Agent::new("writer", vec!["docs"]);
        let task = Task::new("Deploy to kubernetes production cluster");

        assert!(
            CapabilitySelector
                .select_agent(&task, &[coder, writer])
                .is_none()
        );
    }

    #[test]
    fn test_returns_none_for_empty_agent_list() {
        let task = Task::new("write code");
        assert!(CapabilitySelector.select_agent(&task, &[]).is_none());
    }

    #[test]
    fn test_tie_prefers_more_specialised_agent() {
        let generalist = Agent::new("generalist", vec!["code", "test", "docs", "deploy"]);
        let specialist = Agent::new("specialist", vec!["code"]);
        let task = Task::new("code the parser");

        let selected = CapabilitySelector
            .select_agent(&task, &[generalist, specialist])
            .unwrap();
        assert_eq!(selected.role, "specialist");
    }

    #[test]
    fn test_team_selector_ignores_agent_list() {
        let selector = TeamBasedSelector::new(crate::roster::default_teams());
        let task = Task::new("write unit checks with mocks");
        let unrelated = [Agent::new("nobody", vec!["nothing"])];
        let selected = selector.select_agent(&task, &unrelated).unwrap();
        assert_eq!(selected.role, "unit-test-engineer");
    }
}
