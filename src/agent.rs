use serde::{Deserialize, Serialize};
use similar::TextDiff;

use crate::task::Task;

/// Fuzzy-match threshold for deciding whether an agent accepts a task at all.
const CAN_HANDLE_THRESHOLD: f32 = 0.6;

/// Character-level similarity ratio between two strings, difflib style.
pub(crate) fn sequence_ratio(a: &str, b: &str) -> f32 {
    TextDiff::from_chars(a, b).ratio()
}

/// A role plus the capability keywords it is willing to accept work for.
///
/// Tiers: 1 = orchestration/QA, 2 = domain lead, 3 = specialist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub role: String,
    pub capabilities: Vec<String>,
    pub tier: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
}

impl Agent {
    pub fn new(role: impl Into<String>, capabilities: Vec<&str>) -> Self {
        Self {
            role: role.into(),
            capabilities: capabilities.into_iter().map(str::to_owned).collect(),
            tier: 3,
            parent: None,
            specialization: None,
        }
    }

    pub fn with_tier(mut self, tier: u8) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specialization = Some(specialization.into());
        self
    }

    /// Whether any capability fuzzily matches any word of the task description.
    pub fn can_handle(&self, task: &Task) -> bool {
        let description = task.description.to_lowercase();
        let words: Vec<&str> = description.split_whitespace().collect();
        self.capabilities.iter().any(|cap| {
            let cap = cap.to_lowercase();
            words
                .iter()
                .any(|word| sequence_ratio(&cap, word) > CAN_HANDLE_THRESHOLD)
        })
    }
}

/// Routing behaviour of a team, dispatched on the team's domain kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamKind {
    Frontend,
    Backend,
    Testing,
    Infrastructure,
    Research,
    Orchestration,
    QualityAssurance,
    CategoryTheory,
    Dsl,
}

/// A group of agents sharing a domain, with its own internal routing rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTeam {
    pub name: String,
    pub domain: String,
    pub agents: Vec<Agent>,
    pub lead: Option<Agent>,
    pub tier: u8,
    pub kind: TeamKind,
}

impl AgentTeam {
    pub fn new(
        kind: TeamKind,
        name: impl Into<String>,
        domain: impl Into<String>,
        agents: Vec<Agent>,
        lead: Option<Agent>,
        tier: u8,
    ) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            agents,
            lead,
            tier,
            kind,
        }
    }

    pub fn get_agent(&self, role: &str) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.role == role)
    }

    /// A team can handle a task if any of its members can.
    pub fn can_handle(&self, task: &Task) -> bool {
        self.agents.iter().any(|agent| agent.can_handle(task))
    }

    pub fn all_capabilities(&self) -> Vec<String> {
        let mut capabilities: Vec<String> = self
            .agents
            .iter()
            .flat_map(|agent| agent.capabilities.iter().cloned())
            .collect();
        capabilities.sort();
        capabilities.dedup();
        capabilities
    }

    fn lead_or_first(&self) -> Option<&Agent> {
        self.lead.as_ref().or_else(|| self.agents.first())
    }

    /// Route a task to an agent within the team.
    ///
    /// Each kind applies its own keyword rules; the lead is the fallback
    /// everywhere so no accepted task is left without an owner.
    pub fn route_internally(&self, task: &Task) -> Option<&Agent> {
        let desc = task.description.to_lowercase();

        match self.kind {
            TeamKind::Frontend => {
                if contains_any(
                    &desc,
                    &["design", "architecture", "architect", "layout", "structure"],
                ) {
                    return self.lead_or_first();
                }
                if let Some(specialist) = self.get_agent("javascript-typescript-specialist") {
                    if contains_any(&desc, &["implement", "write", "create", "code", "build"]) {
                        return Some(specialist);
                    }
                }
                self.lead_or_first()
            }
            TeamKind::Backend => {
                if contains_any(
                    &desc,
                    &["design", "architecture", "architect", "schema", "api design"],
                ) {
                    return self.lead_or_first();
                }
                if let Some(specialist) = self.get_agent("backend-specialist") {
                    if contains_any(
                        &desc,
                        &["implement", "write", "create", "code", "build", "function"],
                    ) {
                        return Some(specialist);
                    }
                }
                self.lead_or_first()
            }
            TeamKind::Testing => {
                if contains_any(&desc, &["strategy", "planning", "plan", "approach", "coverage"]) {
                    return self.lead_or_first();
                }
                let unit_engineer = self.get_agent("unit-test-engineer");
                if let Some(engineer) = unit_engineer {
                    if contains_any(&desc, &["unit", "unittest", "mock", "fixture", "stub", "spy"]) {
                        return Some(engineer);
                    }
                }
                if let Some(engineer) = self.get_agent("integration-test-engineer") {
                    if contains_any(
                        &desc,
                        &[
                            "integration",
                            "e2e",
                            "end-to-end",
                            "end to end",
                            "selenium",
                            "cypress",
                            "postman",
                            "api test",
                        ],
                    ) {
                        return Some(engineer);
                    }
                }
                // Bare "test" is most often a unit test request.
                if desc.contains("test") {
                    if let Some(engineer) = unit_engineer {
                        return Some(engineer);
                    }
                }
                self.lead_or_first()
            }
            TeamKind::Research => {
                if let Some(writer) = self.get_agent("technical-writer") {
                    if contains_any(
                        &desc,
                        &[
                            "document",
                            "write",
                            "tutorial",
                            "guide",
                            "readme",
                            "changelog",
                            "api docs",
                        ],
                    ) {
                        return Some(writer);
                    }
                }
                self.lead_or_first()
            }
            TeamKind::CategoryTheory => {
                if let Some(architect) = self.get_agent("dsl-architect") {
                    if contains_any(&desc, &["grammar", "parser", "syntax", "operator"]) {
                        return Some(architect);
                    }
                }
                self.lead_or_first()
            }
            TeamKind::Dsl => {
                if let Some(engineer) = self.get_agent("dsl-task-engineer") {
                    if contains_any(&desc, &["task", "pipeline", "workflow"]) {
                        return Some(engineer);
                    }
                }
                self.lead_or_first()
            }
            // Single-agent teams: everything goes to the lead.
            TeamKind::Infrastructure | TeamKind::Orchestration | TeamKind::QualityAssurance => {
                self.lead_or_first()
            }
        }
    }
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| haystack.contains(kw))
}
