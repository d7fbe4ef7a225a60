//! Built-in agent and team rosters.
//!
//! The default five-agent roster serves single-task convenience calls and
//! the CLI; the scaled roster groups sixteen specialised agents into nine
//! domain teams for team-based routing.

use crate::agent::{Agent, AgentTeam, TeamKind};

/// The default flat roster: five generalist roles with the natural-language
/// capability keywords users actually put in task descriptions.
pub fn default_agents() -> Vec<Agent> {
    vec![
        Agent::new(
            "coder",
            vec![
                "code", "coding", "program", "programming", "write", "create", "build",
                "develop", "implement", "fix", "function", "class", "method", "script",
                "application", "feature", "python", "javascript", "java", "typescript",
                "refactor", "debug", "optimize", "improve",
            ],
        ),
        Agent::new(
            "tester",
            vec![
                "test", "testing", "tests", "validate", "verify", "check", "qa", "quality",
                "unit", "integration",
            ],
        ),
        Agent::new(
            "reviewer",
            vec![
                "review", "reviewing", "reviews", "analyze", "inspect", "evaluate", "assess",
                "approve", "feedback", "critique",
            ],
        ),
        Agent::new(
            "coordinator",
            vec![
                "plan", "planning", "organize", "coordinate", "delegate", "manage", "schedule",
                "prioritize",
            ],
        ),
        Agent::new(
            "researcher",
            vec![
                "research", "investigate", "study", "explore", "analyze", "document", "find",
                "search", "learn",
            ],
        ),
    ]
}

/// The scaled sixteen-agent roster with tier metadata.
pub fn scaled_agents() -> Vec<Agent> {
    vec![
        Agent::new(
            "master-orchestrator",
            vec!["plan", "coordinate", "organize", "delegate", "prioritize"],
        )
        .with_tier(1),
        Agent::new("qa-lead", vec!["review", "audit", "quality", "validate"]).with_tier(1),
        Agent::new(
            "frontend-lead",
            vec!["frontend", "ui", "design", "layout", "component"],
        )
        .with_tier(2),
        Agent::new(
            "javascript-typescript-specialist",
            vec!["javascript", "typescript", "react", "component", "browser"],
        )
        .with_tier(3)
        .with_parent("frontend-lead")
        .with_specialization("frontend"),
        Agent::new(
            "backend-lead",
            vec!["backend", "api", "architecture", "schema", "design"],
        )
        .with_tier(2),
        Agent::new(
            "backend-specialist",
            vec!["implement", "code", "function", "endpoint", "database"],
        )
        .with_tier(3)
        .with_parent("backend-lead")
        .with_specialization("backend"),
        Agent::new(
            "testing-lead",
            vec!["strategy", "coverage", "planning", "quality"],
        )
        .with_tier(2),
        Agent::new(
            "unit-test-engineer",
            vec!["unit", "mock", "fixture", "test"],
        )
        .with_tier(3)
        .with_parent("testing-lead")
        .with_specialization("unit-testing"),
        Agent::new(
            "integration-test-engineer",
            vec!["integration", "e2e", "selenium", "cypress", "postman"],
        )
        .with_tier(3)
        .with_parent("testing-lead")
        .with_specialization("integration-testing"),
        Agent::new(
            "devops-lead",
            vec!["deploy", "docker", "kubernetes", "pipeline", "infrastructure"],
        )
        .with_tier(2),
        Agent::new(
            "research-lead",
            vec!["research", "investigate", "evaluate", "architecture"],
        )
        .with_tier(2),
        Agent::new(
            "technical-writer",
            vec!["document", "tutorial", "guide", "readme", "changelog"],
        )
        .with_tier(3)
        .with_parent("research-lead")
        .with_specialization("documentation"),
        Agent::new(
            "category-theory-expert",
            vec!["composition", "functor", "morphism", "laws"],
        )
        .with_tier(2),
        Agent::new("dsl-architect", vec!["grammar", "parser", "syntax", "operator"])
            .with_tier(3)
            .with_parent("category-theory-expert")
            .with_specialization("dsl-design"),
        Agent::new(
            "dsl-deployment-specialist",
            vec!["workflow", "deployment", "pipeline", "dsl"],
        )
        .with_tier(2),
        Agent::new("dsl-task-engineer", vec!["task", "pipeline", "workflow"])
            .with_tier(3)
            .with_parent("dsl-deployment-specialist")
            .with_specialization("dsl-tasks"),
    ]
}

/// Nine domain teams over the scaled roster.
pub fn default_teams() -> Vec<AgentTeam> {
    let agents = scaled_agents();
    let get = |role: &str| {
        agents
            .iter()
            .find(|a| a.role == role)
            .cloned()
            .expect("scaled roster role missing")
    };

    let orchestrator = get("master-orchestrator");
    let qa_lead = get("qa-lead");
    let frontend_lead = get("frontend-lead");
    let backend_lead = get("backend-lead");
    let testing_lead = get("testing-lead");
    let devops_lead = get("devops-lead");
    let research_lead = get("research-lead");
    let ct_expert = get("category-theory-expert");
    let dsl_specialist = get("dsl-deployment-specialist");

    vec![
        AgentTeam::new(
            TeamKind::Orchestration,
            "Orchestration",
            "general",
            vec![orchestrator.clone()],
            Some(orchestrator),
            1,
        ),
        AgentTeam::new(
            TeamKind::QualityAssurance,
            "Quality Assurance",
            "quality",
            vec![qa_lead.clone()],
            Some(qa_lead),
            1,
        ),
        AgentTeam::new(
            TeamKind::Frontend,
            "Frontend",
            "frontend",
            vec![
                frontend_lead.clone(),
                get("javascript-typescript-specialist"),
            ],
            Some(frontend_lead),
            2,
        ),
        AgentTeam::new(
            TeamKind::Backend,
            "Backend",
            "backend",
            vec![backend_lead.clone(), get("backend-specialist")],
            Some(backend_lead),
            2,
        ),
        AgentTeam::new(
            TeamKind::Testing,
            "Testing",
            "testing",
            vec![
                testing_lead.clone(),
                get("unit-test-engineer"),
                get("integration-test-engineer"),
            ],
            Some(testing_lead),
            2,
        ),
        AgentTeam::new(
            TeamKind::Infrastructure,
            "Infrastructure",
            "devops",
            vec![devops_lead.clone()],
            Some(devops_lead),
            2,
        ),
        AgentTeam::new(
            TeamKind::Research,
            "Research",
            "research",
            vec![research_lead.clone(), get("technical-writer")],
            Some(research_lead),
            2,
        ),
        AgentTeam::new(
            TeamKind::CategoryTheory,
            "Category Theory",
            "category-theory",
            vec![ct_expert.clone(), get("dsl-architect")],
            Some(ct_expert),
            2,
        ),
        AgentTeam::new(
            TeamKind::Dsl,
            "DSL",
            "dsl",
            vec![dsl_specialist.clone(), get("dsl-task-engineer")],
            Some(dsl_specialist),
            2,
        ),
    ]
}
