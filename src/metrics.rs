use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::persistence;

/// One routing decision: task → classified domain → team → agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingMetric {
    pub timestamp: String,
    pub task_description: String,
    pub classified_domain: String,
    pub domain_score: f64,
    pub target_team: String,
    pub target_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

/// One model selection made by the provider orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelectionMetric {
    pub timestamp: String,
    pub task_description: String,
    pub criteria: String,
    pub selected_model: String,
    pub fallback_chain: Vec<String>,
    pub fallback_used: bool,
    pub latency_seconds: f64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Utilisation snapshot for one team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamUtilizationMetric {
    pub timestamp: String,
    pub team_name: String,
    pub tasks_handled: u64,
    pub agents_used: Vec<String>,
    pub average_latency: f64,
    pub success_rate: f64,
}

#[derive(Default)]
struct MetricsInner {
    routing: Vec<RoutingMetric>,
    model: Vec<ModelSelectionMetric>,
    team: Vec<TeamUtilizationMetric>,
}

/// Thread-safe collector for routing, model-selection, and team metrics.
///
/// One collector spans the process; `save` writes a single JSON document per
/// session to `<storage_path>/session_<UTC timestamp>.json`. Persistence is
/// best-effort: failures are logged, never propagated.
pub struct MetricsCollector {
    storage_path: PathBuf,
    pub session_id: String,
    inner: Mutex<MetricsInner>,
}

impl MetricsCollector {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        let session_id = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        tracing::info!(session = %session_id, "metrics collector initialized");
        Self {
            storage_path: storage_path.into(),
            session_id,
            inner: Mutex::new(MetricsInner::default()),
        }
    }

    pub fn session_file(&self) -> PathBuf {
        self.storage_path
            .join(format!("session_{}.json", self.session_id))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_routing(
        &self,
        task_description: &str,
        classified_domain: &str,
        domain_score: f64,
        target_team: &str,
        target_agent: &str,
        expected_domain: Option<&str>,
        expected_team: Option<&str>,
    ) {
        let is_correct = match (expected_domain, expected_team) {
            (Some(domain), Some(team)) => {
                Some(classified_domain == domain && target_team == team)
            }
            _ => None,
        };
        let metric = RoutingMetric {
            timestamp: Utc::now().to_rfc3339(),
            task_description: truncate(task_description, 100),
            classified_domain: classified_domain.to_owned(),
            domain_score,
            target_team: target_team.to_owned(),
            target_agent: target_agent.to_owned(),
            expected_domain: expected_domain.map(str::to_owned),
            expected_team: expected_team.map(str::to_owned),
            is_correct,
        };
        tracing::debug!(
            domain = classified_domain,
            team = target_team,
            agent = target_agent,
            "recorded routing"
        );
        self.lock().routing.push(metric);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_model_selection(
        &self,
        task_description: &str,
        criteria: &str,
        selected_model: &str,
        fallback_chain: Vec<String>,
        fallback_used: bool,
        latency_seconds: f64,
        success: bool,
        error: Option<String>,
    ) {
        let metric = ModelSelectionMetric {
            timestamp: Utc::now().to_rfc3339(),
            task_description: truncate(task_description, 100),
            criteria: criteria.to_owned(),
            selected_model: selected_model.to_owned(),
            fallback_chain,
            fallback_used,
            latency_seconds,
            success,
            error,
        };
        tracing::debug!(model = selected_model, criteria, "recorded model selection");
        self.lock().model.push(metric);
    }

    pub fn record_team_utilization(
        &self,
        team_name: &str,
        tasks_handled: u64,
        agents_used: Vec<String>,
        average_latency: f64,
        success_rate: f64,
    ) {
        let metric = TeamUtilizationMetric {
            timestamp: Utc::now().to_rfc3339(),
            team_name: team_name.to_owned(),
            tasks_handled,
            agents_used,
            average_latency,
            success_rate,
        };
        tracing::debug!(team = team_name, tasks_handled, "recorded team utilization");
        self.lock().team.push(metric);
    }

    /// Persist the session document. Best-effort; errors are logged only.
    pub async fn save(&self) {
        let document = {
            let inner = self.lock();
            json!({
                "session_id": self.session_id,
                "timestamp": Utc::now().to_rfc3339(),
                "routing_metrics": inner.routing,
                "model_metrics": inner.model,
                "team_metrics": inner.team,
                "summary": summarize(&inner),
            })
        };

        let path = self.session_file();
        let payload = match serde_json::to_string_pretty(&document) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("failed to serialize metrics session: {e}");
                return;
            }
        };
        match persistence::save_to_file(payload, &path).await {
            Ok(()) => tracing::info!(path = %path.display(), "metrics saved"),
            Err(e) => tracing::error!("failed to save metrics to {}: {e}", path.display()),
        }
    }

    pub fn summary(&self) -> serde_json::Value {
        summarize(&self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricsInner> {
        self.inner.lock().expect("metrics lock poisoned")
    }
}

fn summarize(inner: &MetricsInner) -> serde_json::Value {
    let routing_total = inner.routing.len();
    let routing_correct = inner
        .routing
        .iter()
        .filter(|m| m.is_correct == Some(true))
        .count();
    let routing_accuracy = if routing_total > 0 {
        routing_correct as f64 / routing_total as f64 * 100.0
    } else {
        0.0
    };

    let mut model_counts: HashMap<&str, u64> = HashMap::new();
    for m in &inner.model {
        *model_counts.entry(m.selected_model.as_str()).or_insert(0) += 1;
    }

    let fallback_count = inner.model.iter().filter(|m| m.fallback_used).count();
    let fallback_rate = if inner.model.is_empty() {
        0.0
    } else {
        fallback_count as f64 / inner.model.len() as f64 * 100.0
    };

    let mut team_counts: HashMap<&str, u64> = HashMap::new();
    for m in &inner.team {
        team_counts.insert(m.team_name.as_str(), m.tasks_handled);
    }

    json!({
        "routing_accuracy": (routing_accuracy * 100.0).round() / 100.0,
        "total_routing_decisions": routing_total,
        "correct_routing_decisions": routing_correct,
        "model_selection_breakdown": model_counts,
        "fallback_usage_rate": (fallback_rate * 100.0).round() / 100.0,
        "team_utilization": team_counts,
        "total_model_selections": inner.model.len(),
        "total_team_snapshots": inner.team.len(),
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_collector() -> MetricsCollector {
        MetricsCollector::new(
            std::env::temp_dir().join(format!("maestro-metrics-{}", uuid::Uuid::new_v4())),
        )
    }

    #[test]
    fn test_routing_accuracy_in_summary() {
        let collector = temp_collector();
        collector.record_routing(
            "write unit checks",
            "testing",
            3.0,
            "Testing",
            "unit-test-engineer",
            Some("testing"),
            Some("Testing"),
        );
        collector.record_routing(
            "deploy the service",
            "devops",
            2.0,
            "Infrastructure",
            "devops-lead",
            Some("backend"),
            Some("Backend"),
        );
        let summary = collector.summary();
        assert_eq!(summary["total_routing_decisions"], 2);
        assert_eq!(summary["correct_routing_decisions"], 1);
        assert_eq!(summary["routing_accuracy"], 50.0);
    }

    #[test]
    fn test_fallback_rate_in_summary() {
        let collector = temp_collector();
        collector.record_model_selection(
            "task one",
            "balanced",
            "grok",
            vec!["grok".to_owned(), "qwen3_zerogpu".to_owned()],
            false,
            1.0,
            true,
            None,
        );
        collector.record_model_selection(
            "task two",
            "balanced",
            "qwen3_zerogpu",
            vec!["grok".to_owned(), "qwen3_zerogpu".to_owned()],
            true,
            2.5,
            true,
            None,
        );
        let summary = collector.summary();
        assert_eq!(summary["fallback_usage_rate"], 50.0);
        assert_eq!(summary["model_selection_breakdown"]["grok"], 1);
    }

    #[test]
    fn test_concurrent_recording_loses_nothing() {
        let collector = Arc::new(temp_collector());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let collector = Arc::clone(&collector);
                std::thread::spawn(move || {
                    collector.record_routing(
                        &format!("task {i}"),
                        "general",
                        1.0,
                        "Orchestration",
                        "master-orchestrator",
                        None,
                        None,
                    );
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(collector.summary()["total_routing_decisions"], 32);
    }

    #[tokio::test]
    async fn test_save_writes_session_document() {
        let collector = temp_collector();
        collector.record_team_utilization(
            "Testing",
            4,
            vec!["unit-test-engineer".to_owned()],
            1.5,
            0.75,
        );
        collector.save().await;
        let raw = tokio::fs::read(collector.session_file()).await.unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(doc["session_id"], collector.session_id.as_str());
        assert_eq!(doc["team_metrics"].as_array().unwrap().len(), 1);
        assert_eq!(doc["summary"]["team_utilization"]["Testing"], 4);
    }
}
