use std::path::PathBuf;

use chrono::Utc;
use serde_json::json;

use crate::agent::Agent;
use crate::execution::ErrorDetails;
use crate::persistence::{self, PersistenceError};
use crate::provider::{LlmConfig, Message};
use crate::task::Task;

/// One agent-task interaction, as logged for the training pipeline.
pub struct InteractionLog<'a> {
    pub task: &'a Task,
    pub agent: &'a Agent,
    pub messages: &'a [Message],
    pub output: Option<&'a str>,
    pub status: &'a str,
    pub duration_ms: u64,
    pub config: &'a LlmConfig,
    pub provider: &'a str,
    pub errors: Vec<String>,
    pub error_details: Option<&'a ErrorDetails>,
    pub orchestrator: &'a str,
    pub context_history_length: usize,
}

/// Passive capture of agent executions for the model training pipeline.
///
/// Records land in `<data_dir>/interactions_<YYYYMMDD>.jsonl`, one JSON
/// object per line. Writes are best-effort; a logging failure never affects
/// the execution that produced the record.
pub struct DataCollector {
    data_dir: PathBuf,
    enabled: bool,
}

impl DataCollector {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        tracing::info!(dir = %data_dir.display(), "data collector initialized");
        Self {
            data_dir,
            enabled: true,
        }
    }

    pub fn disabled(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log file for a `YYYYMMDD` day key.
    pub fn log_file(&self, day: &str) -> PathBuf {
        self.data_dir.join(format!("interactions_{day}.jsonl"))
    }

    fn today() -> String {
        Utc::now().format("%Y%m%d").to_string()
    }

    pub async fn log_interaction(&self, log: InteractionLog<'_>) {
        if !self.enabled {
            return;
        }

        let record = json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "timestamp": Utc::now().to_rfc3339(),
            "task": {
                "task_id": log.task.task_id,
                "description": log.task.description,
                "priority": log.task.priority,
            },
            "agent": {
                "role": log.agent.role,
                "capabilities": log.agent.capabilities,
            },
            "llm": {
                "provider": log.provider,
                "config": {
                    "temperature": log.config.temperature,
                    "max_tokens": log.config.max_tokens,
                },
            },
            "execution": {
                "status": log.status,
                "duration_ms": log.duration_ms,
                "input_messages": log.messages,
                "output": log.output,
                "errors": log.errors,
                "error_details": log.error_details,
            },
            "context": {
                "history_length": log.context_history_length,
                "orchestrator": log.orchestrator,
            },
        });

        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("failed to serialize interaction record: {e}");
                return;
            }
        };

        let path = self.log_file(&Self::today());
        if let Err(e) = persistence::append_line(&line, &path).await {
            tracing::error!("failed to append interaction to {}: {e}", path.display());
        }
    }

    /// Compress a finished day's log to `interactions_<day>.jsonl.zst` and
    /// remove the original.
    pub async fn archive_day(&self, day: &str) -> Result<PathBuf, PersistenceError> {
        let source = self.log_file(day);
        let raw = persistence::load_from_file(&source).await?;
        let compressed = persistence::compress(&raw)?;
        let target = source.with_extension("jsonl.zst");
        persistence::save_to_file(&compressed, &target).await?;
        tokio::fs::remove_file(&source).await?;
        tracing::info!(
            from = %source.display(),
            to = %target.display(),
            "archived interaction log"
        );
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> DataCollector {
        DataCollector::new(
            std::env::temp_dir().join(format!("maestro-training-{}", uuid::Uuid::new_v4())),
        )
    }

    fn sample_log<'a>(
        task: &'a Task,
        agent: &'a Agent,
        messages: &'a [Message],
        config: &'a LlmConfig,
    ) -> InteractionLog<'a> {
        InteractionLog {
            task,
            agent,
            messages,
            output: Some("all done"),
            status: "success",
            duration_ms: 42,
            config,
            provider: "mock",
            errors: Vec::new(),
            error_details: None,
            orchestrator: "simple",
            context_history_length: 0,
        }
    }

    #[tokio::test]
    async fn test_log_interaction_appends_jsonl() {
        let collector = collector();
        let task = Task::new("write code").with_id("t1");
        let agent = Agent::new("coder", vec!["code"]);
        let messages = [Message::user("write code")];
        let config = LlmConfig::default();

        collector
            .log_interaction(sample_log(&task, &agent, &messages, &config))
            .await;
        collector
            .log_interaction(sample_log(&task, &agent, &messages, &config))
            .await;

        let path = collector.log_file(&DataCollector::today());
        let content = String::from_utf8(tokio::fs::read(&path).await.unwrap()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["task"]["task_id"], "t1");
        assert_eq!(record["agent"]["role"], "coder");
        assert_eq!(record["execution"]["status"], "success");
        assert_eq!(record["context"]["orchestrator"], "simple");
    }

    #[tokio::test]
    async fn test_disabled_collector_writes_nothing() {
        let dir = std::env::temp_dir().join(format!("maestro-training-{}", uuid::Uuid::new_v4()));
        let collector = DataCollector::disabled(&dir);
        let task = Task::new("write code");
        let agent = Agent::new("coder", vec!["code"]);
        let messages = [Message::user("write code")];
        let config = LlmConfig::default();

        collector
            .log_interaction(sample_log(&task, &agent, &messages, &config))
            .await;
        assert!(!collector.log_file(&DataCollector::today()).exists());
    }

    #[tokio::test]
    async fn test_archive_day_compresses_log() {
        let collector = collector();
        let task = Task::new("write code");
        let agent = Agent::new("coder", vec!["code"]);
        let messages = [Message::user("write code")];
        let config = LlmConfig::default();
        collector
            .log_interaction(sample_log(&task, &agent, &messages, &config))
            .await;

        let day = DataCollector::today();
        let archived = collector.archive_day(&day).await.unwrap();
        assert!(archived.exists());
        assert!(!collector.log_file(&day).exists());

        let decompressed = crate::persistence::decompress(
            &tokio::fs::read(&archived).await.unwrap(),
        )
        .unwrap();
        assert_eq!(String::from_utf8(decompressed).unwrap().lines().count(), 1);
    }
}
