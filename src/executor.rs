use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde_json::{Value, json};

use crate::agent::Agent;
use crate::collector::{DataCollector, InteractionLog};
use crate::execution::{
    ContextMessage, ErrorDetails, ExecutionContext, ExecutionResult, ExecutionStatus,
};
use crate::provider::{LlmConfig, Message, ProviderError, TextGenerator};
use crate::task::Task;

/// Executes one task with one agent.
pub trait AgentExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        agent: &'a Agent,
        task: &'a Task,
        context: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, ExecutionResult>;
}

/// LLM-backed executor: builds a prompt from the agent's role and the task,
/// calls the provider, and turns the reply (or the failure) into an
/// [`ExecutionResult`].
pub struct LlmAgentExecutor {
    provider: Arc<dyn TextGenerator>,
    default_config: LlmConfig,
    data_collector: Option<Arc<DataCollector>>,
    provider_name: String,
    orchestrator_label: String,
}

impl LlmAgentExecutor {
    pub fn new(provider: Arc<dyn TextGenerator>) -> Self {
        let provider_name = provider.name().to_owned();
        Self {
            provider,
            default_config: LlmConfig::default(),
            data_collector: None,
            provider_name,
            orchestrator_label: "simple".to_owned(),
        }
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.default_config = config;
        self
    }

    pub fn with_data_collector(mut self, collector: Arc<DataCollector>) -> Self {
        self.data_collector = Some(collector);
        self
    }

    pub fn with_orchestrator_label(mut self, label: impl Into<String>) -> Self {
        self.orchestrator_label = label.into();
        self
    }

    /// System prompt, up to five context history entries, then the task.
    fn build_messages(
        &self,
        agent: &Agent,
        task: &Task,
        context: Option<&ExecutionContext>,
    ) -> Vec<Message> {
        let mut messages = Vec::new();

        let system_prompt = format!(
            "You are a {} agent with capabilities: {}.\n\n\
             ULTRATHINK MODE: You MUST think step-by-step through problems before answering.\n\
             - Use <think></think> tags to show your reasoning process\n\
             - Break down complex problems into smaller steps\n\
             - Analyze multiple approaches before selecting the best one\n\
             - Verify your logic and check for errors\n\
             - Be thorough and rigorous in your analysis\n\n\
             Complete the given task using your expertise and deep analytical thinking.",
            agent.role,
            agent.capabilities.join(", ")
        );
        messages.push(Message::system(system_prompt));

        if let Some(context) = context {
            for entry in context.recent_history(5) {
                messages.push(match entry.role.as_str() {
                    "assistant" => Message::assistant(entry.content),
                    "system" => Message::system(entry.content),
                    _ => Message::user(entry.content),
                });
            }
        }

        let task_prompt = format!(
            "Task: {}\n\n\
             IMPORTANT: Think through this problem step-by-step using <think></think> tags \
             before providing your final answer. Consider:\n\
             1. What is being asked?\n\
             2. What information do I need?\n\
             3. What are the potential approaches?\n\
             4. What are the constraints and requirements?\n\
             5. What is the optimal solution?\n\n\
             Think deeply, then provide your response.",
            task.description
        );
        messages.push(Message::user(task_prompt));

        messages
    }

    async fn execute_inner(
        &self,
        agent: &Agent,
        task: &Task,
        context: Option<&ExecutionContext>,
    ) -> ExecutionResult {
        let started = Instant::now();
        let messages = self.build_messages(agent, task, context);

        match self
            .provider
            .generate(&messages, Some(&self.default_config))
            .await
        {
            Ok(response) => {
                let duration_ms = started.elapsed().as_millis() as u64;

                if let Some(context) = context {
                    context.push_history(ContextMessage {
                        role: "assistant".to_owned(),
                        content: response.clone(),
                        agent: Some(agent.role.clone()),
                    });
                }

                if let Some(collector) = &self.data_collector {
                    collector
                        .log_interaction(InteractionLog {
                            task,
                            agent,
                            messages: &messages,
                            output: Some(&response),
                            status: "success",
                            duration_ms,
                            config: &self.default_config,
                            provider: &self.provider_name,
                            errors: Vec::new(),
                            error_details: None,
                            orchestrator: &self.orchestrator_label,
                            context_history_length: context
                                .map(ExecutionContext::history_len)
                                .unwrap_or(0),
                        })
                        .await;
                }

                let mut result = ExecutionResult::success(response)
                    .with_metadata("agent_role", agent.role.clone());
                if let Some(task_id) = &task.task_id {
                    result = result.with_metadata("task_id", task_id.clone());
                }
                result
            }
            Err(e) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                let details = error_details_for(&e, agent, task);
                let message = e.to_string();

                if let Some(collector) = &self.data_collector {
                    collector
                        .log_interaction(InteractionLog {
                            task,
                            agent,
                            messages: &messages,
                            output: None,
                            status: "failure",
                            duration_ms,
                            config: &self.default_config,
                            provider: &self.provider_name,
                            errors: vec![message.clone()],
                            error_details: Some(&details),
                            orchestrator: &self.orchestrator_label,
                            context_history_length: context
                                .map(ExecutionContext::history_len)
                                .unwrap_or(0),
                        })
                        .await;
                }

                ExecutionResult {
                    status: ExecutionStatus::Failure,
                    output: None,
                    errors: vec![message],
                    error_details: Some(details),
                    metadata: HashMap::from([(
                        "agent_role".to_owned(),
                        Value::from(agent.role.clone()),
                    )]),
                }
            }
        }
    }
}

impl AgentExecutor for LlmAgentExecutor {
    fn execute<'a>(
        &'a self,
        agent: &'a Agent,
        task: &'a Task,
        context: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, ExecutionResult> {
        Box::pin(self.execute_inner(agent, task, context))
    }
}

fn error_kind(e: &ProviderError) -> &'static str {
    match e {
        ProviderError::Connection(_) => "ProviderConnectionError",
        ProviderError::Timeout(_) => "ProviderTimeoutError",
        ProviderError::InvalidResponse(_) => "ProviderInvalidResponse",
        ProviderError::Creation(_) => "ProviderCreationError",
        ProviderError::ToolsUnsupported(_) => "ProviderToolsUnsupported",
        ProviderError::Tool(_) => "ToolExecutionError",
        ProviderError::FallbackExhausted { .. } => "ProviderFallbackExhausted",
    }
}

fn error_details_for(e: &ProviderError, agent: &Agent, task: &Task) -> ErrorDetails {
    // Tool failures carry their own structured details.
    if let ProviderError::Tool(tool_error) = e {
        return tool_error.to_error_details();
    }

    ErrorDetails {
        error_type: "ExecutionError".to_owned(),
        component: "LlmAgentExecutor".to_owned(),
        input: Some(json!({
            "task_description": task.description,
            "agent_role": agent.role,
        })),
        root_cause: e.to_string(),
        user_message: format!("Task execution failed: {e}"),
        suggestion: Some(
            "Check the error message and task description. Use --verbose for more details."
                .to_owned(),
        ),
        context: HashMap::from([
            ("exception_type".to_owned(), Value::from(error_kind(e))),
            ("agent_role".to_owned(), Value::from(agent.role.clone())),
            (
                "task_id".to_owned(),
                task.task_id.clone().map(Value::from).unwrap_or(Value::Null),
            ),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ToolExecutionError;
    use crate::provider::{MessageRole, MockProvider};
    use futures::future;

    struct FailingProvider(ProviderError);

    impl TextGenerator for FailingProvider {
        fn generate<'a>(
            &'a self,
            _messages: &'a [Message],
            _config: Option<&'a LlmConfig>,
        ) -> BoxFuture<'a, Result<String, ProviderError>> {
            let err = match &self.0 {
                ProviderError::Connection(msg) => ProviderError::Connection(msg.clone()),
                ProviderError::Tool(t) => ProviderError::Tool(t.clone()),
                other => ProviderError::InvalidResponse(other.to_string()),
            };
            Box::pin(future::ready(Err(err)))
        }
    }

    fn agent() -> Agent {
        Agent::new("coder", vec!["code", "write"])
    }

    #[tokio::test]
    async fn test_successful_execution() {
        let executor = LlmAgentExecutor::new(Arc::new(MockProvider::new("the code")));
        let task = Task::new("write code for authentication").with_id("t1");
        let result = executor.execute(&agent(), &task, None).await;

        assert!(result.is_success());
        assert_eq!(result.output, Some(Value::from("the code")));
        assert_eq!(result.metadata["agent_role"], Value::from("coder"));
        assert_eq!(result.metadata["task_id"], Value::from("t1"));
    }

    #[tokio::test]
    async fn test_message_shape() {
        let executor = LlmAgentExecutor::new(Arc::new(MockProvider::default()));
        let task = Task::new("write code");
        let context = ExecutionContext::new();
        for i in 0..7 {
            context.push_history(ContextMessage {
                role: "assistant".to_owned(),
                content: format!("earlier {i}"),
                agent: None,
            });
        }

        let messages = executor.build_messages(&agent(), &task, Some(&context));
        // System prompt + last five history entries + the task itself.
        assert_eq!(messages.len(), 7);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("coder"));
        assert!(messages[0].content.contains("ULTRATHINK"));
        assert_eq!(messages[1].content, "earlier 2");
        assert_eq!(messages[6].role, MessageRole::User);
        assert!(messages[6].content.contains("write code"));
    }

    #[tokio::test]
    async fn test_success_appends_to_context_history() {
        let executor = LlmAgentExecutor::new(Arc::new(MockProvider::new("reply")));
        let task = Task::new("write code");
        let context = ExecutionContext::new();

        executor.execute(&agent(), &task, Some(&context)).await;

        let history = context.recent_history(1);
        assert_eq!(history[0].role, "assistant");
        assert_eq!(history[0].content, "reply");
        assert_eq!(history[0].agent.as_deref(), Some("coder"));
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_failure_result() {
        let executor = LlmAgentExecutor::new(Arc::new(FailingProvider(
            ProviderError::Connection("unreachable".to_owned()),
        )));
        let task = Task::new("write code");
        let result = executor.execute(&agent(), &task, None).await;

        assert_eq!(result.status, ExecutionStatus::Failure);
        let details = result.error_details.unwrap();
        assert_eq!(details.error_type, "ExecutionError");
        assert_eq!(
            details.context["exception_type"],
            Value::from("ProviderConnectionError")
        );
    }

    #[tokio::test]
    async fn test_tool_failure_keeps_structured_details() {
        let tool_error = ToolExecutionError::new("shell", "command not found");
        let executor =
            LlmAgentExecutor::new(Arc::new(FailingProvider(ProviderError::Tool(tool_error))));
        let task = Task::new("run the build");
        let result = executor.execute(&agent(), &task, None).await;

        let details = result.error_details.unwrap();
        assert_eq!(details.error_type, "ToolExecutionError");
        assert_eq!(details.component, "shell");
    }

    #[tokio::test]
    async fn test_interactions_logged_to_collector() {
        let collector = Arc::new(DataCollector::new(
            std::env::temp_dir().join(format!("maestro-exec-{}", uuid::Uuid::new_v4())),
        ));
        let executor = LlmAgentExecutor::new(Arc::new(MockProvider::new("ok")))
            .with_data_collector(Arc::clone(&collector));
        let task = Task::new("write code");
        executor.execute(&agent(), &task, None).await;

        let day = chrono::Utc::now().format("%Y%m%d").to_string();
        let content = tokio::fs::read_to_string(collector.log_file(&day))
            .await
            .unwrap();
        let record: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(record["execution"]["status"], "success");
        assert_eq!(record["llm"]["provider"], "mock");
    }
}
