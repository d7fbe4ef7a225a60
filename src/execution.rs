use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Status of a task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failure,
    Pending,
    Running,
}

/// Structured error context attached to a failed [`ExecutionResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub error_type: String,
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    pub root_cause: String,
    pub user_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub context: HashMap<String, Value>,
}

/// Result of executing one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub output: Option<Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ExecutionResult {
    pub fn success(output: impl Into<Value>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output: Some(output.into()),
            errors: Vec::new(),
            error_details: None,
            metadata: HashMap::new(),
        }
    }

    pub fn failure(message: impl Into<String>, details: ErrorDetails) -> Self {
        let message = message.into();
        Self {
            status: ExecutionStatus::Failure,
            output: None,
            errors: vec![message],
            error_details: Some(details),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// A message appended to an execution context's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Mutable state carried through one coordination run.
///
/// History appends are serialised internally, so the context can be shared
/// across the concurrently running tasks of a single run. It must not be
/// shared across unrelated runs.
#[derive(Debug)]
pub struct ExecutionContext {
    pub session_id: String,
    history: Mutex<Vec<ContextMessage>>,
    llm_state: Mutex<HashMap<String, Value>>,
    user_data: Mutex<HashMap<String, Value>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::with_session_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            history: Mutex::new(Vec::new()),
            llm_state: Mutex::new(HashMap::new()),
            user_data: Mutex::new(HashMap::new()),
        }
    }

    pub fn push_history(&self, message: ContextMessage) {
        self.history
            .lock()
            .expect("context history lock poisoned")
            .push(message);
    }

    /// The last `n` history entries, oldest first.
    pub fn recent_history(&self, n: usize) -> Vec<ContextMessage> {
        let history = self.history.lock().expect("context history lock poisoned");
        let skip = history.len().saturating_sub(n);
        history[skip..].to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.history
            .lock()
            .expect("context history lock poisoned")
            .len()
    }

    pub fn set_llm_state(&self, key: impl Into<String>, value: Value) {
        self.llm_state
            .lock()
            .expect("llm state lock poisoned")
            .insert(key.into(), value);
    }

    pub fn set_user_data(&self, key: impl Into<String>, value: Value) {
        self.user_data
            .lock()
            .expect("user data lock poisoned")
            .insert(key.into(), value);
    }

    pub fn user_data(&self, key: &str) -> Option<Value> {
        self.user_data
            .lock()
            .expect("user data lock poisoned")
            .get(key)
            .cloned()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure raised by an external tool runner during an LLM tool call.
///
/// The tool implementations themselves live outside this crate; the runtime
/// only flattens their failures into [`ErrorDetails`] on the result.
#[derive(Debug, Clone, Error)]
#[error("tool '{tool_name}' failed: {message}")]
pub struct ToolExecutionError {
    pub tool_name: String,
    pub message: String,
    pub exit_code: Option<i32>,
    pub stderr: Option<String>,
}

impl ToolExecutionError {
    pub fn new(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            message: message.into(),
            exit_code: None,
            stderr: None,
        }
    }

    pub fn to_error_details(&self) -> ErrorDetails {
        let mut context = HashMap::new();
        if let Some(code) = self.exit_code {
            context.insert("exit_code".to_owned(), Value::from(code));
        }
        if let Some(stderr) = &self.stderr {
            context.insert("stderr".to_owned(), Value::from(stderr.clone()));
        }
        ErrorDetails {
            error_type: "ToolExecutionError".to_owned(),
            component: self.tool_name.clone(),
            input: None,
            root_cause: self.message.clone(),
            user_message: format!("Tool '{}' failed: {}", self.tool_name, self.message),
            suggestion: Some("Check the tool invocation and its inputs, then retry".to_owned()),
            context,
        }
    }
}
