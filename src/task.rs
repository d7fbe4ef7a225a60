use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A unit of work submitted to the runtime.
///
/// Tasks are immutable once created. `task_id` is optional; tasks without an
/// explicit id are addressed by their position in the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    pub priority: i32,
    pub task_id: Option<String>,
    pub dependencies: Vec<String>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            priority: 1,
            task_id: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// The id used in plans: the explicit `task_id` or the batch index.
    pub fn effective_id(&self, index: usize) -> String {
        self.task_id
            .clone()
            .unwrap_or_else(|| index.to_string())
    }
}

/// Validation failure with a user-facing message and an actionable suggestion.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub suggestion: Option<String>,
    pub field: &'static str,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            field,
        }
    }
}

/// Validates tasks before any execution is attempted.
pub struct TaskValidator;

impl TaskValidator {
    pub const MIN_DESCRIPTION_LENGTH: usize = 3;
    pub const MAX_DESCRIPTION_LENGTH: usize = 10_000;

    pub fn validate(task: &Task) -> Result<(), ValidationError> {
        if task.description.is_empty() {
            return Err(ValidationError::new(
                "description",
                "Task description cannot be empty",
                "Provide a clear task description (e.g., 'Write a function to sort a list')",
            ));
        }

        let trimmed = task.description.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new(
                "description",
                "Task description cannot be only whitespace",
                "Provide a meaningful task description with actual content",
            ));
        }

        let trimmed_len = trimmed.chars().count();
        if trimmed_len < Self::MIN_DESCRIPTION_LENGTH {
            return Err(ValidationError::new(
                "description",
                format!(
                    "Task description too short (minimum {} characters)",
                    Self::MIN_DESCRIPTION_LENGTH
                ),
                format!(
                    "Provide more detail about what you want to accomplish (current: {trimmed_len} chars)"
                ),
            ));
        }

        if task.description.chars().count() > Self::MAX_DESCRIPTION_LENGTH {
            return Err(ValidationError::new(
                "description",
                format!(
                    "Task description too long (maximum {} characters)",
                    Self::MAX_DESCRIPTION_LENGTH
                ),
                "Break down your task into smaller, focused subtasks",
            ));
        }

        if task.priority < 0 {
            return Err(ValidationError::new(
                "priority",
                "Task priority cannot be negative",
                "Use priority values from 1 (highest) to 100 (lowest)",
            ));
        }

        if task.priority > 100 {
            return Err(ValidationError::new(
                "priority",
                "Task priority too high (maximum 100)",
                "Use priority values from 1 (highest) to 100 (lowest)",
            ));
        }

        Ok(())
    }
}
