use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::execution::ToolExecutionError;

/// Sender of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => f.pad("system"),
            MessageRole::User => f.pad("user"),
            MessageRole::Assistant => f.pad("assistant"),
        }
    }
}

/// One chat message in the provider wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Generation parameters passed to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub temperature: f64,
    pub max_tokens: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

impl LlmConfig {
    pub fn new(temperature: f64, max_tokens: u64) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

/// A tool the model may call, described by a JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// The outcome of running one requested tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub name: String,
    pub output: Value,
}

/// Reply from a tool-assisted generation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAssistedReply {
    pub response: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolOutcome>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider connection failed: {0}")]
    Connection(String),
    #[error("provider timed out after {0:.1}s")]
    Timeout(f64),
    #[error("provider returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("provider creation failed: {0}")]
    Creation(String),
    #[error("provider '{0}' does not support tool calls")]
    ToolsUnsupported(String),
    #[error(transparent)]
    Tool(#[from] ToolExecutionError),
    #[error("all providers in fallback chain failed, last error: {last_error}")]
    FallbackExhausted { last_error: String },
}

/// The text-generation contract every LLM backend implements.
///
/// The concrete HTTP/SDK clients live outside this crate; callers register
/// creators for them in a [`ProviderRegistry`]. The crate itself ships only
/// [`MockProvider`] and the orchestrating
/// [`ModelOrchestrator`](crate::orchestrator::ModelOrchestrator), which
/// implements this same trait so it can stand in for a single backend.
impl std::fmt::Debug for dyn TextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextGenerator").field("name", &self.name()).finish()
    }
}

pub trait TextGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        messages: &'a [Message],
        config: Option<&'a LlmConfig>,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;

    fn supports_tools(&self) -> bool {
        false
    }

    fn generate_with_tools<'a>(
        &'a self,
        _messages: &'a [Message],
        _tools: &'a [ToolSpec],
        _config: Option<&'a LlmConfig>,
    ) -> BoxFuture<'a, Result<ToolAssistedReply, ProviderError>> {
        Box::pin(futures::future::ready(Err(ProviderError::ToolsUnsupported(
            self.name().to_owned(),
        ))))
    }

    /// Short provider name used in logs and statistics.
    fn name(&self) -> &str {
        "unknown"
    }
}

type ProviderCreator =
    Box<dyn Fn() -> Result<Arc<dyn TextGenerator>, ProviderError> + Send + Sync>;

/// Registry of provider creators, keyed by name.
///
/// Keeps the orchestrator open for extension: new backends are plugged in by
/// registering a closure, not by modifying selection code.
#[derive(Default)]
pub struct ProviderRegistry {
    creators: HashMap<String, ProviderCreator>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            creators: HashMap::new(),
        }
    }

    /// A registry with the built-in mock provider preinstalled.
    pub fn with_mock() -> Self {
        let mut registry = Self::new();
        registry.register("mock", || Ok(Arc::new(MockProvider::default())));
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, creator: F)
    where
        F: Fn() -> Result<Arc<dyn TextGenerator>, ProviderError> + Send + Sync + 'static,
    {
        self.creators.insert(name.into(), Box::new(creator));
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn TextGenerator>, ProviderError> {
        match self.creators.get(name) {
            Some(creator) => creator(),
            None => Err(ProviderError::Creation(format!(
                "unknown provider type: '{name}'"
            ))),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.creators.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.creators.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Deterministic in-process provider for tests and offline runs.
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    default_response: String,
}

impl MockProvider {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            name: "mock".to_owned(),
            default_response: default_response.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Mock response")
    }
}

impl TextGenerator for MockProvider {
    fn generate<'a>(
        &'a self,
        messages: &'a [Message],
        _config: Option<&'a LlmConfig>,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            let last_user = messages
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::User)
                .map(|m| m.content.as_str())
                .unwrap_or_default();
            tracing::debug!("mock provider answering {} chars", last_user.len());
            Ok(self.default_response.clone())
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_returns_default_response() {
        let provider = MockProvider::new("canned");
        let reply = provider
            .generate(&[Message::user("hello")], None)
            .await
            .unwrap();
        assert_eq!(reply, "canned");
    }

    #[tokio::test]
    async fn test_tools_unsupported_by_default() {
        let provider = MockProvider::default();
        assert!(!provider.supports_tools());
        let err = provider
            .generate_with_tools(&[Message::user("hi")], &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ToolsUnsupported(_)));
    }

    #[test]
    fn test_registry_creates_registered_provider() {
        let registry = ProviderRegistry::with_mock();
        assert!(registry.contains("mock"));
        assert!(registry.create("mock").is_ok());
    }

    #[test]
    fn test_registry_unknown_provider() {
        let registry = ProviderRegistry::new();
        let err = registry.create("grok").unwrap_err();
        assert!(matches!(err, ProviderError::Creation(_)));
    }

    #[test]
    fn test_message_serialization_roles() {
        let json = serde_json::to_string(&Message::system("s")).unwrap();
        assert!(json.contains("\"role\":\"system\""));
    }
}
