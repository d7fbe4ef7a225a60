use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::metrics::MetricsCollector;
use crate::model_selector::{ModelSelector, SelectionCriteria, SelectionError};
use crate::provider::{LlmConfig, Message, MessageRole, ProviderError, ProviderRegistry, TextGenerator};

/// Raw orchestrator counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub fallback_used: u64,
    pub provider_usage: HashMap<String, u64>,
}

/// Counters plus derived rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub stats: OrchestratorStats,
    pub success_rate: f64,
    pub fallback_rate: f64,
}

struct OrchestratorState {
    criteria: SelectionCriteria,
    stats: OrchestratorStats,
    cache: HashMap<String, Arc<dyn TextGenerator>>,
}

/// Multi-model orchestrator with criteria-scored selection and fallback.
///
/// Implements [`TextGenerator`] so it can be dropped in wherever a single
/// backend is expected. Selection delegates to [`ModelSelector`]; provider
/// instances come from the injected [`ProviderRegistry`] and are cached for
/// the life of the orchestrator. Statistics and the cache share one mutex,
/// held only for individual reads and writes.
pub struct ModelOrchestrator {
    registry: ProviderRegistry,
    selector: ModelSelector,
    available_providers: Vec<String>,
    enable_fallback: bool,
    max_fallback_attempts: usize,
    state: Mutex<OrchestratorState>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ModelOrchestrator {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self::with_providers(
            registry,
            vec![
                "qwen3_zerogpu".to_owned(),
                "tongyi-local".to_owned(),
                "grok".to_owned(),
            ],
        )
    }

    pub fn with_providers(registry: ProviderRegistry, available_providers: Vec<String>) -> Self {
        tracing::info!(
            providers = ?available_providers,
            "model orchestrator initialized"
        );
        Self {
            registry,
            selector: ModelSelector::new(),
            available_providers,
            enable_fallback: true,
            max_fallback_attempts: 3,
            state: Mutex::new(OrchestratorState {
                criteria: SelectionCriteria::Balanced,
                stats: OrchestratorStats::default(),
                cache: HashMap::new(),
            }),
            metrics: None,
        }
    }

    pub fn with_selector(mut self, selector: ModelSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_criteria(self, criteria: SelectionCriteria) -> Self {
        self.set_criteria(criteria);
        self
    }

    pub fn with_fallback(mut self, enable: bool) -> Self {
        self.enable_fallback = enable;
        self
    }

    pub fn with_max_fallback_attempts(mut self, attempts: usize) -> Self {
        self.max_fallback_attempts = attempts;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn set_criteria(&self, criteria: SelectionCriteria) {
        self.lock().criteria = criteria;
        tracing::info!(criteria = criteria.as_str(), "selection criteria updated");
    }

    pub fn criteria(&self) -> SelectionCriteria {
        self.lock().criteria
    }

    pub fn stats(&self) -> StatsSnapshot {
        let stats = self.lock().stats.clone();
        let total = stats.total_requests;
        let (success_rate, fallback_rate) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                stats.successful_requests as f64 / total as f64 * 100.0,
                stats.fallback_used as f64 / total as f64 * 100.0,
            )
        };
        StatsSnapshot {
            stats,
            success_rate,
            fallback_rate,
        }
    }

    pub fn model_info(&self, provider: &str) -> Option<crate::model_selector::ModelCapabilities> {
        self.selector.model_info(provider).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state.lock().expect("orchestrator state lock poisoned")
    }

    /// Cached provider instance, creating it on first use.
    fn provider_for(&self, name: &str) -> Result<Arc<dyn TextGenerator>, ProviderError> {
        if let Some(provider) = self.lock().cache.get(name) {
            return Ok(Arc::clone(provider));
        }
        tracing::info!(provider = name, "creating provider");
        let created = self.registry.create(name)?;
        Ok(Arc::clone(
            self.lock()
                .cache
                .entry(name.to_owned())
                .or_insert(created),
        ))
    }

    async fn generate_inner(
        &self,
        messages: &[Message],
        config: Option<&LlmConfig>,
    ) -> Result<String, ProviderError> {
        let criteria = {
            let mut state = self.lock();
            state.stats.total_requests += 1;
            state.criteria
        };

        let task_description = extract_task_description(messages);

        let primary = self
            .selector
            .select_model(
                criteria,
                Some(&self.available_providers),
                Some(&task_description),
            )
            .map_err(|e: SelectionError| ProviderError::Creation(e.to_string()))?;

        let mut chain = if self.enable_fallback {
            self.selector
                .fallback_chain(&primary, criteria, Some(&self.available_providers))
        } else {
            vec![primary.clone()]
        };
        chain.truncate(self.max_fallback_attempts);

        tracing::info!(%primary, chain = ?chain, "provider chain selected");

        let started = Instant::now();
        let mut last_error: Option<ProviderError> = None;

        for (idx, provider_name) in chain.iter().enumerate() {
            let is_fallback = idx > 0;
            if is_fallback {
                self.lock().stats.fallback_used += 1;
                tracing::warn!(
                    provider = provider_name.as_str(),
                    attempt = idx + 1,
                    of = chain.len(),
                    "falling back"
                );
            }

            let provider = match self.provider_for(provider_name) {
                Ok(provider) => provider,
                Err(creation_error) => {
                    tracing::error!(
                        provider = provider_name.as_str(),
                        "provider creation failed: {creation_error}"
                    );
                    last_error = Some(creation_error);
                    continue;
                }
            };

            match provider.generate(messages, config).await {
                Ok(response) => {
                    {
                        let mut state = self.lock();
                        state.stats.successful_requests += 1;
                        *state
                            .stats
                            .provider_usage
                            .entry(provider_name.clone())
                            .or_insert(0) += 1;
                    }
                    tracing::info!(
                        provider = provider_name.as_str(),
                        fallback = is_fallback,
                        "generation successful"
                    );
                    self.record_selection(
                        &task_description,
                        criteria,
                        provider_name,
                        &chain,
                        is_fallback,
                        started.elapsed().as_secs_f64(),
                        true,
                        None,
                    );
                    return Ok(response);
                }
                Err(generation_error) => {
                    tracing::error!(
                        provider = provider_name.as_str(),
                        "generation failed: {generation_error}"
                    );
                    last_error = Some(generation_error);
                }
            }
        }

        self.lock().stats.failed_requests += 1;
        let last_message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "fallback chain was empty".to_owned());
        self.record_selection(
            &task_description,
            criteria,
            &primary,
            &chain,
            chain.len() > 1,
            started.elapsed().as_secs_f64(),
            false,
            Some(last_message.clone()),
        );
        Err(ProviderError::FallbackExhausted {
            last_error: last_message,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn record_selection(
        &self,
        task_description: &str,
        criteria: SelectionCriteria,
        selected: &str,
        chain: &[String],
        fallback_used: bool,
        latency_seconds: f64,
        success: bool,
        error: Option<String>,
    ) {
        if let Some(metrics) = &self.metrics {
            metrics.record_model_selection(
                task_description,
                criteria.as_str(),
                selected,
                chain.to_vec(),
                fallback_used,
                latency_seconds,
                success,
                error,
            );
        }
    }
}

impl TextGenerator for ModelOrchestrator {
    fn generate<'a>(
        &'a self,
        messages: &'a [Message],
        config: Option<&'a LlmConfig>,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(self.generate_inner(messages, config))
    }

    fn name(&self) -> &str {
        "orchestrator"
    }
}

/// Task description for selection purposes: the last user message.
fn extract_task_description(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}
