use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to optimise for when picking a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionCriteria {
    Speed,
    Quality,
    Cost,
    Privacy,
    Balanced,
}

impl SelectionCriteria {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionCriteria::Speed => "speed",
            SelectionCriteria::Quality => "quality",
            SelectionCriteria::Cost => "cost",
            SelectionCriteria::Privacy => "privacy",
            SelectionCriteria::Balanced => "balanced",
        }
    }
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no models available for selection")]
    NoModels,
    #[error(
        "scoring weights must sum to 1.0 (got {total}): quality={quality}, speed={speed}, cost={cost}, privacy={privacy}"
    )]
    InvalidWeights {
        total: f64,
        quality: f64,
        speed: f64,
        cost: f64,
        privacy: f64,
    },
}

/// Weights for [`SelectionCriteria::Balanced`] scoring. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub quality: f64,
    pub speed: f64,
    pub cost: f64,
    pub privacy: f64,
}

impl ScoringWeights {
    pub fn new(quality: f64, speed: f64, cost: f64, privacy: f64) -> Result<Self, SelectionError> {
        let total = quality + speed + cost + privacy;
        // Tolerate small floating point error around 1.0.
        if !(0.99..=1.01).contains(&total) {
            return Err(SelectionError::InvalidWeights {
                total,
                quality,
                speed,
                cost,
                privacy,
            });
        }
        Ok(Self {
            quality,
            speed,
            cost,
            privacy,
        })
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            quality: 0.4,
            speed: 0.3,
            cost: 0.3,
            privacy: 0.0,
        }
    }
}

/// Capability and cost profile of one model backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub name: String,
    /// Fraction of benchmark interactions answered acceptably, 0.0-1.0.
    pub success_rate: f64,
    pub avg_latency_s: f64,
    pub cost_per_month_usd: f64,
    pub requires_internet: bool,
    pub max_tokens: u64,
    pub supports_tools: bool,
}

impl ModelCapabilities {
    /// Selection score for one criterion, 0.0-100.0, higher is better.
    pub fn score(&self, criteria: SelectionCriteria, weights: Option<&ScoringWeights>) -> f64 {
        match criteria {
            // 10s latency scores 100, 30s scores 33, 60s scores 17.
            SelectionCriteria::Speed => {
                (10.0 / self.avg_latency_s.max(1.0) * 100.0).min(100.0)
            }
            SelectionCriteria::Quality => self.success_rate * 100.0,
            // Free scores 100, $50/month scores 0.
            SelectionCriteria::Cost => (100.0 - self.cost_per_month_usd * 2.0).max(0.0),
            SelectionCriteria::Privacy => {
                if self.requires_internet { 0.0 } else { 100.0 }
            }
            SelectionCriteria::Balanced => {
                let default_weights = ScoringWeights::default();
                let weights = weights.unwrap_or(&default_weights);
                self.score(SelectionCriteria::Quality, None) * weights.quality
                    + self.score(SelectionCriteria::Speed, None) * weights.speed
                    + self.score(SelectionCriteria::Cost, None) * weights.cost
                    + self.score(SelectionCriteria::Privacy, None) * weights.privacy
            }
        }
    }
}

/// Picks a model backend by criteria and builds fallback chains.
///
/// Models are kept in registration order; score ties resolve to the earliest
/// registered model.
pub struct ModelSelector {
    models: Vec<(String, ModelCapabilities)>,
    scoring_weights: Option<ScoringWeights>,
}

impl ModelSelector {
    pub fn new() -> Self {
        Self {
            models: default_capabilities(),
            scoring_weights: None,
        }
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.scoring_weights = Some(weights);
        self
    }

    /// Replace the built-in capability table.
    pub fn with_models(mut self, models: Vec<(String, ModelCapabilities)>) -> Self {
        self.models = models;
        self
    }

    pub fn register_model(&mut self, provider: impl Into<String>, caps: ModelCapabilities) {
        self.models.push((provider.into(), caps));
    }

    pub fn model_info(&self, provider: &str) -> Option<&ModelCapabilities> {
        self.models
            .iter()
            .find(|(name, _)| name == provider)
            .map(|(_, caps)| caps)
    }

    /// Select the best provider for the criteria.
    ///
    /// Keywords in the task description override the configured criteria:
    /// "offline/local/private" demand privacy, "fast/quick/urgent" speed,
    /// "accurate/quality/critical" quality, "cheap/budget" cost.
    pub fn select_model(
        &self,
        criteria: SelectionCriteria,
        available_providers: Option<&[String]>,
        task_description: Option<&str>,
    ) -> Result<String, SelectionError> {
        let criteria = match task_description {
            Some(description) => analyze_task_requirements(description, criteria),
            None => criteria,
        };

        let mut best: Option<(&str, f64)> = None;
        for (name, caps) in self.candidates(available_providers) {
            let score = caps.score(criteria, self.scoring_weights.as_ref());
            // Strict comparison keeps the earliest registered model on ties.
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((name, score));
            }
        }

        best.map(|(name, score)| {
            tracing::debug!(
                provider = name,
                score,
                criteria = criteria.as_str(),
                "model selected"
            );
            name.to_owned()
        })
        .ok_or(SelectionError::NoModels)
    }

    /// Fallback chain: the primary, the next best model by the same
    /// criterion, then the most reliable remaining model, deduplicated.
    pub fn fallback_chain(
        &self,
        primary: &str,
        criteria: SelectionCriteria,
        available_providers: Option<&[String]>,
    ) -> Vec<String> {
        let mut chain = vec![primary.to_owned()];

        let remaining: Vec<(&str, &ModelCapabilities)> = self
            .candidates(available_providers)
            .filter(|(name, _)| *name != primary)
            .collect();

        let next_best = remaining
            .iter()
            .cloned()
            .max_by(|(_, a), (_, b)| {
                let a = a.score(criteria, self.scoring_weights.as_ref());
                let b = b.score(criteria, self.scoring_weights.as_ref());
                a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(name, _)| name.to_owned());
        if let Some(next_best) = next_best {
            chain.push(next_best);
        }

        let most_reliable = self
            .candidates(available_providers)
            .max_by(|(_, a), (_, b)| {
                a.success_rate
                    .partial_cmp(&b.success_rate)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(name, _)| name.to_owned());
        if let Some(most_reliable) = most_reliable {
            if !chain.contains(&most_reliable) {
                chain.push(most_reliable);
            }
        }

        chain
    }

    fn candidates<'a>(
        &'a self,
        available_providers: Option<&'a [String]>,
    ) -> impl Iterator<Item = (&'a str, &'a ModelCapabilities)> {
        self.models.iter().filter_map(move |(name, caps)| {
            let included = available_providers
                .map(|available| available.iter().any(|a| a == name))
                .unwrap_or(true);
            included.then_some((name.as_str(), caps))
        })
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Infer criteria overrides from task description keywords.
fn analyze_task_requirements(
    description: &str,
    default_criteria: SelectionCriteria,
) -> SelectionCriteria {
    let desc = description.to_lowercase();
    let matches = |kws: &[&str]| kws.iter().any(|kw| desc.contains(kw));

    if matches(&["offline", "local", "private", "confidential"]) {
        SelectionCriteria::Privacy
    } else if matches(&["fast", "quick", "urgent", "real-time"]) {
        SelectionCriteria::Speed
    } else if matches(&["accurate", "quality", "critical", "important"]) {
        SelectionCriteria::Quality
    } else if matches(&["cheap", "cost-effective", "budget"]) {
        SelectionCriteria::Cost
    } else {
        default_criteria
    }
}

/// Built-in capability table, from benchmark evaluation data.
fn default_capabilities() -> Vec<(String, ModelCapabilities)> {
    vec![
        (
            "qwen3_zerogpu".to_owned(),
            ModelCapabilities {
                name: "Qwen3-8B-ZeroGPU".to_owned(),
                success_rate: 1.0,
                avg_latency_s: 13.8,
                cost_per_month_usd: 9.0,
                requires_internet: true,
                max_tokens: 2048,
                supports_tools: false,
            },
        ),
        (
            "tongyi-local".to_owned(),
            ModelCapabilities {
                name: "Tongyi-DeepResearch-30B-Local".to_owned(),
                success_rate: 0.987,
                avg_latency_s: 20.1,
                cost_per_month_usd: 31.67,
                requires_internet: false,
                max_tokens: 4096,
                supports_tools: false,
            },
        ),
        (
            "grok".to_owned(),
            ModelCapabilities {
                name: "Grok-2-Latest".to_owned(),
                success_rate: 0.95,
                avg_latency_s: 5.0,
                cost_per_month_usd: 50.0,
                requires_internet: true,
                max_tokens: 8192,
                supports_tools: true,
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(
        success_rate: f64,
        avg_latency_s: f64,
        cost: f64,
        requires_internet: bool,
    ) -> ModelCapabilities {
        ModelCapabilities {
            name: "test".to_owned(),
            success_rate,
            avg_latency_s,
            cost_per_month_usd: cost,
            requires_internet,
            max_tokens: 1024,
            supports_tools: false,
        }
    }

    #[test]
    fn test_speed_score_normalization() {
        assert_eq!(caps(1.0, 10.0, 0.0, true).score(SelectionCriteria::Speed, None), 100.0);
        let slow = caps(1.0, 30.0, 0.0, true).score(SelectionCriteria::Speed, None);
        assert!((slow - 33.333).abs() < 0.01);
        // Latency below 1s clamps at 100.
        assert_eq!(caps(1.0, 0.2, 0.0, true).score(SelectionCriteria::Speed, None), 100.0);
    }

    #[test]
    fn test_quality_and_cost_scores() {
        assert_eq!(caps(0.95, 10.0, 0.0, true).score(SelectionCriteria::Quality, None), 95.0);
        assert_eq!(caps(1.0, 10.0, 9.0, true).score(SelectionCriteria::Cost, None), 82.0);
        assert_eq!(caps(1.0, 10.0, 80.0, true).score(SelectionCriteria::Cost, None), 0.0);
    }

    #[test]
    fn test_privacy_score_is_binary() {
        assert_eq!(caps(1.0, 10.0, 0.0, false).score(SelectionCriteria::Privacy, None), 100.0);
        assert_eq!(caps(1.0, 10.0, 0.0, true).score(SelectionCriteria::Privacy, None), 0.0);
    }

    #[test]
    fn test_balanced_uses_default_weights() {
        let caps = caps(1.0, 10.0, 0.0, true);
        // quality 100*0.4 + speed 100*0.3 + cost 100*0.3 + privacy 0*0.0
        assert_eq!(caps.score(SelectionCriteria::Balanced, None), 100.0);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        assert!(ScoringWeights::new(0.4, 0.3, 0.3, 0.0).is_ok());
        assert!(ScoringWeights::new(0.25, 0.25, 0.25, 0.25).is_ok());
        assert!(ScoringWeights::new(0.5, 0.5, 0.5, 0.0).is_err());
    }

    #[test]
    fn test_privacy_selects_offline_model() {
        let selector = ModelSelector::new();
        let selected = selector
            .select_model(SelectionCriteria::Privacy, None, None)
            .unwrap();
        assert_eq!(selected, "tongyi-local");
    }

    #[test]
    fn test_keyword_override_to_privacy() {
        let selector = ModelSelector::new();
        let selected = selector
            .select_model(
                SelectionCriteria::Speed,
                None,
                Some("summarize this confidential offline document"),
            )
            .unwrap();
        assert_eq!(selected, "tongyi-local");
    }

    #[test]
    fn test_speed_selects_lowest_latency() {
        let selector = ModelSelector::new();
        let selected = selector
            .select_model(SelectionCriteria::Speed, None, None)
            .unwrap();
        assert_eq!(selected, "grok");
    }

    #[test]
    fn test_available_filter_restricts_choice() {
        let selector = ModelSelector::new();
        let available = vec!["qwen3_zerogpu".to_owned(), "tongyi-local".to_owned()];
        let selected = selector
            .select_model(SelectionCriteria::Speed, Some(&available), None)
            .unwrap();
        assert_eq!(selected, "qwen3_zerogpu");
    }

    #[test]
    fn test_empty_pool_is_an_error() {
        let selector = ModelSelector::new().with_models(vec![]);
        assert!(matches!(
            selector.select_model(SelectionCriteria::Balanced, None, None),
            Err(SelectionError::NoModels)
        ));
    }

    #[test]
    fn test_fallback_chain_shape() {
        let selector = ModelSelector::new();
        let chain = selector.fallback_chain("grok", SelectionCriteria::Quality, None);
        // Primary first, then next best by quality, then most reliable
        // (deduplicated: qwen3 is both next-best and most reliable).
        assert_eq!(chain[0], "grok");
        assert_eq!(chain[1], "qwen3_zerogpu");
        assert_eq!(chain.len(), 2);

        let mut unique = chain.clone();
        unique.dedup();
        assert_eq!(unique, chain);
    }

    #[test]
    fn test_tie_breaks_by_registration_order() {
        let selector = ModelSelector::new().with_models(vec![
            ("first".to_owned(), caps(0.9, 10.0, 0.0, true)),
            ("second".to_owned(), caps(0.9, 10.0, 0.0, true)),
        ]);
        let selected = selector
            .select_model(SelectionCriteria::Quality, None, None)
            .unwrap();
        assert_eq!(selected, "first");
    }
}
