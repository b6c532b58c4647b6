//! Primary backend selection.
//!
//! [`ModelSelector`] is a deterministic function of the question, the
//! context length, credential availability and the static catalog. It has
//! no hidden state: identical inputs always produce the same backend id.
//!
//! ```text
//! question tokens < short_question_tokens        → cheapest local
//! question + context > long_context_tokens       → largest-context remote (or local)
//! otherwise                                      → cheapest remote (or local)
//! ```

use std::sync::Arc;

use serde::Deserialize;

use crate::catalog::{BackendKind, ModelCatalog, ModelDescriptor};
use crate::tokenizer::TokenBudgetEstimator;

/// Token thresholds for tier selection.
///
/// ```toml
/// [selector]
/// short_question_tokens = 50
/// long_context_tokens = 2000
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SelectorConfig {
    /// Questions estimated below this go to the cheapest local backend.
    #[serde(default = "default_short_question_tokens")]
    pub short_question_tokens: usize,
    /// Question + context above this go to the largest-context backend.
    #[serde(default = "default_long_context_tokens")]
    pub long_context_tokens: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            short_question_tokens: default_short_question_tokens(),
            long_context_tokens: default_long_context_tokens(),
        }
    }
}

fn default_short_question_tokens() -> usize {
    50
}

fn default_long_context_tokens() -> usize {
    2000
}

/// Maps a query to its primary backend id.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    catalog: Arc<ModelCatalog>,
    estimator: Arc<TokenBudgetEstimator>,
    config: SelectorConfig,
}

impl ModelSelector {
    pub fn new(
        catalog: Arc<ModelCatalog>,
        estimator: Arc<TokenBudgetEstimator>,
        config: SelectorConfig,
    ) -> Self {
        Self {
            catalog,
            estimator,
            config,
        }
    }

    /// Estimate tokens the way the selector does (remote tokenizer).
    pub fn estimate(&self, text: &str) -> usize {
        self.estimator.estimate_for_kind(text, BackendKind::Remote)
    }

    /// Choose the primary backend for a question.
    ///
    /// `context_length` is the estimated token count of the retrieved
    /// context that will accompany the question.
    pub fn select(
        &self,
        question: &str,
        context_length: usize,
        credentials_available: bool,
    ) -> &str {
        let question_tokens = self.estimate(question);
        let local = self.cheapest_local();

        if question_tokens < self.config.short_question_tokens {
            return &local.id;
        }

        if !credentials_available {
            return &local.id;
        }

        let total = question_tokens.saturating_add(context_length);
        let remote = if total > self.config.long_context_tokens {
            self.highest_capacity_remote()
        } else {
            self.mid_tier_remote()
        };
        remote.map_or(&local.id, |m| &m.id)
    }

    fn cheapest_local(&self) -> &ModelDescriptor {
        self.catalog.cheapest_local()
    }

    /// Remote descriptor with the largest context window; ties go to the
    /// higher priority.
    fn highest_capacity_remote(&self) -> Option<&ModelDescriptor> {
        self.catalog.remote_candidates().max_by(|a, b| {
            a.max_context
                .cmp(&b.max_context)
                .then(b.priority.cmp(&a.priority))
        })
    }

    /// Cheapest remote descriptor.
    fn mid_tier_remote(&self) -> Option<&ModelDescriptor> {
        self.catalog
            .remote_candidates()
            .min_by(|a, b| a.cost_per_token.total_cmp(&b.cost_per_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(catalog: ModelCatalog) -> ModelSelector {
        ModelSelector::new(
            Arc::new(catalog),
            Arc::new(TokenBudgetEstimator::new()),
            SelectorConfig::default(),
        )
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn config_defaults() {
        let config = SelectorConfig::default();
        assert_eq!(config.short_question_tokens, 50);
        assert_eq!(config.long_context_tokens, 2000);
    }

    #[test]
    fn config_partial_toml_keeps_defaults() {
        let config: SelectorConfig = toml::from_str("long_context_tokens = 3000").unwrap();
        assert_eq!(config.short_question_tokens, 50);
        assert_eq!(config.long_context_tokens, 3000);
    }

    #[test]
    fn short_question_prefers_local() {
        let s = selector(ModelCatalog::default());
        assert_eq!(s.select("What is PTO?", 0, true), "local_gpt2");
        assert_eq!(s.select("What is PTO?", 5000, true), "local_gpt2");
    }

    #[test]
    fn boundary_at_short_threshold() {
        let s = selector(ModelCatalog::default());
        // 38 words -> round(49.4) = 49 tokens: still short
        assert_eq!(s.select(&words(38), 0, true), "local_gpt2");
        // 39 words -> round(50.7) = 51 tokens: mid tier
        assert_eq!(s.select(&words(39), 0, true), "gpt-3.5-turbo");
    }

    #[test]
    fn long_context_boundary_is_exclusive() {
        let s = selector(ModelCatalog::default());
        let question = words(40); // 52 tokens
        assert_eq!(s.select(&question, 1948, true), "gpt-3.5-turbo");
        assert_eq!(s.select(&question, 1949, true), "gpt-4");
    }

    #[test]
    fn huge_context_length_saturates_to_long_tier() {
        let s = selector(ModelCatalog::default());
        assert_eq!(s.select(&words(60), usize::MAX, true), "gpt-4");
    }

    #[test]
    fn highest_capacity_ties_go_to_higher_priority() {
        let catalog = ModelCatalog::new(vec![
            ModelDescriptor::local("local", "Local", 1),
            ModelDescriptor::remote("a", "A", 0.01, 8192, 2),
            ModelDescriptor::remote("b", "B", 0.02, 8192, 3),
        ])
        .unwrap();
        let s = selector(catalog);
        assert_eq!(s.select(&words(60), 5000, true), "a");
    }

    #[test]
    fn remote_less_catalog_always_local() {
        let catalog = ModelCatalog::new(vec![ModelDescriptor::local("only", "Only", 1)]).unwrap();
        let s = selector(catalog);
        assert_eq!(s.select(&words(60), 5000, true), "only");
        assert_eq!(s.select(&words(60), 0, true), "only");
    }
}
