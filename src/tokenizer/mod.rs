//! Best-effort token counting per backend.
//!
//! [`TokenBudgetEstimator`] maps backends to exact tokenizers where one is
//! registered and falls back to a word-count heuristic otherwise. It never
//! fails: routing decisions only need a usable estimate.

#[cfg(feature = "hf-tokenizer")]
mod hf;
#[cfg(feature = "tiktoken")]
mod tiktoken;

#[cfg(feature = "hf-tokenizer")]
pub use hf::HfTokenizer;
#[cfg(feature = "tiktoken")]
pub use tiktoken::TiktokenTokenizer;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::{BackendKind, ModelDescriptor};
use crate::error::Result;

/// Exact token counter for one model family.
pub trait TokenizerProvider: Send + Sync {
    /// Count tokens in the given text.
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// Heuristic estimate used when no exact tokenizer is available:
/// `round(word_count * 1.3)`.
pub fn heuristic_estimate(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 * 1.3).round() as usize
}

/// Per-backend token estimator.
///
/// Resolution order for a backend: tokenizer registered for its id, then
/// one registered for its [`BackendKind`], then [`heuristic_estimate`].
/// Tokenizer errors also fall through to the heuristic.
#[derive(Default)]
pub struct TokenBudgetEstimator {
    by_backend: HashMap<String, Arc<dyn TokenizerProvider>>,
    by_kind: HashMap<BackendKind, Arc<dyn TokenizerProvider>>,
}

impl TokenBudgetEstimator {
    /// Create an estimator with no tokenizers (heuristic only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an estimator with the built-in tokenizers.
    ///
    /// With the `tiktoken` feature, remote backends use cl100k_base. If the
    /// encoding cannot be loaded the heuristic is used instead.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut estimator = Self::new();

        #[cfg(feature = "tiktoken")]
        match TiktokenTokenizer::cl100k() {
            Ok(tokenizer) => estimator.register_kind(BackendKind::Remote, Arc::new(tokenizer)),
            Err(e) => tracing::warn!(error = %e, "cl100k_base unavailable, using heuristic"),
        }

        estimator
    }

    /// Register a tokenizer for every backend of the given kind.
    pub fn register_kind(&mut self, kind: BackendKind, tokenizer: Arc<dyn TokenizerProvider>) {
        self.by_kind.insert(kind, tokenizer);
    }

    /// Register a tokenizer for a specific backend id.
    ///
    /// Takes precedence over the kind-level tokenizer.
    pub fn register_backend(
        &mut self,
        backend_id: impl Into<String>,
        tokenizer: Arc<dyn TokenizerProvider>,
    ) {
        self.by_backend.insert(backend_id.into(), tokenizer);
    }

    /// Estimate tokens in `text` for the given backend.
    pub fn estimate(&self, text: &str, backend: &ModelDescriptor) -> usize {
        let tokenizer = self
            .by_backend
            .get(&backend.id)
            .or_else(|| self.by_kind.get(&backend.kind));
        Self::count_or_estimate(tokenizer, text, &backend.id)
    }

    /// Estimate tokens in `text` using the tokenizer for a backend kind.
    pub fn estimate_for_kind(&self, text: &str, kind: BackendKind) -> usize {
        Self::count_or_estimate(self.by_kind.get(&kind), text, "-")
    }

    fn count_or_estimate(
        tokenizer: Option<&Arc<dyn TokenizerProvider>>,
        text: &str,
        backend: &str,
    ) -> usize {
        match tokenizer.map(|t| t.count_tokens(text)) {
            Some(Ok(count)) => count,
            Some(Err(e)) => {
                debug!(backend, error = %e, "tokenizer failed, using heuristic");
                heuristic_estimate(text)
            }
            None => heuristic_estimate(text),
        }
    }
}

impl std::fmt::Debug for TokenBudgetEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBudgetEstimator")
            .field("backends", &self.by_backend.keys().collect::<Vec<_>>())
            .field("kinds", &self.by_kind.keys().collect::<Vec<_>>())
            .finish()
    }
}
