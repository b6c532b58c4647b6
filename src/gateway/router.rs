//! The composed question-answering router.

use std::sync::Arc;

use tracing::instrument;

use super::RouterBuilder;
use crate::cache::{DocumentVersion, IngestionHandle, ResponseCache};
use crate::catalog::ModelCatalog;
use crate::dispatcher::{FailoverDispatcher, GenerateResult};
use crate::routing::ModelSelector;

/// Default generation budget in tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 400;

/// Routes questions to a backend, fails over on error and caches answers
/// per document version.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use vegvisir::{CommandModel, Router};
/// # async fn example() -> vegvisir::Result<()> {
/// let router = Router::builder()
///     .local_model(Arc::new(CommandModel::new("llama-cli").args(["-m", "qa.gguf"])))
///     .openai(std::env::var("OPENAI_API_KEY").unwrap_or_default())
///     .build()?;
///
/// let answer = router.generate("What is PTO?", "", 400).await;
/// println!("{} (via {})", answer.text, answer.backend_id);
///
/// // after the document store changes:
/// router.bump_and_clear();
/// # Ok(())
/// # }
/// ```
pub struct Router {
    pub(super) catalog: Arc<ModelCatalog>,
    pub(super) selector: ModelSelector,
    pub(super) dispatcher: FailoverDispatcher,
    pub(super) cache: Arc<ResponseCache>,
    pub(super) credentials_available: bool,
}

impl Router {
    /// Create a new builder for configuring the router.
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Answer `question`, optionally grounded on retrieved `context`.
    ///
    /// Never fails: when every backend fails the degraded fallback payload
    /// is returned (see [`GenerateResult::is_fallback`]).
    #[instrument(skip_all, fields(question_len = question.len(), context_len = context.len()))]
    pub async fn generate(&self, question: &str, context: &str, max_tokens: u32) -> GenerateResult {
        let context_length = if context.is_empty() {
            0
        } else {
            self.selector.estimate(context)
        };
        let primary = self.select_model(question, context_length);
        let prompt = build_prompt(question, context);
        self.dispatcher
            .generate(primary, &prompt, question, max_tokens)
            .await
    }

    /// The backend id `generate` would try first.
    pub fn select_model(&self, question: &str, context_length: usize) -> &str {
        self.selector
            .select(question, context_length, self.credentials_available)
    }

    /// Advance the document version and drop every cached answer.
    pub fn bump_and_clear(&self) -> DocumentVersion {
        self.cache.bump_and_clear()
    }

    /// Handle for the document ingestion pipeline.
    pub fn ingestion_handle(&self) -> IngestionHandle {
        IngestionHandle::new(Arc::clone(&self.cache))
    }

    pub fn document_version(&self) -> DocumentVersion {
        self.cache.current_version()
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Whether remote backends are configured.
    pub fn credentials_available(&self) -> bool {
        self.credentials_available
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("dispatcher", &self.dispatcher)
            .field("document_version", &self.document_version())
            .field("credentials_available", &self.credentials_available)
            .finish_non_exhaustive()
    }
}

/// Prompt sent to backends.
pub fn build_prompt(question: &str, context: &str) -> String {
    if context.is_empty() {
        format!("Question: {question}\nAnswer:")
    } else {
        format!("Context:\n{context}\n\nQuestion: {question}\nAnswer:")
    }
}
