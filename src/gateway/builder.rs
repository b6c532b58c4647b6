//! Builder for configuring router instances

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::Router;
use crate::backends::remote::{DEFAULT_REMOTE_TIMEOUT, DEFAULT_TEMPERATURE};
use crate::backends::{
    Backend, LocalBackend, LocalModel, OpenAiClient, RemoteBackend, RemoteClient,
};
use crate::cache::{CacheConfig, ResponseCache};
use crate::catalog::{BackendKind, ModelCatalog};
use crate::dispatcher::FailoverDispatcher;
use crate::routing::{ModelSelector, SelectorConfig};
use crate::sink::{MetricsSink, RecorderSink};
use crate::tokenizer::{TokenBudgetEstimator, TokenizerProvider};
use crate::{Result, RouterError};

/// Builder for configuring [`Router`] instances.
///
/// Only the local model is required; everything else has a default:
///
/// - catalog: the built-in three-tier catalog
/// - remote backends: disabled until a client or API key is set
/// - tokenizers: [`TokenBudgetEstimator::with_defaults`]
/// - cache: unbounded
/// - metrics: [`RecorderSink`]
pub struct RouterBuilder {
    catalog: Option<ModelCatalog>,
    local_model: Option<Arc<dyn LocalModel>>,
    local_overrides: HashMap<String, Arc<dyn LocalModel>>,
    remote_client: Option<Arc<dyn RemoteClient>>,
    remote_timeout: Duration,
    temperature: f32,
    estimator: Option<TokenBudgetEstimator>,
    kind_tokenizers: Vec<(BackendKind, Arc<dyn TokenizerProvider>)>,
    backend_tokenizers: Vec<(String, Arc<dyn TokenizerProvider>)>,
    selector_config: SelectorConfig,
    cache: Option<Arc<ResponseCache>>,
    cache_config: CacheConfig,
    metrics: Option<Arc<dyn MetricsSink>>,
    fallback_message: Option<String>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            catalog: None,
            local_model: None,
            local_overrides: HashMap::new(),
            remote_client: None,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            temperature: DEFAULT_TEMPERATURE,
            estimator: None,
            kind_tokenizers: Vec::new(),
            backend_tokenizers: Vec::new(),
            selector_config: SelectorConfig::default(),
            cache: None,
            cache_config: CacheConfig::default(),
            metrics: None,
            fallback_message: None,
        }
    }

    /// Use a custom model catalog.
    pub fn catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Model serving every local catalog entry.
    pub fn local_model(mut self, model: Arc<dyn LocalModel>) -> Self {
        self.local_model = Some(model);
        self
    }

    /// Model serving one specific local catalog entry.
    pub fn local_model_for(
        mut self,
        backend_id: impl Into<String>,
        model: Arc<dyn LocalModel>,
    ) -> Self {
        self.local_overrides.insert(backend_id.into(), model);
        self
    }

    /// Client serving every remote catalog entry.
    ///
    /// Without a client, remote entries are treated as unavailable
    /// (no credentials).
    pub fn remote_client(mut self, client: Arc<dyn RemoteClient>) -> Self {
        self.remote_client = Some(client);
        self
    }

    /// Serve remote entries through the OpenAI API.
    pub fn openai(self, api_key: impl Into<String>) -> Self {
        self.remote_client(Arc::new(OpenAiClient::new(api_key)))
    }

    /// Per-request timeout for remote calls (default: 10s).
    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Sampling temperature for remote calls (default: 0.7).
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Replace the default token estimator.
    pub fn estimator(mut self, estimator: TokenBudgetEstimator) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Register a tokenizer for every backend of a kind.
    pub fn tokenizer_for_kind(
        mut self,
        kind: BackendKind,
        tokenizer: Arc<dyn TokenizerProvider>,
    ) -> Self {
        self.kind_tokenizers.push((kind, tokenizer));
        self
    }

    /// Register a tokenizer for one backend.
    pub fn tokenizer_for_backend(
        mut self,
        backend_id: impl Into<String>,
        tokenizer: Arc<dyn TokenizerProvider>,
    ) -> Self {
        self.backend_tokenizers.push((backend_id.into(), tokenizer));
        self
    }

    /// Selection thresholds.
    pub fn selector_config(mut self, config: SelectorConfig) -> Self {
        self.selector_config = config;
        self
    }

    /// Share an existing response cache (e.g. with the ingestion
    /// pipeline). Takes precedence over [`cache_config`](Self::cache_config).
    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Configure the router's own response cache.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Metrics sink (default: [`RecorderSink`]).
    pub fn metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    /// Text returned when every backend fails.
    pub fn fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = Some(message.into());
        self
    }

    /// Build the router.
    ///
    /// Fails with [`RouterError::Configuration`] if a local catalog entry
    /// has no model.
    pub fn build(self) -> Result<Router> {
        let catalog = Arc::new(self.catalog.unwrap_or_default());

        let mut estimator = self.estimator.unwrap_or_else(TokenBudgetEstimator::with_defaults);
        for (kind, tokenizer) in self.kind_tokenizers {
            estimator.register_kind(kind, tokenizer);
        }
        for (id, tokenizer) in self.backend_tokenizers {
            estimator.register_backend(id, tokenizer);
        }
        let estimator = Arc::new(estimator);

        let mut backends: Vec<Arc<dyn Backend>> = Vec::with_capacity(catalog.len());
        for descriptor in catalog.local_candidates() {
            let model = self
                .local_overrides
                .get(&descriptor.id)
                .or(self.local_model.as_ref())
                .ok_or_else(|| {
                    RouterError::Configuration(format!(
                        "no local model configured for {}",
                        descriptor.id
                    ))
                })?;
            backends.push(Arc::new(LocalBackend::new(
                descriptor.clone(),
                Arc::clone(model),
                Arc::clone(&estimator),
            )));
        }

        let credentials_available = self.remote_client.is_some();
        if let Some(client) = &self.remote_client {
            for descriptor in catalog.remote_candidates() {
                let backend = RemoteBackend::new(
                    descriptor.clone(),
                    Arc::clone(client),
                    Arc::clone(&estimator),
                );
                backends.push(Arc::new(
                    backend
                        .timeout(self.remote_timeout)
                        .temperature(self.temperature),
                ));
            }
        }

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(ResponseCache::new(&self.cache_config)));
        let sink = self.metrics.unwrap_or_else(|| Arc::new(RecorderSink));

        let mut dispatcher =
            FailoverDispatcher::new(Arc::clone(&catalog), backends, Arc::clone(&cache), sink)?;
        if let Some(message) = self.fallback_message {
            dispatcher = dispatcher.fallback_message(message);
        }

        let selector = ModelSelector::new(Arc::clone(&catalog), estimator, self.selector_config);

        Ok(Router {
            catalog,
            selector,
            dispatcher,
            cache,
            credentials_available,
        })
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
