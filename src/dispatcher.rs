//! Failover dispatch over the model catalog.
//!
//! [`FailoverDispatcher::generate`] walks a fixed sequence of states:
//!
//! ```text
//!   CACHE_CHECK ── hit ──────────────────────────────► return (cache_hit)
//!        │ miss
//!        ▼
//!   TRY_PRIMARY ── ok ──► cache write + metrics ─────► return
//!        │ error
//!        ▼
//!   TRY_NEXT (catalog by priority, primary excluded,
//!             unconfigured backends skipped)
//!        │ ok ──► cache write + metrics ─────────────► return
//!        │ all failed
//!        ▼
//!   RACE_RECHECK ── hit (another request succeeded) ─► return (cache_hit)
//!        │ miss
//!        ▼
//!   FALLBACK ─────────────────────────────────────────► fixed payload
//! ```
//!
//! Each candidate is tried at most once; there are no retries inside a
//! request. `generate` never returns an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::backends::{Backend, Generation};
use crate::cache::{CachedResponse, DocumentVersion, ResponseCache};
use crate::catalog::ModelCatalog;
use crate::sink::MetricsSink;
use crate::telemetry;
use crate::{Result, RouterError};

/// Backend id reported on the degraded fallback payload.
pub const FALLBACK_BACKEND_ID: &str = "fallback";

/// Default text of the degraded fallback payload.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "Service temporarily slow, try again in 30s";

/// Outcome of a dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResult {
    pub text: String,
    /// Generation latency in seconds. For cache hits this is the latency of
    /// the original generation.
    pub latency_s: f64,
    pub cost_usd: f64,
    pub backend_id: String,
    pub cache_hit: bool,
}

impl GenerateResult {
    /// The degraded payload returned when every backend failed.
    pub fn fallback(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            latency_s: 0.0,
            cost_usd: 0.0,
            backend_id: FALLBACK_BACKEND_ID.to_string(),
            cache_hit: false,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.backend_id == FALLBACK_BACKEND_ID
    }

    fn from_cache(entry: CachedResponse) -> Self {
        Self {
            text: entry.text,
            latency_s: entry.latency_s,
            cost_usd: entry.cost_usd,
            backend_id: entry.backend_id,
            cache_hit: true,
        }
    }
}

/// Tries the primary backend, then every other configured backend in
/// catalog priority order, caching the first success.
pub struct FailoverDispatcher {
    catalog: Arc<ModelCatalog>,
    backends: HashMap<String, Arc<dyn Backend>>,
    cache: Arc<ResponseCache>,
    sink: Arc<dyn MetricsSink>,
    fallback_message: String,
}

impl FailoverDispatcher {
    /// Create a dispatcher over `backends`.
    ///
    /// Every backend must serve a catalog entry. Catalog entries without a
    /// backend are legal (e.g. remote models without credentials) and are
    /// skipped during failover.
    pub fn new(
        catalog: Arc<ModelCatalog>,
        backends: Vec<Arc<dyn Backend>>,
        cache: Arc<ResponseCache>,
        sink: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(backends.len());
        for backend in backends {
            let id = backend.id().to_string();
            if catalog.get(&id).is_none() {
                return Err(RouterError::Configuration(format!(
                    "backend {id} is not in the model catalog"
                )));
            }
            if by_id.insert(id.clone(), backend).is_some() {
                return Err(RouterError::Configuration(format!(
                    "backend {id} registered twice"
                )));
            }
        }

        Ok(Self {
            catalog,
            backends: by_id,
            cache,
            sink,
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
        })
    }

    /// Replace the text of the degraded fallback payload.
    pub fn fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = message.into();
        self
    }

    /// Whether a backend is configured for `backend_id`.
    pub fn is_configured(&self, backend_id: &str) -> bool {
        self.backends.contains_key(backend_id)
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Answer `question` with `prompt`, starting at `primary_id`.
    ///
    /// `question` is the cache key; `prompt` is what the backend sees.
    #[instrument(skip(self, prompt, question))]
    pub async fn generate(
        &self,
        primary_id: &str,
        prompt: &str,
        question: &str,
        max_tokens: u32,
    ) -> GenerateResult {
        self.sink.log_query();

        let (version, cached) = self.cache.lookup(question);
        if let Some(entry) = cached {
            debug!(backend = %entry.backend_id, %version, "cache hit");
            self.sink.log_cache_hit();
            return GenerateResult::from_cache(entry);
        }
        self.sink.log_cache_miss();

        match self.attempt(primary_id, prompt, max_tokens).await {
            Ok(generation) => {
                return self.complete(primary_id, question, version, generation);
            }
            Err(e) => {
                warn!(
                    backend = %primary_id,
                    kind = %e.failure_kind(),
                    error = %e,
                    "primary backend failed"
                );
            }
        }

        for candidate in self.catalog.by_priority() {
            let id = candidate.id.as_str();
            if id == primary_id {
                continue;
            }
            if !self.is_configured(id) {
                debug!(backend = %id, "skipping unconfigured backend");
                continue;
            }

            metrics::counter!(telemetry::FAILOVERS_TOTAL, "backend" => id.to_owned())
                .increment(1);
            info!(backend = %id, "failing over");

            match self.attempt(id, prompt, max_tokens).await {
                Ok(generation) => return self.complete(id, question, version, generation),
                Err(e) => {
                    warn!(
                        backend = %id,
                        kind = %e.failure_kind(),
                        error = %e,
                        "failover backend failed"
                    );
                }
            }
        }

        // A concurrent request for the same question may have succeeded
        // while every candidate failed for this one.
        if let (_, Some(entry)) = self.cache.lookup(question) {
            debug!(backend = %entry.backend_id, "answered by concurrent request");
            self.sink.log_cache_hit();
            return GenerateResult::from_cache(entry);
        }

        error!(primary = %primary_id, "all backends failed, returning fallback");
        metrics::counter!(telemetry::FALLBACK_RESPONSES_TOTAL).increment(1);
        GenerateResult::fallback(&self.fallback_message)
    }

    /// Invoke one backend, recording request metrics.
    async fn attempt(&self, backend_id: &str, prompt: &str, max_tokens: u32) -> Result<Generation> {
        let backend = self
            .backends
            .get(backend_id)
            .ok_or_else(|| RouterError::UnknownBackend(backend_id.to_string()))?;

        let start = Instant::now();
        let result = backend.generate(prompt, max_tokens).await;
        let elapsed = start.elapsed();

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "backend" => backend_id.to_owned(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "backend" => backend_id.to_owned(),
        )
        .record(elapsed.as_secs_f64());

        if let Err(e) = &result {
            metrics::counter!(telemetry::BACKEND_FAILURES_TOTAL,
                "backend" => backend_id.to_owned(),
                "kind" => e.failure_kind().as_str(),
            )
            .increment(1);
        }

        result
    }

    /// Cache a successful generation and report it.
    fn complete(
        &self,
        backend_id: &str,
        question: &str,
        version: DocumentVersion,
        generation: Generation,
    ) -> GenerateResult {
        let latency_s = generation.latency.as_secs_f64();
        let entry = CachedResponse {
            text: generation.text,
            latency_s,
            cost_usd: generation.cost_usd,
            backend_id: backend_id.to_string(),
        };

        if !self.cache.put(question, version, entry.clone()) {
            debug!(%version, "document version changed during generation, not caching");
        }

        self.sink.log_latency(latency_s);
        self.sink.log_question(question);
        if self
            .catalog
            .get(backend_id)
            .is_some_and(|descriptor| descriptor.is_remote())
        {
            self.sink.log_model_cost(backend_id, entry.cost_usd);
        }

        GenerateResult {
            text: entry.text,
            latency_s,
            cost_usd: entry.cost_usd,
            backend_id: entry.backend_id,
            cache_hit: false,
        }
    }
}

impl std::fmt::Debug for FailoverDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut configured: Vec<_> = self.backends.keys().collect();
        configured.sort();
        f.debug_struct("FailoverDispatcher")
            .field("catalog", &self.catalog.len())
            .field("configured", &configured)
            .field("fallback_message", &self.fallback_message)
            .finish_non_exhaustive()
    }
}
