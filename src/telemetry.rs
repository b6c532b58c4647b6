//! Telemetry metric name constants.
//!
//! Centralised metric names for vegvisir operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `vegvisir_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`, `_usd`).
//!
//! # Common labels
//!
//! - `backend` — backend id from the catalog (e.g. "local_gpt2", "gpt-4")
//! - `status` — outcome: "ok" or "error"
//! - `kind` — failure kind: "timeout", "rate_limited", "server_error", "generic"

/// Total queries received by the dispatcher.
pub const QUERIES_TOTAL: &str = "vegvisir_queries_total";

/// Total backend invocations.
///
/// Labels: `backend`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "vegvisir_requests_total";

/// Backend generation latency in seconds.
///
/// Labels: `backend`.
pub const REQUEST_DURATION_SECONDS: &str = "vegvisir_request_duration_seconds";

/// Latency of freshly generated answers, in seconds (cache hits excluded).
pub const ANSWER_LATENCY_SECONDS: &str = "vegvisir_answer_latency_seconds";

/// Total backend failures.
///
/// Labels: `backend`, `kind`.
pub const BACKEND_FAILURES_TOTAL: &str = "vegvisir_backend_failures_total";

/// Total failover attempts (candidates tried after the primary failed).
///
/// Labels: `backend`.
pub const FAILOVERS_TOTAL: &str = "vegvisir_failovers_total";

/// Total degraded fallback payloads returned.
pub const FALLBACK_RESPONSES_TOTAL: &str = "vegvisir_fallback_responses_total";

/// Per-request cost in USD.
///
/// Labels: `backend`.
pub const REQUEST_COST_USD: &str = "vegvisir_request_cost_usd";

/// Total queries answered from the response cache, including answers
/// written by a concurrent request while this one was failing over.
pub const CACHE_HITS_TOTAL: &str = "vegvisir_cache_hits_total";

/// Total queries that missed the response cache on arrival.
pub const CACHE_MISSES_TOTAL: &str = "vegvisir_cache_misses_total";

/// Total document-version bumps (each one clears the response cache).
pub const CACHE_INVALIDATIONS_TOTAL: &str = "vegvisir_cache_invalidations_total";
