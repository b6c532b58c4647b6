//! Metrics sinks fed by the dispatcher.
//!
//! [`MetricsSink`] is the event interface the dispatcher reports to. Calls
//! are fire-and-forget: implementations must return quickly and never
//! persist on the caller's thread.
//!
//! Two sinks are provided:
//!
//! - [`RecorderSink`] forwards to the `metrics` facade (install a recorder
//!   such as prometheus to export them).
//! - [`InMemoryMetrics`] accumulates a [`MetricsSnapshot`] for dashboards,
//!   with explicit JSON [`save`](InMemoryMetrics::save) /
//!   [`load`](InMemoryMetrics::load).

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::telemetry;

/// Receiver for dispatcher events.
pub trait MetricsSink: Send + Sync {
    /// Generation latency of a successful backend call, in seconds.
    fn log_latency(&self, seconds: f64);

    /// A query was answered from the response cache.
    fn log_cache_hit(&self);

    /// A query missed the response cache and went to a backend.
    fn log_cache_miss(&self) {}

    /// A query was received.
    fn log_query(&self);

    /// Cost incurred by a backend call, in USD.
    fn log_model_cost(&self, backend_id: &str, cost: f64);

    /// The question text of a freshly generated answer (top-question
    /// tracking).
    fn log_question(&self, question: &str);
}

/// Sink that forwards events to the `metrics` facade.
///
/// Question text is not exported as a label (unbounded cardinality); it is
/// only traced at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderSink;

impl MetricsSink for RecorderSink {
    fn log_latency(&self, seconds: f64) {
        metrics::histogram!(telemetry::ANSWER_LATENCY_SECONDS).record(seconds);
    }

    fn log_cache_hit(&self) {
        metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
    }

    fn log_cache_miss(&self) {
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
    }

    fn log_query(&self) {
        metrics::counter!(telemetry::QUERIES_TOTAL).increment(1);
    }

    fn log_model_cost(&self, backend_id: &str, cost: f64) {
        metrics::histogram!(telemetry::REQUEST_COST_USD, "backend" => backend_id.to_owned())
            .record(cost);
    }

    fn log_question(&self, question: &str) {
        debug!(question, "answered question");
    }
}

/// Accumulated metrics, serializable for persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    pub latencies: Vec<f64>,
    #[serde(default)]
    pub cache_hits: u64,
    #[serde(default)]
    pub total_queries: u64,
    /// Total cost per backend id, in USD.
    #[serde(default)]
    pub model_costs: BTreeMap<String, f64>,
    /// Number of times each question was freshly answered.
    #[serde(default)]
    pub top_questions: HashMap<String, u64>,
}

impl MetricsSnapshot {
    /// 95th percentile latency in seconds (0.0 with no samples).
    pub fn p95_latency(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_by(f64::total_cmp);
        let index = ((0.95 * sorted.len() as f64) as usize).min(sorted.len() - 1);
        sorted[index]
    }

    /// Cache hits over total queries (0.0 with no queries).
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_queries == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / self.total_queries as f64
    }

    /// Total cost across all backends, in USD.
    pub fn total_cost(&self) -> f64 {
        self.model_costs.values().sum()
    }

    /// The `n` most frequent questions, most frequent first. Ties are
    /// ordered alphabetically.
    pub fn top_questions(&self, n: usize) -> Vec<(String, u64)> {
        let mut questions: Vec<_> = self
            .top_questions
            .iter()
            .map(|(q, c)| (q.clone(), *c))
            .collect();
        questions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        questions.truncate(n);
        questions
    }
}

/// Sink that accumulates a [`MetricsSnapshot`] in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    inner: Mutex<MetricsSnapshot>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a previously saved snapshot.
    pub fn from_snapshot(snapshot: MetricsSnapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }

    /// Copy of the current totals.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.lock().clone()
    }

    /// Zero every counter.
    pub fn reset(&self) {
        *self.lock() = MetricsSnapshot::default();
    }

    /// Write the current snapshot as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a snapshot written by [`save`](Self::save). A missing file
    /// yields empty metrics.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(Self::from_snapshot(serde_json::from_str(&content)?))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricsSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetricsSink for InMemoryMetrics {
    fn log_latency(&self, seconds: f64) {
        self.lock().latencies.push(seconds);
    }

    fn log_cache_hit(&self) {
        self.lock().cache_hits += 1;
    }

    fn log_query(&self) {
        self.lock().total_queries += 1;
    }

    fn log_model_cost(&self, backend_id: &str, cost: f64) {
        *self
            .lock()
            .model_costs
            .entry(backend_id.to_owned())
            .or_insert(0.0) += cost;
    }

    fn log_question(&self, question: &str) {
        *self
            .lock()
            .top_questions
            .entry(question.to_owned())
            .or_insert(0) += 1;
    }
}
