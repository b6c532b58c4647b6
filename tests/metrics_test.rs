//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use vegvisir::dispatcher::FailoverDispatcher;
use vegvisir::{
    Backend, Generation, ModelCatalog, ModelDescriptor, RecorderSink, ResponseCache, Result,
    RouterError, telemetry,
};

// ============================================================================
// Mock backends
// ============================================================================

struct Answering(ModelDescriptor);

#[async_trait]
impl Backend for Answering {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.0
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        text.len()
    }

    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<Generation> {
        Ok(Generation {
            text: "ok".into(),
            latency: Duration::from_millis(10),
            cost_usd: 0.002,
        })
    }
}

struct TimingOut(ModelDescriptor);

#[async_trait]
impl Backend for TimingOut {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.0
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        text.len()
    }

    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<Generation> {
        Err(RouterError::Timeout(Duration::from_secs(10)))
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values matching a name and a label pair.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(c) => *c,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

fn dispatcher(backends: Vec<Arc<dyn Backend>>) -> FailoverDispatcher {
    FailoverDispatcher::new(
        Arc::new(ModelCatalog::default()),
        backends,
        Arc::new(ResponseCache::default()),
        Arc::new(RecorderSink),
    )
    .unwrap()
}

fn local() -> ModelDescriptor {
    ModelDescriptor::local("local_gpt2", "Local", 1)
}

fn gpt4() -> ModelDescriptor {
    ModelDescriptor::remote("gpt-4", "GPT-4", 0.03 / 1000.0, 8192, 3)
}

// ============================================================================
// Tests
// ============================================================================

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_request_records_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let dispatcher = dispatcher(vec![
                    Arc::new(Answering(gpt4())),
                    Arc::new(Answering(local())),
                ]);
                dispatcher.generate("gpt-4", "p", "q", 16).await
            })
        })
    });
    assert_eq!(result.backend_id, "gpt-4");

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::QUERIES_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "ok"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
    assert!(has_histogram(&snapshot, telemetry::ANSWER_LATENCY_SECONDS));
    assert!(has_histogram(&snapshot, telemetry::REQUEST_COST_USD));
    assert_eq!(counter_total(&snapshot, telemetry::FAILOVERS_TOTAL), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn failover_records_failure_kind() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let dispatcher = dispatcher(vec![
                    Arc::new(TimingOut(gpt4())),
                    Arc::new(Answering(local())),
                ]);
                dispatcher.generate("gpt-4", "p", "q", 16).await
            })
        })
    });
    assert_eq!(result.backend_id, "local_gpt2");

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(
        counter_with_label(&snapshot, telemetry::BACKEND_FAILURES_TOTAL, "kind", "timeout"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::FAILOVERS_TOTAL, "backend", "local_gpt2"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
    // local backends carry no cost
    assert!(!has_histogram(&snapshot, telemetry::REQUEST_COST_USD));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn exhaustion_records_fallback() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let dispatcher = dispatcher(vec![Arc::new(TimingOut(local()))]);
                dispatcher.generate("local_gpt2", "p", "q", 16).await
            })
        })
    });
    assert!(result.is_fallback());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::FALLBACK_RESPONSES_TOTAL), 1);
    // the recheck before falling back is not a second miss
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 0);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "error"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cache_hits_and_invalidations_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let dispatcher = dispatcher(vec![Arc::new(Answering(local()))]);
                dispatcher.generate("local_gpt2", "p", "q", 16).await;
                dispatcher.generate("local_gpt2", "p", "q", 16).await;
                dispatcher.cache().bump_and_clear();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_INVALIDATIONS_TOTAL), 1);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let dispatcher = dispatcher(vec![Arc::new(Answering(local()))]);
    let result = dispatcher.generate("local_gpt2", "p", "q", 16).await;
    assert_eq!(result.text, "ok");
}
