//! Versioned response cache.
//!
//! [`ResponseCache`] maps `(normalized question, document version)` to a
//! generated answer. It is owned by the composing application and shared
//! with the dispatcher through an `Arc`.
//!
//! # Consistency
//!
//! The current [`DocumentVersion`] lives behind an `RwLock` that is the
//! single exclusion domain for the cache:
//!
//! - lookups and writes hold the lock shared, so they always see a
//!   version and an entry set that belong together;
//! - [`bump_and_clear()`](ResponseCache::bump_and_clear) holds it
//!   exclusively while it advances the version and invalidates every
//!   entry.
//!
//! A write tagged with a version that has since been superseded is
//! discarded, so a slow request that started before a bump can never
//! repopulate the cache with an answer built from old documents.
//!
//! Concurrent misses for the same key are not deduplicated: both callers
//! generate, and the later write wins.
//!
//! # Capacity
//!
//! Unbounded by default; entries only leave on a version bump or
//! [`clear()`](ResponseCache::clear). Set [`CacheConfig::max_entries`] to
//! bound it with LRU eviction.

use std::sync::{PoisonError, RwLock};

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use super::DocumentVersion;
use crate::telemetry;

/// Configuration for the response cache.
///
/// ```toml
/// [cache]
/// max_entries = 50000
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: unbounded.
    #[serde(default)]
    pub max_entries: Option<u64>,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the cache to `n` entries (LRU eviction).
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = Some(n);
        self
    }
}

/// A cached answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub text: String,
    /// Generation latency of the original request, in seconds.
    pub latency_s: f64,
    /// Cost of the original request, in USD.
    pub cost_usd: f64,
    /// Backend that produced the answer.
    pub backend_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    question: String,
    version: DocumentVersion,
}

impl CacheKey {
    fn new(question: &str, version: DocumentVersion) -> Self {
        Self {
            question: normalize_question(question),
            version,
        }
    }
}

/// Case-fold and trim a question. This is the only normalization applied
/// to cache keys.
pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

/// Thread-safe versioned cache of generated answers.
pub struct ResponseCache {
    version: RwLock<DocumentVersion>,
    entries: Cache<CacheKey, CachedResponse>,
}

impl ResponseCache {
    /// Create a cache starting at [`DocumentVersion::INITIAL`].
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_version(config, DocumentVersion::INITIAL)
    }

    /// Create a cache starting at a specific version.
    pub fn with_version(config: &CacheConfig, version: DocumentVersion) -> Self {
        let mut builder = Cache::builder();
        if let Some(max) = config.max_entries {
            builder = builder.max_capacity(max);
        }
        Self {
            version: RwLock::new(version),
            entries: builder.build(),
        }
    }

    /// Current document version.
    pub fn current_version(&self) -> DocumentVersion {
        *self.version.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `question` under `version`.
    ///
    /// Misses if `version` is no longer current.
    pub fn get(&self, question: &str, version: DocumentVersion) -> Option<CachedResponse> {
        let current = self.version.read().unwrap_or_else(PoisonError::into_inner);
        let entry = if *current == version {
            self.entries.get(&CacheKey::new(question, version))
        } else {
            None
        };
        entry
    }

    /// Look up `question` under the current version.
    ///
    /// Returns the version the lookup was made against, which the caller
    /// passes back to [`put()`](Self::put) after generating on a miss.
    pub fn lookup(&self, question: &str) -> (DocumentVersion, Option<CachedResponse>) {
        let current = self.version.read().unwrap_or_else(PoisonError::into_inner);
        let entry = self.entries.get(&CacheKey::new(question, *current));
        (*current, entry)
    }

    /// Store an answer for `question` under `version`.
    ///
    /// Returns `false` (and stores nothing) if `version` has been
    /// superseded.
    pub fn put(&self, question: &str, version: DocumentVersion, entry: CachedResponse) -> bool {
        let current = self.version.read().unwrap_or_else(PoisonError::into_inner);
        if *current != version {
            return false;
        }
        self.entries.insert(CacheKey::new(question, version), entry);
        true
    }

    /// Drop every entry without changing the version.
    pub fn clear(&self) {
        let _guard = self.version.write().unwrap_or_else(PoisonError::into_inner);
        self.entries.invalidate_all();
    }

    /// Advance the document version and drop every entry.
    ///
    /// Intended for the ingestion pipeline (see
    /// [`IngestionHandle`](super::IngestionHandle)). Cannot fail.
    pub fn bump_and_clear(&self) -> DocumentVersion {
        let mut current = self.version.write().unwrap_or_else(PoisonError::into_inner);
        let version = current.next();
        *current = version;
        self.entries.invalidate_all();
        drop(current);

        metrics::counter!(telemetry::CACHE_INVALIDATIONS_TOTAL).increment(1);
        tracing::info!(%version, "response cache cleared on document update");
        version
    }

    /// Number of live entries.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("version", &self.current_version())
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
