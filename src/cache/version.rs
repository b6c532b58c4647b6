//! Document versions and the ingestion-side invalidation handle.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ResponseCache;

/// Monotonic tag for the current document corpus.
///
/// Displayed as `v<n>`. The first version is `v1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentVersion(u64);

impl DocumentVersion {
    pub const INITIAL: DocumentVersion = DocumentVersion(1);

    pub fn new(n: u64) -> Self {
        Self(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The version after this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for DocumentVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Handle held by the document ingestion pipeline.
///
/// Every document add or update must be followed by
/// [`bump_and_clear()`](Self::bump_and_clear). Cloning is cheap; all clones
/// share the same cache.
#[derive(Clone)]
pub struct IngestionHandle {
    cache: Arc<ResponseCache>,
}

impl IngestionHandle {
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self { cache }
    }

    /// Advance the document version and drop every cached response.
    ///
    /// Once this returns, no lookup can hit an entry cached before the
    /// call.
    pub fn bump_and_clear(&self) -> DocumentVersion {
        self.cache.bump_and_clear()
    }

    pub fn current_version(&self) -> DocumentVersion {
        self.cache.current_version()
    }
}

impl fmt::Debug for IngestionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionHandle")
            .field("version", &self.current_version())
            .finish()
    }
}
