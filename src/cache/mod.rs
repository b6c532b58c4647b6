//! Response caching.
//!
//! - [`ResponseCache`] — answers keyed by normalized question and
//!   [`DocumentVersion`]; cleared wholesale on every version bump.
//! - [`IngestionHandle`] — the handle the document ingestion pipeline uses
//!   to bump the version.

pub mod response;
pub mod version;

pub use response::{CacheConfig, CachedResponse, ResponseCache, normalize_question};
pub use version::{DocumentVersion, IngestionHandle};
