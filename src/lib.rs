//! Vegvisir - Failover model router for question answering
//!
//! This crate picks the cheapest adequate backend for a question, fails over
//! through a priority-ordered catalog of local and remote models when a
//! backend errors, and caches answers per document version so repeated
//! questions are answered without a model call.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vegvisir::{CommandModel, Router};
//!
//! #[tokio::main]
//! async fn main() -> vegvisir::Result<()> {
//!     let router = Router::builder()
//!         .local_model(Arc::new(
//!             CommandModel::new("llama-cli").args(["-m", "qa.gguf", "-n", "{max_tokens}"]),
//!         ))
//!         .openai("sk-your-key")
//!         .build()?;
//!
//!     let answer = router
//!         .generate("How many PTO days do new hires get?", "", 400)
//!         .await;
//!     println!("{} ({}, ${:.4})", answer.text, answer.backend_id, answer.cost_usd);
//!
//!     // The ingestion pipeline bumps the version after every document change.
//!     let ingestion = router.ingestion_handle();
//!     ingestion.bump_and_clear();
//!     Ok(())
//! }
//! ```
//!
//! # Failover
//!
//! A failed backend is never retried within a request; the dispatcher moves
//! on to the next catalog entry by priority. When every backend fails the
//! caller gets a fixed degraded response (`backend_id == "fallback"`)
//! instead of an error.

pub mod backends;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod routing;
pub mod sink;
pub mod telemetry;
pub mod tokenizer;
pub mod version;

// Re-export main types at crate root
pub use backends::{
    Backend, CommandModel, Generation, LocalBackend, LocalModel, OpenAiClient, RemoteBackend,
    RemoteClient,
};
pub use cache::{CacheConfig, CachedResponse, DocumentVersion, IngestionHandle, ResponseCache};
pub use catalog::{BackendKind, ModelCatalog, ModelDescriptor};
pub use config::{Config, Secrets};
pub use dispatcher::{FailoverDispatcher, GenerateResult};
pub use error::{FailureKind, Result, RouterError};
pub use gateway::{DEFAULT_MAX_TOKENS, Router, RouterBuilder};
pub use routing::{ModelSelector, SelectorConfig};
pub use sink::{InMemoryMetrics, MetricsSink, MetricsSnapshot, RecorderSink};
pub use tokenizer::{TokenBudgetEstimator, TokenizerProvider};
pub use version::{PKG_VERSION, version_string};

#[cfg(feature = "hf-tokenizer")]
pub use tokenizer::HfTokenizer;
#[cfg(feature = "tiktoken")]
pub use tokenizer::TiktokenTokenizer;
