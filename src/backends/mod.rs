//! Answer-generation backends.
//!
//! Every catalog entry is served by one [`Backend`]. Backends come in the
//! two [`BackendKind`](crate::catalog::BackendKind)s of the catalog:
//!
//! - [`LocalBackend`] wraps a synchronous [`LocalModel`] and runs it on the
//!   blocking thread pool. Its failures are all reported as
//!   [`RouterError::Local`](crate::RouterError::Local).
//! - [`RemoteBackend`] wraps a [`RemoteClient`] for a hosted API. The
//!   client enforces the request timeout and classifies failures as
//!   timeout, rate limit, server error or generic API error.
//!
//! Backends never retry: the dispatcher tries each candidate at most once
//! per request.

pub mod local;
pub mod openai;
pub mod remote;

pub use local::{CommandModel, LocalBackend, LocalModel};
pub use openai::OpenAiClient;
pub use remote::{ChatMessage, Completion, RemoteBackend, RemoteClient, Usage};

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::catalog::ModelDescriptor;

/// Output of a successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub latency: Duration,
    pub cost_usd: f64,
}

/// Capability interface shared by local and remote backends.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Catalog entry this backend serves.
    fn descriptor(&self) -> &ModelDescriptor;

    /// Backend id, as listed in the catalog.
    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// Best-effort token estimate for `text` on this backend.
    fn estimate_tokens(&self, text: &str) -> usize;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<Generation>;
}
