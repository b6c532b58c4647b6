//! Remote (hosted API) backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Backend, Generation};
use crate::Result;
use crate::catalog::ModelDescriptor;
use crate::tokenizer::TokenBudgetEstimator;

/// Default per-request timeout for remote calls.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default sampling temperature for remote calls.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A single chat message sent to a remote model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Token usage reported by a remote API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// A completion returned by a [`RemoteClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

/// Client for a hosted chat-completion API.
///
/// Implementations must enforce `timeout` themselves and map failures to
/// [`RouterError::Timeout`](crate::RouterError::Timeout),
/// [`RateLimited`](crate::RouterError::RateLimited),
/// [`ServerError`](crate::RouterError::ServerError) or
/// [`Api`](crate::RouterError::Api)/[`Http`](crate::RouterError::Http).
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn complete(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Completion>;
}

/// [`Backend`] for one remote model served by a [`RemoteClient`].
///
/// Cost is `usage.total_tokens × cost_per_token`.
pub struct RemoteBackend {
    descriptor: ModelDescriptor,
    client: Arc<dyn RemoteClient>,
    estimator: Arc<TokenBudgetEstimator>,
    timeout: Duration,
    temperature: f32,
}

impl RemoteBackend {
    pub fn new(
        descriptor: ModelDescriptor,
        client: Arc<dyn RemoteClient>,
        estimator: Arc<TokenBudgetEstimator>,
    ) -> Self {
        Self {
            descriptor,
            client,
            estimator,
            timeout: DEFAULT_REMOTE_TIMEOUT,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        self.estimator.estimate(text, &self.descriptor)
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<Generation> {
        let start = Instant::now();
        let messages = [ChatMessage::user(prompt)];
        let completion = self
            .client
            .complete(
                &self.descriptor.id,
                &messages,
                max_tokens,
                self.temperature,
                self.timeout,
            )
            .await?;

        Ok(Generation {
            text: completion.text,
            latency: start.elapsed(),
            cost_usd: completion.usage.total_tokens as f64 * self.descriptor.cost_per_token,
        })
    }
}
