//! OpenAI chat-completions client.
//!
//! See: <https://platform.openai.com/docs/api-reference/chat>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::remote::{ChatMessage, Completion, RemoteClient, Usage};
use crate::{Result, RouterError};

/// Default base URL for the OpenAI API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// [`RemoteClient`] for OpenAI-compatible chat-completion endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenAiClient {
    /// Create a client for the public OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for OpenAI-compatible
    /// servers, or wiremock in tests).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            api_key: api_key.into(),
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RemoteClient for OpenAiClient {
    #[instrument(
        name = "openai.complete",
        skip(self, model_id, messages),
        fields(model = %model_id)
    )]
    async fn complete(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Completion> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&ChatRequest {
                model: model_id,
                messages,
                max_tokens,
                temperature,
            })
            .send()
            .await
            .map_err(|e| classify_transport(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(e, timeout))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(RouterError::EmptyResponse)?;

        let usage = body.usage.unwrap_or_default();
        debug!(total_tokens = usage.total_tokens, "completion received");

        Ok(Completion { text, usage })
    }
}

fn classify_transport(err: reqwest::Error, timeout: Duration) -> RouterError {
    if err.is_timeout() {
        RouterError::Timeout(timeout)
    } else {
        RouterError::from(err)
    }
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: String) -> RouterError {
    let message = api_error_message(&body).unwrap_or(body);
    match status.as_u16() {
        429 => RouterError::RateLimited { retry_after },
        code if status.is_server_error() => RouterError::ServerError {
            status: code,
            message,
        },
        code => RouterError::Api {
            status: code,
            message,
        },
    }
}

/// Extract `error.message` from an OpenAI error body.
fn api_error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    Some(parsed.error.message)
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OpenAiClient::with_base_url("k", "http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn debug_hides_api_key() {
        let client = OpenAiClient::new("sk-secret");
        assert!(!format!("{client:?}").contains("sk-secret"));
    }

    #[test]
    fn status_classification() {
        let rate = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(2)),
            String::new(),
        );
        assert!(matches!(
            rate,
            RouterError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(2)
        ));

        let server = classify_status(StatusCode::BAD_GATEWAY, None, "upstream".into());
        assert!(matches!(server, RouterError::ServerError { status: 502, .. }));

        let client = classify_status(
            StatusCode::UNAUTHORIZED,
            None,
            r#"{"error":{"message":"Incorrect API key provided"}}"#.into(),
        );
        assert!(matches!(
            client,
            RouterError::Api { status: 401, ref message } if message == "Incorrect API key provided"
        ));
    }
}
