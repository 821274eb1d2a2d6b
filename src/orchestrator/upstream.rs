//! Outbound call to the external LLM provider (spec §4.4 step 7).

use super::chat::{ChatChoice, ChatCompletionResponse, ResponseMessage, Usage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure talking to the upstream provider. Surfaced as `500 UPSTREAM_ERROR`
/// with a human-readable reason derived from the provider's status/body
/// (spec §7 "Propagation").
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// The request was aborted by the caller (client disconnect or deadline
    /// expiry — spec §5 "Cancellation and timeouts").
    #[error("cancelled")]
    Cancelled,
    /// The deadline propagated from the request context expired.
    #[error("deadline")]
    Deadline,
    /// Provider rejected the request as unauthenticated.
    #[error("provider authentication failed")]
    AuthenticationFailed,
    /// Provider returned HTTP 429.
    #[error("provider rate limit exceeded")]
    RateLimited,
    /// Provider returned a 5xx.
    #[error("provider service error")]
    ServiceError,
    /// Anything else (network failure, malformed response body, ...).
    #[error("{0}")]
    Other(String),
}

/// Capability handle for invoking the upstream LLM provider (spec §9
/// "Dynamic dispatch").
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Completes `text` against `model` at `temperature`. Returns the
    /// provider's reply already shaped as a chat-completion choice, or an
    /// [`UpstreamError`] classifying the failure.
    async fn complete(
        &self,
        text: &str,
        model: &str,
        temperature: f32,
    ) -> Result<UpstreamReply, UpstreamError>;
}

/// The subset of an upstream reply the orchestrator needs to build a
/// [`ChatCompletionResponse`].
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UpstreamReply {
    /// Assembles the full chat-completion envelope for a successful reply.
    pub fn into_response(self, proxy_id: &str, model: &str, created: i64) -> ChatCompletionResponse {
        let total_tokens = self.prompt_tokens + self.completion_tokens;
        ChatCompletionResponse {
            id: format!("chatcmpl-{proxy_id}"),
            object: "chat.completion".to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant".to_string(),
                    content: self.content,
                },
                finish_reason: "stop".to_string(),
            }],
            usage: Usage {
                prompt_tokens: self.prompt_tokens,
                completion_tokens: self.completion_tokens,
                total_tokens,
            },
            proxy_id: proxy_id.to_string(),
        }
    }
}

/// Request body sent to an OpenAI-compatible `/v1/chat/completions`
/// endpoint.
#[derive(Debug, Serialize)]
struct UpstreamChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<UpstreamChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct UpstreamChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpstreamChatResponse {
    choices: Vec<UpstreamChatResponseChoice>,
    #[serde(default)]
    usage: UpstreamUsage,
}

#[derive(Debug, Deserialize)]
struct UpstreamChatResponseChoice {
    message: UpstreamChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct UpstreamChatResponseMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// `reqwest`-backed [`UpstreamClient`] speaking the OpenAI chat-completion
/// wire format.
pub struct ReqwestUpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ReqwestUpstreamClient {
    /// Builds a client pointed at `base_url`, optionally authenticating with
    /// `api_key` via `Authorization: Bearer`.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl UpstreamClient for ReqwestUpstreamClient {
    async fn complete(
        &self,
        text: &str,
        model: &str,
        temperature: f32,
    ) -> Result<UpstreamReply, UpstreamError> {
        let body = UpstreamChatRequest {
            model,
            temperature,
            messages: vec![UpstreamChatMessage {
                role: "user",
                content: text,
            }],
        };

        let mut request = self.http.post(&self.base_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(classify_status_error(status.as_u16()));
        }

        let parsed: UpstreamChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Other(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| UpstreamError::Other("upstream returned no choices".to_string()))?;

        Ok(UpstreamReply {
            content,
            prompt_tokens: parsed.usage.prompt_tokens,
            completion_tokens: parsed.usage.completion_tokens,
        })
    }
}

fn classify_transport_error(err: &reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Deadline
    } else {
        UpstreamError::Other(err.to_string())
    }
}

fn classify_status_error(status: u16) -> UpstreamError {
    match status {
        401 | 403 => UpstreamError::AuthenticationFailed,
        429 => UpstreamError::RateLimited,
        500..=599 => UpstreamError::ServiceError,
        other => UpstreamError::Other(format!("unexpected upstream status {other}")),
    }
}
