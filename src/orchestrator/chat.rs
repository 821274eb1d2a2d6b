//! The OpenAI-compatible chat-completion envelope (spec §4.4.a).
//!
//! Both a successful upstream reply and a synthesized error reply share this
//! shape, so a client never has to branch on success before parsing.

use serde::{Deserialize, Serialize};

/// Request normalized from either the native `{text, model, temperature}`
/// shape or an OpenAI-style `{messages}` shape (spec §4.4 "Input
/// normalization").
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The text to send upstream, already derived from `messages` if that
    /// shape was used.
    pub text: String,
    /// Model identifier, default `"gpt-4o"`.
    pub model: String,
    /// Sampling temperature, default `0.7`.
    pub temperature: f32,
    /// When set, skip cache and upstream; return only the policy verdict.
    pub policy_only: bool,
}

/// One message in an OpenAI-style `messages` array.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    /// `"user"`, `"system"`, or `"assistant"`.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// A single choice in a [`ChatCompletionResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Index of this choice (always `0` here — one upstream call per
    /// request).
    pub index: u32,
    /// The assistant's message.
    pub message: ResponseMessage,
    /// Always `"stop"` in this gateway (no streaming, no tool calls).
    pub finish_reason: String,
}

/// The `message` field of a [`ChatChoice`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Always `"assistant"`.
    pub role: String,
    /// Reply text, or a synthesized error description on failure.
    pub content: String,
}

/// Token accounting, zeroed for synthesized error replies.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// The response shape returned for every terminal state, success or
/// failure (spec §4.4.a, §8 property 2 "Response shape stability").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
    pub proxy_id: String,
}

impl ChatCompletionResponse {
    /// Builds the synthesized error-reply shape from spec §4.4.a.
    pub fn error(proxy_id: &str, model: &str, kind: &str, reason: &str, created: i64) -> Self {
        Self {
            id: format!("chatcmpl-{}", hex_from_uuid_like(proxy_id)),
            object: "chat.completion".to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant".to_string(),
                    content: format!("Proxy error ({kind}): {reason}"),
                },
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
            proxy_id: proxy_id.to_string(),
        }
    }

    /// Returns a copy with `proxy_id` overwritten — used on cache-hit egress
    /// (spec §8 property 4: the cached body is byte-equal except for this
    /// field).
    pub fn with_proxy_id(mut self, proxy_id: &str) -> Self {
        self.proxy_id = proxy_id.to_string();
        self
    }
}

fn hex_from_uuid_like(id: &str) -> String {
    id.chars().filter(|c| c.is_ascii_hexdigit()).collect()
}
