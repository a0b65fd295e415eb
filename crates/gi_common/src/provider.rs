//! External AI provider seam.
//!
//! The provider is an opaque HTTP collaborator: one call with a system and
//! user prompt, one text reply back. Replies are decoded by a strict
//! two-branch parser: structured JSON if it parses as the documented
//! shape, otherwise the raw text wrapped at a default confidence.

use crate::error::{GiError, GiResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Confidence assigned to free-text provider replies.
pub const DEFAULT_TEXT_CONFIDENCE: f32 = 0.8;

/// Decoded provider reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderReply {
    pub text: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

fn default_confidence() -> f32 {
    DEFAULT_TEXT_CONFIDENCE
}

/// Open AI provider seam. Implementations perform one blocking-free HTTP
/// round trip and return the raw reply body text.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> GiResult<String>;
}

/// Decode a raw provider reply.
///
/// Branch one: the reply parses as the documented JSON shape, so use it
/// verbatim (confidence clamped into [0,1]). Branch two: anything else is
/// treated as plain text with empty suggestion lists.
pub fn decode_reply(raw: &str) -> ProviderReply {
    if let Ok(mut reply) = serde_json::from_str::<ProviderReply>(raw) {
        if !reply.text.trim().is_empty() {
            reply.confidence = reply.confidence.clamp(0.0, 1.0);
            return reply;
        }
    }
    ProviderReply {
        text: raw.trim().to_string(),
        suggestions: Vec::new(),
        confidence: DEFAULT_TEXT_CONFIDENCE,
        follow_up_questions: Vec::new(),
    }
}

// ============================================================================
// OpenAI-compatible HTTP client
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Client for any OpenAI-compatible chat completion endpoint.
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl HttpProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> GiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GiError::dependency("ai_api", format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            temperature,
        })
    }
}

#[async_trait]
impl AiProvider for HttpProvider {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> GiResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GiError::dependency("ai_api", format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GiError::dependency(
                "ai_api",
                format!("provider returned HTTP {}", response.status()),
            ));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GiError::dependency("ai_api", format!("malformed response: {e}")))?;

        let content = body
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(GiError::dependency("ai_api", "empty completion"));
        }
        Ok(content)
    }
}
