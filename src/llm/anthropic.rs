//! Anthropic Messages API forwarder.
//!
//! Behaviour:
//! - The first system turn becomes the `system` field; user and assistant
//!   turns are sent in order as `messages`.
//! - One non-streaming `POST /v1/messages` per call, bounded by the configured
//!   timeout, never retried.
//! - The first `text` content block of the reply becomes the assistant turn.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::UpstreamConfig;
use crate::conversation::{Role, Turn};

use super::{CompletionForwarder, ForwardError, ForwardResult};

/// Anthropic API version header value.
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Longest slice of an error body kept in logs.
const ERROR_BODY_LOG_LIMIT: usize = 200;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

/// Forwards conversations to the Anthropic Messages API.
pub struct AnthropicForwarder {
    config: UpstreamConfig,
    client: Client,
}

impl AnthropicForwarder {
    /// Create a forwarder from upstream settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: UpstreamConfig) -> ForwardResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ForwardError::Unexpected(format!("failed to build http client: {e}")))?;
        Ok(Self { config, client })
    }

    fn build_request<'a>(&'a self, conversation: &'a [Turn]) -> MessagesRequest<'a> {
        let system = conversation
            .iter()
            .find(|turn| turn.role() == Role::System)
            .map(Turn::content);

        let messages = conversation
            .iter()
            .filter(|turn| turn.role().is_dialogue())
            .map(|turn| WireMessage {
                role: turn.role().as_str(),
                content: turn.content(),
            })
            .collect();

        MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages,
            temperature: self.config.temperature,
        }
    }
}

#[async_trait]
impl CompletionForwarder for AnthropicForwarder {
    async fn complete(&self, conversation: &[Turn]) -> ForwardResult<Turn> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ForwardError::MissingApiKey)?;

        if conversation.is_empty() {
            return Err(ForwardError::Unexpected("conversation is empty".to_string()));
        }

        let request = self.build_request(conversation);
        tracing::debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            "forwarding conversation upstream"
        );

        let response = self
            .client
            .post(self.config.messages_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    ForwardError::Unexpected(format!("invalid upstream request: {e}"))
                } else {
                    ForwardError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_LOG_LIMIT).collect();
            tracing::warn!(status = status.as_u16(), body = %excerpt, "upstream rejected completion request");
            return Err(ForwardError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| ForwardError::Unexpected(format!("malformed upstream reply: {e}")))?;

        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .map(Turn::assistant)
            .ok_or_else(|| ForwardError::Unexpected("upstream reply has no text content".to_string()))
    }
}
