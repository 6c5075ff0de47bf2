//! Completion client for OpenAI-compatible local servers
//!
//! Talks to a llama.cpp server (or anything speaking the same chat
//! completions dialect) over plain HTTP. No API key, no cloud: the server
//! is expected on the local network.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Errors from completion calls.
///
/// `Api` carries the server's own message verbatim; for context-size
/// rejections that text embeds the figure the budget tracker parses out.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API Error: {0}")]
    Api(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("empty choices in response")]
    EmptyChoices,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request body for chat completion
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    messages: Vec<ChatMessage>,
}

/// Response body for non-streaming completion
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: ChoiceMessage,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

/// One SSE chunk of a streaming completion
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: ChoiceMessage,
    #[serde(default)]
    message: ChoiceMessage,
}

/// Error body some servers return on failure
#[derive(Debug, Deserialize)]
struct ApiErrorWrapper {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Client for the local completion endpoint.
pub struct LlmClient {
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl LlmClient {
    /// Build a client from the `[llm]` config section.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    /// Full URL of the chat completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check whether the server answers at all.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        self.client.get(&url).send().await.is_ok()
    }

    /// Non-streaming completion with the client's configured sampling.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.complete_with(system, user, self.temperature, self.max_tokens)
            .await
    }

    /// Non-streaming completion with explicit sampling overrides.
    pub async fn complete_with(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            temperature,
            max_tokens,
            stream: false,
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
        };

        let response = self
            .client
            .post(self.completions_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;

        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &raw));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&raw).map_err(|e| LlmError::Parse(e.to_string()))?;
        let choice = parsed.choices.first().ok_or(LlmError::EmptyChoices)?;
        let content = choice.message.content.trim();
        if content.is_empty() {
            Ok(choice.text.trim().to_string())
        } else {
            Ok(content.to_string())
        }
    }

    /// Streaming completion.
    ///
    /// `on_text` receives each delta as it arrives. The returned string is
    /// the captured transcript, capped at `capture_limit` bytes (0 = no
    /// cap) so history previews do not balloon.
    pub async fn complete_stream<F>(
        &self,
        system: &str,
        user: &str,
        capture_limit: usize,
        mut on_text: F,
    ) -> Result<String, LlmError>
    where
        F: FnMut(&str),
    {
        let request = ChatRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
        };

        let mut response = self
            .client
            .post(self.completions_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(parse_error_body(status.as_u16(), &raw));
        }

        let mut buffer: Vec<u8> = Vec::new();
        let mut captured = String::new();

        while let Some(bytes) = response.chunk().await? {
            buffer.extend_from_slice(&bytes);

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    on_text("\n");
                    return Ok(captured);
                }

                let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) else {
                    continue;
                };
                let Some(choice) = chunk.choices.first() else {
                    continue;
                };
                let text = if choice.delta.content.is_empty() {
                    &choice.message.content
                } else {
                    &choice.delta.content
                };
                if text.is_empty() {
                    continue;
                }

                on_text(text);
                if capture_limit == 0 || captured.len() < capture_limit {
                    captured.push_str(text);
                }
            }
        }

        Ok(captured)
    }
}

/// Classify an HTTP error body: prefer the server's own error message when
/// the body carries one.
fn parse_error_body(status: u16, body: &str) -> LlmError {
    if let Ok(wrapper) = serde_json::from_str::<ApiErrorWrapper>(body) {
        if !wrapper.error.message.is_empty() {
            return LlmError::Api(wrapper.error.message);
        }
    }
    LlmError::Http {
        status,
        body: body.to_string(),
    }
}
