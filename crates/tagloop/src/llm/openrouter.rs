//! Live backend: the OpenRouter chat-completions API.
//!
//! The tag protocol travels in plain text, so requests carry no function
//! definitions. History roles map onto the API's roles; tool results are
//! sent as user turns prefixed with `Tool result: `.

use crate::agent::env::SessionConfig;
use crate::agent::harness::InitError;
use crate::llm::{LanguageModel, LlmError, LlmFuture};
use crate::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENROUTER_KEY";

/// Model used when the config names none.
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

pub const DEFAULT_MAX_TOKENS: u32 = 8192;

pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Prefix for tool results sent as user turns.
pub const TOOL_RESULT_PREFIX: &str = "Tool result: ";

// ── Wire types ─────────────────────────────────────────────────────

/// Chat completion request body.
#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A message in the API's role set.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawMessage,
}

#[derive(Deserialize, Debug)]
struct RawMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    #[serde(default)]
    message: String,
    /// A number or a numeric string, depending on the upstream provider.
    #[serde(default)]
    code: Option<Value>,
}

impl ApiErrorResponse {
    fn status(&self) -> Option<u16> {
        match self.code.as_ref()? {
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Map history messages onto the API's roles.
pub fn to_wire_messages(messages: &[Message]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|m| match m.role {
            MessageRole::System => WireMessage {
                role: "system",
                content: m.content.clone(),
            },
            MessageRole::User => WireMessage {
                role: "user",
                content: m.content.clone(),
            },
            MessageRole::Assistant => WireMessage {
                role: "assistant",
                content: m.content.clone(),
            },
            MessageRole::Tool => WireMessage {
                role: "user",
                content: format!("{TOOL_RESULT_PREFIX}{}", m.content),
            },
        })
        .collect()
}

/// Classify a failed HTTP status (or an in-body error code).
pub fn classify_status(status: u16, message: String, retry_after: Option<Duration>) -> LlmError {
    match status {
        429 | 402 => LlmError::RateLimited {
            message,
            retry_after,
        },
        401 | 403 => LlmError::Unauthorized(message),
        _ => LlmError::Backend { status, message },
    }
}

/// Parse a `Retry-After` header given in seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

// ── Model ──────────────────────────────────────────────────────────

/// Async HTTP client for OpenRouter, as a [`LanguageModel`].
pub struct OpenRouterModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenRouterModel {
    /// Create a client for `model` with the given API key.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .user_agent("tagloop/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Build from session config, reading the key from [`API_KEY_ENV`].
    pub fn from_config(config: &SessionConfig) -> Result<Self, InitError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(API_KEY_ENV.to_string()))?;
        let model = config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let mut client = Self::new(api_key, model)?;
        if let Some(max_tokens) = config.max_tokens {
            client.max_tokens = max_tokens;
        }
        if let Some(temperature) = config.temperature {
            client.temperature = temperature;
        }
        Ok(client)
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: to_wire_messages(messages),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = resp.status();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let text = resp
            .text()
            .await
            .map_err(|e| LlmError::Transport(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), text, retry_after));
        }

        parse_reply(&text, retry_after)
    }
}

/// Extract the assistant text from a successful HTTP body, which may still
/// carry an in-body error.
fn parse_reply(text: &str, retry_after: Option<Duration>) -> Result<String, LlmError> {
    let parsed: RawChatResponse = serde_json::from_str(text)
        .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

    if let Some(err) = parsed.error {
        return Err(match err.status() {
            Some(code) => classify_status(code, err.message, retry_after),
            None => LlmError::InvalidResponse(err.message),
        });
    }

    parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("no content in response".to_string()))
}

impl LanguageModel for OpenRouterModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate<'a>(&'a self, messages: &'a [Message]) -> LlmFuture<'a> {
        Box::pin(self.chat(messages))
    }
}
