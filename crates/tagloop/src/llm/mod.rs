//! Language model backends.
//!
//! The agent only needs `generate(messages) -> text`. [`LanguageModel`] is
//! that capability; [`MockModel`](mock::MockModel) replays a script for
//! deterministic runs and [`OpenRouterModel`](openrouter::OpenRouterModel)
//! talks to a live chat-completions endpoint. Backend failures are typed
//! ([`LlmError`]) so the caller driving the loop can decide whether to
//! retry; the agent itself never retries.

pub mod mock;
pub mod openrouter;
pub mod retry;

use crate::Message;
use crate::agent::env::AgentEnvironment;
use crate::agent::harness::InitError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// Boxed future returned by [`LanguageModel::generate`].
pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;

/// A text-in, text-out model.
pub trait LanguageModel: Send + Sync {
    /// Short label for logs (e.g. the model id).
    fn name(&self) -> &str;

    /// Produce the next reply for an ordered conversation.
    fn generate<'a>(&'a self, messages: &'a [Message]) -> LlmFuture<'a>;
}

/// Backend failure, classified for the caller's retry policy.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Rate limit or exhausted quota. Retryable, possibly after a hint.
    #[error("rate limited: {message}{}", retry_suffix(.retry_after))]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    /// Credentials rejected. Fatal.
    #[error("authorization failed: {0}")]
    Unauthorized(String),
    /// No API key in the environment. Fatal.
    #[error("missing API key: set {0}")]
    MissingApiKey(String),
    /// Connection, timeout or body-read failure. Retryable.
    #[error("request failed: {0}")]
    Transport(String),
    /// Any other non-success status.
    #[error("backend returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },
    /// A success status with an unusable body.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Transport(_) => true,
            LlmError::Backend { status, .. } => *status >= 500,
            LlmError::Unauthorized(_) | LlmError::MissingApiKey(_) | LlmError::InvalidResponse(_) => {
                false
            }
        }
    }

    /// Backend-suggested wait before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

/// Construct the model selected by the session config's `llm_type`.
pub fn from_environment(env: &AgentEnvironment) -> Result<Box<dyn LanguageModel>, InitError> {
    let llm_type = env.config().llm_type();
    let model: Box<dyn LanguageModel> = match llm_type.as_str() {
        "mock" => Box::new(mock::MockModel::from_session(env)),
        "openrouter" => Box::new(openrouter::OpenRouterModel::from_config(env.config())?),
        other => {
            return Err(InitError::InvalidConfig(format!(
                "unknown llm_type '{other}' (expected 'mock' or 'openrouter')"
            )));
        }
    };
    debug!("LLM selected: {} (llm_type={llm_type})", model.name());
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::env::SessionConfig;

    #[test]
    fn retryability() {
        assert!(
            LlmError::RateLimited {
                message: "slow down".into(),
                retry_after: None
            }
            .is_retryable()
        );
        assert!(LlmError::Transport("reset".into()).is_retryable());
        assert!(
            LlmError::Backend {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !LlmError::Backend {
                status: 400,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!LlmError::Unauthorized("bad key".into()).is_retryable());
    }

    #[test]
    fn rate_limit_message_includes_hint() {
        let err = LlmError::RateLimited {
            message: "quota".into(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(err.to_string(), "rate limited: quota (retry after 30s)");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn unknown_llm_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            llm_type: Some("carrier-pigeon".into()),
            ..Default::default()
        };
        let env = AgentEnvironment::new(dir.path(), config).unwrap();
        let err = from_environment(&env).err().unwrap();
        assert!(matches!(err, InitError::InvalidConfig(_)));
    }

    #[test]
    fn mock_is_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let env = AgentEnvironment::new(dir.path(), SessionConfig::default()).unwrap();
        let model = from_environment(&env).unwrap();
        assert_eq!(model.name(), "mock");
    }
}
