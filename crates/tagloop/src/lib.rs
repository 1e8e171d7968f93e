//! Tag-protocol agent loop for LLM-driven coding sessions.
//!
//! `tagloop` drives a language model through a bounded conversation in which
//! each reply is free text, one or more `<tool_call>` directives, or the
//! standalone `<terminate>` signal. The [`Agent`](agent::harness::Agent)
//! executes directives against a sandboxed working directory and feeds the
//! results back into a compressible [`History`](context::history::History).
//!
//! # Getting started
//!
//! ```ignore
//! use tagloop::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads .tagloop/config.json and .tagloop/instruction.md.
//!     let mut agent = Agent::builder("/path/to/project")
//!         .with_tools(filesystem_tools())
//!         .build()?;
//!
//!     match agent.run().await? {
//!         RunOutcome::Terminated { turns } => println!("done in {turns} turns"),
//!         RunOutcome::BudgetExhausted { turns } => println!("gave up after {turns}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Define tools:** the [`Tool`](tools::core::Tool) trait,
//!   [`ToolSchema`](tools::schema::ToolSchema) for argument validation and
//!   [`ToolRegistry`](tools::core::ToolRegistry) for dispatch. Built-in file
//!   tools live in [`tools::fs`], path containment in [`tools::sandbox`].
//! - **Run the loop:** [`Agent`](agent::harness::Agent) (`run`, `step`,
//!   `inject_instruction`, `dispatch`).
//! - **Observe a session:** implement
//!   [`EventHandler`](agent::events::EventHandler). The default session wires
//!   [`LoggingHandler`](agent::events::LoggingHandler) and
//!   [`FileLogHandler`](agent::events::FileLogHandler) (`agent.log`).
//! - **Configure:** [`SessionConfig`](agent::env::SessionConfig) and
//!   [`AgentEnvironment`](agent::env::AgentEnvironment).
//! - **Swap models:** the [`LanguageModel`](llm::LanguageModel) trait,
//!   [`MockModel`](llm::mock::MockModel) and
//!   [`OpenRouterModel`](llm::openrouter::OpenRouterModel).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | Session object, environment, events, system prompt |
//! | [`context`] | History entries and the compression policy |
//! | [`protocol`] | `<tool_call>` scanning and termination detection |
//! | [`tools`] | Tool trait, schema validation, registry, sandboxed file tools |
//! | [`llm`] | Model trait, mock and OpenRouter backends, retry policy |

pub mod agent;
pub mod context;
pub mod llm;
pub mod prelude;
pub mod protocol;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export schemars for downstream tool crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Hidden per-session directory under the working directory.
pub const SESSION_DIR: &str = ".tagloop";

/// Session configuration file name inside [`SESSION_DIR`].
pub const CONFIG_FILE: &str = "config.json";

/// Initial instruction file name inside [`SESSION_DIR`].
pub const INSTRUCTION_FILE: &str = "instruction.md";

/// Append-only trace file name inside [`SESSION_DIR`].
pub const LOG_FILE: &str = "agent.log";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// Tool argument structs derive `JsonSchema`; the resulting schema is turned
/// into a [`ToolSchema`](tools::schema::ToolSchema) with
/// [`ToolSchema::for_args`](tools::schema::ToolSchema::for_args).
///
/// # Example
///
/// ```
/// use tagloop::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct WriteArgs {
///     path: String,
///     #[serde(default)]
///     append: Option<bool>,
/// }
///
/// let schema = json_schema_for::<WriteArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"path".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A role-tagged message as sent to a [`LanguageModel`](llm::LanguageModel).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content, "hello");

        assert_eq!(Message::user("u").role, MessageRole::User);
        assert_eq!(Message::assistant("a").role, MessageRole::Assistant);
        assert_eq!(Message::tool("t").role, MessageRole::Tool);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(MessageRole::Tool.to_string(), "tool");
    }
}
