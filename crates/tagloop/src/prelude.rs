//! Convenience re-exports for common `tagloop` types.
//!
//! Meant to be glob-imported when building agents:
//!
//! ```ignore
//! use tagloop::prelude::*;
//! ```
//!
//! Specialized types (history entries, compression policy, wire helpers)
//! are left out; import those from their modules directly.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{Message, MessageRole, json_schema_for};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::env::{AgentEnvironment, SessionConfig};
pub use crate::agent::events::{
    CompositeEventHandler, EventHandler, FileLogHandler, FnEventHandler, LoggingHandler,
    NoopHandler, SessionEvent,
};
pub use crate::agent::harness::{
    Agent, AgentBuilder, InitError, RunOutcome, SessionStatus, TurnOutcome,
};

// ── Models ──────────────────────────────────────────────────────────
pub use crate::llm::mock::MockModel;
pub use crate::llm::openrouter::OpenRouterModel;
pub use crate::llm::retry::{RetryConfig, retry_with_backoff};
pub use crate::llm::{LanguageModel, LlmError, LlmFuture};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{
    ArgKind, PathPolicy, Sandbox, Tool, ToolArgs, ToolArgument, ToolCallRecord, ToolError,
    ToolFuture, ToolOutput, ToolRegistry, ToolSchema, filesystem_tools, parse_tool_args,
};
