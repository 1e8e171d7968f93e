//! Session events and the handlers that record them.
//!
//! The agent reports every observable step as a [`SessionEvent`]: the system
//! prompt, user instructions, each LLM query and response, each tool call
//! and result, termination and errors. Handlers are purely observational;
//! nothing they do changes the loop.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FileLogHandler`] | Append-only `agent.log` trace |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use crate::Message;
use crate::tools::core::ToolArgs;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the agent during a session.
#[derive(Debug, Clone, Copy)]
pub enum SessionEvent<'a> {
    /// The system prompt was appended to history.
    SystemPrompt(&'a str),
    /// A user instruction was appended to history.
    UserInstruction(&'a str),
    /// The model is about to be queried with the rendered history.
    LlmQuery { turn: u32, messages: &'a [Message] },
    /// The model replied.
    LlmResponse { turn: u32, text: &'a str },
    /// A tool directive is being dispatched.
    ToolCall { name: &'a str, arguments: &'a ToolArgs },
    /// A tool directive produced a history record.
    ToolResult { name: &'a str, payload: &'a Value },
    /// The session stopped.
    Termination { turn: u32, reason: &'a str },
    /// A backend or bookkeeping error occurred.
    Error(&'a str),
}

impl SessionEvent<'_> {
    /// Upper-case label used in the log file.
    pub fn label(&self) -> &'static str {
        match self {
            SessionEvent::SystemPrompt(_) => "SYSTEM_PROMPT",
            SessionEvent::UserInstruction(_) => "USER_INSTRUCTION",
            SessionEvent::LlmQuery { .. } => "LLM_QUERY",
            SessionEvent::LlmResponse { .. } => "LLM_RESPONSE",
            SessionEvent::ToolCall { .. } => "TOOL_CALL",
            SessionEvent::ToolResult { .. } => "TOOL_RESULT",
            SessionEvent::Termination { .. } => "TERMINATION",
            SessionEvent::Error(_) => "ERROR",
        }
    }
}

// ── Handler trait ──────────────────────────────────────────────────

/// Trait for observing session events.
///
/// # Example
///
/// ```ignore
/// struct PrintReplies;
///
/// impl EventHandler for PrintReplies {
///     fn on_event(&self, event: &SessionEvent<'_>) {
///         if let SessionEvent::LlmResponse { text, .. } = event {
///             println!("{text}");
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for each event. The default implementation ignores it.
    fn on_event(&self, event: &SessionEvent<'_>) {
        let _ = event;
    }
}

/// A handler that ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let SessionEvent::Termination { reason, .. } = event {
///         eprintln!("stopped: {reason}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&SessionEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&SessionEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&SessionEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &SessionEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that delegates to multiple inner handlers, in
/// registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_opt(file_log);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add an already boxed handler to the chain.
    pub fn with_boxed(mut self, handler: Box<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    /// Add a handler from an `Option`. `None` is a no-op.
    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &SessionEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

// ── LoggingHandler ─────────────────────────────────────────────────

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

fn preview(text: &str, max: usize) -> String {
    let short: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        format!("{short}...")
    } else {
        short
    }
}

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &SessionEvent<'_>) {
        match event {
            SessionEvent::SystemPrompt(text) => {
                debug!("System prompt: {} chars", text.len());
                trace!("System prompt:\n{text}");
            }
            SessionEvent::UserInstruction(text) => {
                info!("User instruction: {}", preview(text, 200));
            }
            SessionEvent::LlmQuery { turn, messages } => {
                debug!("[turn {turn}] querying model with {} messages", messages.len());
            }
            SessionEvent::LlmResponse { turn, text } => {
                info!("[turn {turn}] model: {}", preview(text, 200));
            }
            SessionEvent::ToolCall { name, arguments } => {
                debug!("Executing tool: {name} ({} args)", arguments.len());
            }
            SessionEvent::ToolResult { name, payload } => {
                let error = payload.get("error").and_then(Value::as_str);
                match error {
                    Some(e) => warn!("Tool {name} failed: {}", preview(e, 200)),
                    None => debug!("Tool {name} succeeded"),
                }
            }
            SessionEvent::Termination { turn, reason } => {
                info!("Session ended at turn {turn}: {reason}");
            }
            SessionEvent::Error(text) => {
                error!("{text}");
            }
        }
    }
}

// ── FileLogHandler ─────────────────────────────────────────────────

/// Appends a human-readable trace of the session to a file.
///
/// Every line is prefixed with an RFC 3339 UTC timestamp and the event
/// label. With `debug` enabled, LLM queries include the full message list.
pub struct FileLogHandler {
    file: Mutex<File>,
    debug: bool,
}

impl FileLogHandler {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: &Path, debug: bool) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            debug,
        })
    }

    /// Append a free-form line.
    pub fn log(&self, label: &str, text: &str) {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = format!("[{stamp}] {label}: {text}\n");
        match self.file.lock() {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()) {
                    warn!("failed to write agent log: {e}");
                }
            }
            Err(_) => warn!("agent log lock poisoned"),
        }
    }
}

impl EventHandler for FileLogHandler {
    fn on_event(&self, event: &SessionEvent<'_>) {
        let label = event.label();
        let text = match event {
            SessionEvent::SystemPrompt(text) | SessionEvent::UserInstruction(text) => {
                (*text).to_string()
            }
            SessionEvent::LlmQuery { turn, messages } => {
                if self.debug {
                    let rendered = serde_json::to_string_pretty(messages)
                        .unwrap_or_else(|e| format!("<unserializable: {e}>"));
                    format!("turn {turn}\n{rendered}")
                } else {
                    format!("turn {turn}, {} messages", messages.len())
                }
            }
            SessionEvent::LlmResponse { turn, text } => format!("turn {turn}\n{text}"),
            SessionEvent::ToolCall { name, arguments } => {
                format!("{name} {}", Value::Object((*arguments).clone()))
            }
            SessionEvent::ToolResult { name, payload } => format!("{name} {payload}"),
            SessionEvent::Termination { turn, reason } => format!("turn {turn}: {reason}"),
            SessionEvent::Error(text) => (*text).to_string(),
        };
        self.log(label, &text);
    }
}
