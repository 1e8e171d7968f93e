//! Tool abstraction for tag-protocol agents.
//!
//! The [`Tool`] trait defines the interface every tool implements: a dotted
//! name, a one-line description, an argument [`ToolSchema`], an
//! `initialize` hook that binds the tool to a session's
//! [`AgentEnvironment`], and an async `execute` returning the uniform
//! `{ok, data, error}` [`ToolOutput`] envelope.
//!
//! Tools are collected into a [`ToolRegistry`] which handles allow-list
//! filtering, argument validation and dispatch. Dispatch never fails: every
//! outcome, including unknown names and tool errors, is folded into a
//! [`ToolCallRecord`] for the conversation history.

use crate::agent::env::AgentEnvironment;
use crate::tools::schema::ToolSchema;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use tracing::{debug, info, trace, warn};

/// Arguments of a tool call: the JSON object under `"arguments"`.
pub type ToolArgs = Map<String, Value>;

/// Boxed future returned by [`Tool::execute`].
///
/// Type alias to keep trait signatures and implementations readable.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + 'a>>;

/// Tool name recorded for tool-call bodies that could not be parsed.
pub const INVALID_TOOL_NAME: &str = "INVALID";

// ── Results and errors ─────────────────────────────────────────────

/// Uniform result envelope returned by every tool.
///
/// `ok = false` is a tool-reported logical failure ("file not found"),
/// distinct from a [`ToolError`] raised while executing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub ok: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    /// A successful result carrying `data`.
    pub fn success(data: Value) -> Self {
        Self {
            ok: true,
            data,
            error: None,
        }
    }

    /// A logical failure with a message for the model.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: Value::Null,
            error: Some(error.into()),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({ "ok": self.ok, "data": self.data, "error": self.error })
    }
}

/// Errors raised inside [`Tool::execute`].
///
/// The registry catches these and records their `Display` text as the
/// call's error; they never abort the turn loop.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Path outside working directory: {0}")]
    OutsideSandbox(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("tool '{0}' used before initialize()")]
    NotInitialized(String),
    #[error("{0}")]
    Failed(String),
}

/// Outcome of one dispatched tool call, as stored in history.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: ToolArgs,
    /// The full `{ok, data, error}` envelope; `None` when the call never
    /// produced one (unknown tool, validation failure, raised error).
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl ToolCallRecord {
    /// A call that failed before or during execution.
    pub fn failed(tool_name: impl Into<String>, arguments: ToolArgs, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Synthetic record for a malformed `<tool_call>` body.
    pub fn invalid(detail: impl fmt::Display) -> Self {
        Self::failed(
            INVALID_TOOL_NAME,
            Map::new(),
            format!("Invalid tool_call JSON: {detail}"),
        )
    }

    /// Whether the call succeeded (`ok = true`, no error).
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }

    /// JSON view shown to the model: `{tool_name, arguments, result, error}`.
    pub fn to_value(&self) -> Value {
        json!({
            "tool_name": self.tool_name,
            "arguments": self.arguments,
            "result": self.result,
            "error": self.error,
        })
    }
}

// ── Tool trait ─────────────────────────────────────────────────────

/// A capability the model can invoke with a `<tool_call>` directive.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// impl Tool for Echo {
///     fn name(&self) -> &str { "util.echo" }
///     fn description(&self) -> String { "Echo the text argument.".into() }
///     fn schema(&self) -> ToolSchema { ToolSchema::for_args::<EchoArgs>() }
///
///     fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
///         let args = parse_tool_args::<EchoArgs>(args);
///         Box::pin(async move {
///             let args = args?;
///             Ok(ToolOutput::success(json!({ "text": args.text })))
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// Dotted, unique tool name (e.g. `fs.write`).
    fn name(&self) -> &str;

    /// One-line description shown in the system prompt.
    fn description(&self) -> String;

    /// Declared arguments, validated before [`Tool::execute`] runs.
    fn schema(&self) -> ToolSchema;

    /// Bind the tool to a session's root and path policy. Called once by
    /// [`ToolRegistry::from_catalog`] before the tool is registered.
    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        let _ = env;
        Ok(())
    }

    /// Execute with already-validated arguments.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible.
    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_>;
}

// ── ToolRegistry ───────────────────────────────────────────────────

/// Name-keyed collection of enabled tools, in registration order.
///
/// # Example
///
/// ```ignore
/// let registry = ToolRegistry::new()
///     .with(WriteFile::default())
///     .with_if(allow_delete, DeleteFile::default());
///
/// let record = registry.dispatch("fs.write", args).await;
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Initialize and register the catalog tools enabled by `allowed`.
    ///
    /// With `Some(names)`, only catalog tools named in the list are
    /// registered, in list order; names without a catalog entry are skipped.
    /// With `None`, every catalog tool is registered in catalog order.
    pub fn from_catalog(
        env: &AgentEnvironment,
        catalog: Vec<Box<dyn Tool>>,
        allowed: Option<&[String]>,
    ) -> Result<Self, String> {
        let mut by_name: HashMap<String, Box<dyn Tool>> = HashMap::new();
        let mut order = Vec::new();
        for tool in catalog {
            let name = tool.name().to_string();
            order.push(name.clone());
            by_name.insert(name, tool);
        }

        let selected: Vec<String> = match allowed {
            Some(names) => names.to_vec(),
            None => order,
        };

        let mut registry = Self::new();
        for name in selected {
            let Some(mut tool) = by_name.remove(&name) else {
                debug!("Allowed tool '{name}' is not in the catalog; skipping");
                continue;
            };
            tool.initialize(env)
                .map_err(|e| format!("failed to initialize tool '{name}': {e}"))?;
            registry.register_boxed(tool);
        }
        debug!("Tool registry built: {:?}", registry.names());
        Ok(registry)
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_boxed(Box::new(tool));
    }

    /// Register a boxed tool. Replaces any existing tool with the same name.
    pub fn register_boxed(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Conditionally register a tool (builder pattern).
    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Registered tools in registration order.
    pub fn tools(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.iter().map(|t| t.as_ref())
    }

    /// Registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up, validate and execute one tool call.
    ///
    /// Unknown names, validation failures, `ok = false` results, raised
    /// [`ToolError`]s and panics all come back as an error-bearing record.
    pub async fn dispatch(&self, name: &str, arguments: ToolArgs) -> ToolCallRecord {
        let Some(tool) = self.get(name) else {
            return ToolCallRecord::failed(name, arguments, format!("Unknown tool: {name}"));
        };

        if let Err(e) = tool.schema().validate(&arguments) {
            debug!("Tool {name} rejected arguments: {e}");
            return ToolCallRecord::failed(
                name,
                arguments,
                format!("Argument validation failed: {e}"),
            );
        }

        log_tool_call(name, &arguments);
        let start = std::time::Instant::now();

        let outcome = AssertUnwindSafe(tool.execute(&arguments))
            .catch_unwind()
            .await;

        let elapsed = start.elapsed();
        let record = match outcome {
            Ok(Ok(output)) => {
                let error = if output.ok {
                    None
                } else {
                    Some(
                        output
                            .error
                            .clone()
                            .unwrap_or_else(|| "Unknown tool error".to_string()),
                    )
                };
                ToolCallRecord {
                    tool_name: name.to_string(),
                    arguments,
                    result: Some(output.to_value()),
                    error,
                }
            }
            Ok(Err(e)) => ToolCallRecord::failed(name, arguments, e.to_string()),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("Tool {name} panicked: {message}");
                ToolCallRecord::failed(name, arguments, format!("tool panicked: {message}"))
            }
        };

        debug!(
            "Tool {name} completed in {:.0}ms (ok={})",
            elapsed.as_secs_f64() * 1000.0,
            record.error.is_none()
        );
        if let Some(ref error) = record.error {
            trace!("Tool {name} error: {error}");
        }
        record
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Deserialize validated arguments into a typed struct.
///
/// # Example
///
/// ```ignore
/// fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
///     let parsed = parse_tool_args::<ReadArgs>(args);
///     Box::pin(async move {
///         let args = parsed?;
///         // ... use args
///     })
/// }
/// ```
pub fn parse_tool_args<T: DeserializeOwned>(args: &ToolArgs) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, arguments: &ToolArgs) {
    let rendered = Value::Object(arguments.clone()).to_string();
    let args_preview: String = rendered.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if rendered.chars().count() > 120 { "..." } else { "" }
    );
    debug!("[tool] {name} full args ({} bytes)", rendered.len());
    trace!("[tool] {name} arguments: {rendered}");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
