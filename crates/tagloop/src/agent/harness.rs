//! The session object and its turn loop.
//!
//! An [`Agent`] owns one session: the environment, the model, the tool
//! registry, the history and the event sink. It is built by
//! [`AgentBuilder`], which runs the initialization sequence in a fixed
//! order and fails fast on a missing config or instruction.
//!
//! Each turn queries the model with the rendered history, scans the reply
//! for every `<tool_call>` directive, dispatches them left to right, and
//! ends the session only when the whole trimmed reply is `<terminate>`.
//! Backend failures abort the turn and are returned to the caller; retrying
//! is the caller's decision (see [`crate::llm::retry`]).

use crate::agent::env::AgentEnvironment;
use crate::agent::env::SessionConfig;
use crate::agent::events::{
    CompositeEventHandler, EventHandler, FileLogHandler, LoggingHandler, SessionEvent,
};
use crate::agent::prompt;
use crate::context::compression::CompressionPolicy;
use crate::context::history::{History, HistoryEntry};
use crate::llm::{self, LanguageModel, LlmError};
use crate::protocol::{self, Directive, ToolCallRequest};
use crate::tools::core::{Tool, ToolArgs, ToolCallRecord, ToolRegistry};
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Termination reason logged when the model sends `<terminate>`.
pub const REASON_REQUESTED: &str = "LLM requested termination";

/// Termination reason logged when the turn budget runs out.
pub const REASON_BUDGET: &str = "Max turns reached without termination";

// ── Errors ─────────────────────────────────────────────────────────

/// Fatal errors raised while constructing a session.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Config file not found: {}", .0.display())]
    MissingConfig(PathBuf),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("Instruction not found: {}", .0.display())]
    MissingInstruction(PathBuf),
    #[error("failed to initialize tools: {0}")]
    Tools(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ── Outcomes ───────────────────────────────────────────────────────

/// Result of one [`Agent::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply was exactly `<terminate>`.
    Terminated,
    /// The reply held this many directives, all dispatched.
    ToolCalls(usize),
    /// Plain text addressed to the user.
    Message(String),
}

/// Result of a full [`Agent::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Terminated { turns: u32 },
    BudgetExhausted { turns: u32 },
}

impl RunOutcome {
    pub fn turns(&self) -> u32 {
        match self {
            RunOutcome::Terminated { turns } | RunOutcome::BudgetExhausted { turns } => *turns,
        }
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Initialized,
    Running { turn: u32 },
    Terminated { turn: u32 },
    BudgetExhausted,
}

// ── AgentBuilder ───────────────────────────────────────────────────

/// Runs the initialization sequence for an [`Agent`].
///
/// Order: environment, model, logging sink, tool registry, system prompt,
/// instruction. Each step fails fatally if its precondition is unmet.
///
/// ```ignore
/// let agent = Agent::builder(&workdir)
///     .with_tools(filesystem_tools())
///     .with_debug(true)
///     .build()?;
/// ```
pub struct AgentBuilder {
    root: PathBuf,
    config: Option<SessionConfig>,
    tools: Vec<Box<dyn Tool>>,
    model: Option<Box<dyn LanguageModel>>,
    handlers: Vec<Box<dyn EventHandler>>,
    identity: Option<String>,
    guidance: Option<String>,
    instruction: Option<String>,
    compression: CompressionPolicy,
    file_log: bool,
    debug: bool,
}

impl AgentBuilder {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            config: None,
            tools: Vec::new(),
            model: None,
            handlers: Vec::new(),
            identity: None,
            guidance: None,
            instruction: None,
            compression: CompressionPolicy::default(),
            file_log: true,
            debug: false,
        }
    }

    /// Use this config instead of reading `.tagloop/config.json`.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Add tools to the catalog. The config's allow-list filters it.
    pub fn with_tools(mut self, tools: Vec<Box<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Add one tool to the catalog.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    /// Use this model instead of the one selected by `llm_type`.
    pub fn with_model(mut self, model: Box<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Attach an extra event handler, called after the built-in ones.
    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Replace the first line of the system prompt.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Domain guidance placed in the system prompt before the tool catalog.
    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }

    /// Use this instruction instead of reading `.tagloop/instruction.md`.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_compression(mut self, policy: CompressionPolicy) -> Self {
        self.compression = policy;
        self
    }

    /// Whether to append to `.tagloop/agent.log` (default `true`).
    pub fn with_file_log(mut self, enabled: bool) -> Self {
        self.file_log = enabled;
        self
    }

    /// Debug mode: the log file records full LLM query payloads.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Run the initialization sequence.
    pub fn build(self) -> Result<Agent, InitError> {
        // 1. Environment.
        let env = match self.config {
            Some(config) => {
                AgentEnvironment::new(&self.root, config).map_err(InitError::InvalidConfig)?
            }
            None => AgentEnvironment::load(&self.root)?,
        };

        // 2. Model.
        let model = match self.model {
            Some(model) => model,
            None => llm::from_environment(&env)?,
        };

        // 3. Logging sink.
        let mut handler = CompositeEventHandler::new().with(LoggingHandler);
        if self.file_log {
            let file = FileLogHandler::open(&env.log_path(), self.debug)?;
            file.log("INIT", "Agent initialization started");
            file.log("INIT", &format!("Working directory: {}", env.root().display()));
            file.log("INIT", &format!("Debug mode: {}", self.debug));
            file.log("INIT", &format!("Max turns: {}", env.config().max_turns()));
            file.log("INIT", &format!("LLM: {}", model.name()));
            handler = handler.with(file);
        }
        for extra in self.handlers {
            handler = handler.with_boxed(extra);
        }

        // 4. Tool registry.
        let registry = ToolRegistry::from_catalog(&env, self.tools, env.config().allowed_tools())
            .map_err(InitError::Tools)?;

        let mut agent = Agent {
            env,
            model,
            registry,
            history: History::new(),
            handler: Box::new(handler),
            compression: self.compression,
            status: SessionStatus::Initialized,
            turns_taken: 0,
            debug: self.debug,
        };

        // 5. System prompt from the live catalog.
        let system = prompt::system_prompt(
            &agent.registry,
            self.identity.as_deref(),
            self.guidance.as_deref(),
        );
        agent.emit(&SessionEvent::SystemPrompt(&system));
        agent.history.push(HistoryEntry::system_prompt(system));

        // 6. Initial instruction.
        let instruction = match self.instruction {
            Some(text) => text,
            None => {
                let path = agent.env.instruction_path();
                if !path.exists() {
                    return Err(InitError::MissingInstruction(path));
                }
                std::fs::read_to_string(&path)?
            }
        };
        agent.inject_instruction(instruction);

        info!(
            "Session initialized: root={}, model={}, tools={}",
            agent.env.root().display(),
            agent.model.name(),
            agent.registry.len()
        );
        Ok(agent)
    }
}

// ── Agent ──────────────────────────────────────────────────────────

/// One coding session: history, tools and model, driven turn by turn.
///
/// The session object is owned by whatever drives it (CLI, bridge, test);
/// several can coexist in one process.
pub struct Agent {
    env: AgentEnvironment,
    model: Box<dyn LanguageModel>,
    registry: ToolRegistry,
    history: History,
    handler: Box<dyn EventHandler>,
    compression: CompressionPolicy,
    status: SessionStatus,
    turns_taken: u32,
    debug: bool,
}

impl Agent {
    /// Start building a session rooted at `working_dir`.
    pub fn builder(working_dir: impl Into<PathBuf>) -> AgentBuilder {
        AgentBuilder::new(working_dir.into())
    }

    pub fn env(&self) -> &AgentEnvironment {
        &self.env
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Number of model replies received so far.
    pub fn turns_taken(&self) -> u32 {
        self.turns_taken
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    fn emit(&self, event: &SessionEvent<'_>) {
        self.handler.on_event(event);
    }

    /// Append a user instruction to the history.
    pub fn inject_instruction(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.emit(&SessionEvent::UserInstruction(&text));
        self.history.push(HistoryEntry::user_instruction(text));
    }

    /// Dispatch one directive and record the result in history.
    ///
    /// Used by the turn loop and by callers executing a tool outside an
    /// LLM turn. Never fails; errors are carried in the record.
    pub async fn dispatch(&mut self, name: &str, arguments: ToolArgs) -> ToolCallRecord {
        self.emit(&SessionEvent::ToolCall {
            name,
            arguments: &arguments,
        });
        let record = self.registry.dispatch(name, arguments).await;
        self.record(record.clone());
        record
    }

    fn record(&mut self, record: ToolCallRecord) {
        let payload = json!({
            "arguments": record.arguments,
            "result": record.result,
            "error": record.error,
        });
        self.emit(&SessionEvent::ToolResult {
            name: &record.tool_name,
            payload: &payload,
        });
        self.history.push(HistoryEntry::tool_result(record));
    }

    /// One turn: compress, query, append the reply, dispatch every
    /// directive in textual order, then check for termination.
    ///
    /// A terminated session stays terminated: further steps do not query
    /// the model and report [`TurnOutcome::Terminated`] again.
    pub async fn step(&mut self, turn: u32) -> Result<TurnOutcome, LlmError> {
        if let SessionStatus::Terminated { turn: ended } = self.status {
            warn!("Ignoring turn {turn}: session terminated at turn {ended}");
            return Ok(TurnOutcome::Terminated);
        }
        self.status = SessionStatus::Running { turn };
        self.history.compress(&self.compression);

        let messages = self.history.to_messages();
        self.emit(&SessionEvent::LlmQuery {
            turn,
            messages: &messages,
        });
        let text = match self.model.generate(&messages).await {
            Ok(text) => text,
            Err(e) => {
                self.emit(&SessionEvent::Error(&format!("LLM call failed at turn {turn}: {e}")));
                return Err(e);
            }
        };
        self.turns_taken += 1;
        self.emit(&SessionEvent::LlmResponse { turn, text: &text });
        self.history.push(HistoryEntry::llm_response(text.clone()));

        let directives = protocol::scan_tool_calls(&text);
        let count = directives.len();
        for directive in directives {
            match directive {
                Directive::Call(ToolCallRequest { tool, arguments }) => {
                    self.dispatch(&tool, arguments).await;
                }
                Directive::Malformed(detail) => {
                    let record = ToolCallRecord::invalid(detail);
                    if let Some(error) = &record.error {
                        self.emit(&SessionEvent::Error(error));
                    }
                    self.record(record);
                }
            }
        }

        if protocol::is_termination(&text) {
            self.status = SessionStatus::Terminated { turn };
            self.emit(&SessionEvent::Termination {
                turn,
                reason: REASON_REQUESTED,
            });
            return Ok(TurnOutcome::Terminated);
        }

        if count > 0 {
            Ok(TurnOutcome::ToolCalls(count))
        } else {
            debug!("Assistant message (turn {turn}): {} chars", text.len());
            Ok(TurnOutcome::Message(text))
        }
    }

    /// Run turns `1..=max_turns` until termination.
    ///
    /// Running out of turns is an outcome, not an error.
    pub async fn run(&mut self) -> Result<RunOutcome, LlmError> {
        let max_turns = self.env.config().max_turns();
        info!("Agent run started: max_turns={max_turns}");
        for turn in 1..=max_turns {
            if self.step(turn).await? == TurnOutcome::Terminated {
                info!("Agent run finished after {turn} turns");
                return Ok(RunOutcome::Terminated { turns: turn });
            }
        }
        self.status = SessionStatus::BudgetExhausted;
        self.emit(&SessionEvent::Termination {
            turn: max_turns,
            reason: REASON_BUDGET,
        });
        Ok(RunOutcome::BudgetExhausted { turns: max_turns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::history::EntryKind;
    use crate::llm::LlmFuture;
    use crate::llm::mock::MockModel;
    use crate::tools::core::{ToolFuture, ToolOutput};
    use crate::tools::schema::{ArgKind, ToolArgument, ToolSchema};
    use crate::{CONFIG_FILE, INSTRUCTION_FILE, Message, SESSION_DIR};
    use serde_json::Value;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    struct Echo;

    impl Tool for Echo {
        fn name(&self) -> &str {
            "util.echo"
        }

        fn description(&self) -> String {
            "Echo text.".into()
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema::new().with_argument(ToolArgument::new("text", "", true, ArgKind::String))
        }

        fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
            let text = args.get("text").cloned().unwrap_or(Value::Null);
            Box::pin(async move { Ok(ToolOutput::success(json!({ "text": text }))) })
        }
    }

    struct Failing;

    impl LanguageModel for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn generate<'a>(&'a self, _messages: &'a [Message]) -> LlmFuture<'a> {
            Box::pin(async { Err(LlmError::Unauthorized("bad key".into())) })
        }
    }

    fn echo(text: &str) -> String {
        format!(r#"<tool_call>{{"tool": "util.echo", "arguments": {{"text": "{text}"}}}}</tool_call>"#)
    }

    fn agent(dir: &Path, script: Vec<String>, max_turns: u32) -> Agent {
        Agent::builder(dir)
            .with_config(SessionConfig {
                max_turns: Some(max_turns),
                ..Default::default()
            })
            .with_instruction("say things")
            .with_tool(Echo)
            .with_model(Box::new(MockModel::new(script)))
            .with_file_log(false)
            .build()
            .unwrap()
    }

    fn tool_names(agent: &Agent) -> Vec<String> {
        agent
            .history()
            .entries()
            .iter()
            .filter_map(|e| match e.kind() {
                EntryKind::ToolCallResult(r) => Some(r.tool_name.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn missing_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = Agent::builder(dir.path()).build().err().unwrap();
        assert!(matches!(err, InitError::MissingConfig(_)));
    }

    #[test]
    fn missing_instruction_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join(SESSION_DIR);
        std::fs::create_dir_all(&session).unwrap();
        std::fs::write(session.join(CONFIG_FILE), "{}").unwrap();
        let err = Agent::builder(dir.path()).build().err().unwrap();
        assert!(matches!(err, InitError::MissingInstruction(_)));
    }

    #[test]
    fn build_from_session_files() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join(SESSION_DIR);
        std::fs::create_dir_all(&session).unwrap();
        std::fs::write(session.join(CONFIG_FILE), r#"{"allowed_tools": ["util.echo"]}"#).unwrap();
        std::fs::write(session.join(INSTRUCTION_FILE), "Build a landing page").unwrap();

        let agent = Agent::builder(dir.path()).with_tool(Echo).build().unwrap();
        assert_eq!(agent.status(), SessionStatus::Initialized);
        assert_eq!(agent.model_name(), "mock");
        assert_eq!(agent.history().len(), 2);
        assert!(matches!(agent.history().entries()[0].kind(), EntryKind::SystemPrompt(p) if p.contains("util.echo")));
        assert!(matches!(agent.history().entries()[1].kind(), EntryKind::UserInstruction(t) if t == "Build a landing page"));

        let log = std::fs::read_to_string(session.join("agent.log")).unwrap();
        assert!(log.contains("Agent initialization started"));
        assert!(log.contains("USER_INSTRUCTION: Build a landing page"));
    }

    #[tokio::test]
    async fn every_directive_runs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let reply = format!("{} then {} and {}", echo("a"), echo("b"), echo("c"));
        let mut agent = agent(dir.path(), vec![reply], 5);

        assert_eq!(agent.step(1).await.unwrap(), TurnOutcome::ToolCalls(3));
        let texts: Vec<Value> = agent
            .history()
            .entries()
            .iter()
            .filter_map(|e| match e.kind() {
                EntryKind::ToolCallResult(r) => r.result.as_ref().map(|v| v["data"]["text"].clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[tokio::test]
    async fn malformed_body_becomes_invalid_record() {
        let dir = tempfile::tempdir().unwrap();
        let reply = format!("<tool_call>{{not json}}</tool_call>{}", echo("ok"));
        let mut agent = agent(dir.path(), vec![reply], 5);
        agent.step(1).await.unwrap();
        assert_eq!(tool_names(&agent), vec!["INVALID", "util.echo"]);
    }

    #[tokio::test]
    async fn exact_terminate_stops_without_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = agent(dir.path(), vec!["  <terminate>\n".into()], 5);
        let outcome = agent.run().await.unwrap();
        assert_eq!(outcome, RunOutcome::Terminated { turns: 1 });
        assert_eq!(agent.status(), SessionStatus::Terminated { turn: 1 });
        assert!(tool_names(&agent).is_empty());
    }

    #[tokio::test]
    async fn steps_after_termination_do_not_resume() {
        let dir = tempfile::tempdir().unwrap();
        let script = vec!["<terminate>".into(), echo("late")];
        let mut agent = agent(dir.path(), script, 5);
        assert_eq!(agent.step(1).await.unwrap(), TurnOutcome::Terminated);
        let entries = agent.history().len();

        assert_eq!(agent.step(2).await.unwrap(), TurnOutcome::Terminated);
        assert_eq!(agent.status(), SessionStatus::Terminated { turn: 1 });
        assert_eq!(agent.turns_taken(), 1);
        assert_eq!(agent.history().len(), entries);
        assert!(tool_names(&agent).is_empty());
    }

    #[tokio::test]
    async fn embedded_terminate_does_not_stop() {
        let dir = tempfile::tempdir().unwrap();
        let script = vec![
            format!("{} <terminate>", echo("x")),
            "Done soon. <terminate>".into(),
            "<terminate>".into(),
        ];
        let mut agent = agent(dir.path(), script, 10);
        assert_eq!(agent.run().await.unwrap(), RunOutcome::Terminated { turns: 3 });
        assert_eq!(tool_names(&agent), vec!["util.echo"]);
    }

    #[tokio::test]
    async fn budget_exhaustion_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = agent(dir.path(), vec!["still thinking".into()], 4);
        let outcome = agent.run().await.unwrap();
        assert_eq!(outcome, RunOutcome::BudgetExhausted { turns: 4 });
        assert_eq!(agent.status(), SessionStatus::BudgetExhausted);
        // system + instruction + 4 replies
        assert_eq!(agent.history().len(), 6);
    }

    #[tokio::test]
    async fn backend_error_aborts_the_step() {
        let dir = tempfile::tempdir().unwrap();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        let mut agent = Agent::builder(dir.path())
            .with_config(SessionConfig::default())
            .with_instruction("go")
            .with_model(Box::new(Failing))
            .with_file_log(false)
            .with_event_handler(crate::agent::events::FnEventHandler::new(move |event| {
                if let SessionEvent::Error(text) = event {
                    sink.lock().unwrap().push(text.to_string());
                }
            }))
            .build()
            .unwrap();

        let err = agent.run().await.unwrap_err();
        assert!(matches!(err, LlmError::Unauthorized(_)));
        assert_eq!(agent.history().len(), 2);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn anchors_survive_long_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = agent(dir.path(), vec![echo("loop")], 40);
        agent.run().await.unwrap();

        let entries = agent.history().entries();
        assert!(entries.len() > 50);
        assert!(!entries[0].is_compressed());
        assert!(!entries[1].is_compressed());
        assert!(entries[2].is_compressed());
    }

    #[tokio::test]
    async fn direct_dispatch_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = agent(dir.path(), vec!["<terminate>".into()], 1);
        let args = json!({"text": "manual"}).as_object().cloned().unwrap();
        let record = agent.dispatch("util.echo", args).await;
        assert!(record.succeeded());
        let record = agent.dispatch("nope", ToolArgs::new()).await;
        assert_eq!(record.error.as_deref(), Some("Unknown tool: nope"));
        assert_eq!(tool_names(&agent), vec!["util.echo", "nope"]);
    }
}
