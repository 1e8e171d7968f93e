//! Scripted model for deterministic sessions and tests.

use crate::Message;
use crate::agent::env::AgentEnvironment;
use crate::llm::{LanguageModel, LlmFuture};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// JSON array of reply strings inside the session directory.
pub const MOCK_RESPONSES_JSON: &str = "mock_responses.json";

/// One reply per non-blank line inside the session directory.
pub const MOCK_RESPONSES_TXT: &str = "mock_responses.txt";

/// Script used when no responses are configured: look around, report, stop.
pub const DEFAULT_SCRIPT: &[&str] = &[
    r#"<tool_call>{"tool": "fs.ls", "arguments": {"path": "."}}</tool_call>"#,
    "I have inspected the project layout.",
    "<terminate>",
];

/// Replays a fixed list of replies, wrapping around at the end.
#[derive(Debug)]
pub struct MockModel {
    responses: Vec<String>,
    cursor: AtomicUsize,
}

impl MockModel {
    /// A model replaying `responses`. An empty list falls back to
    /// [`DEFAULT_SCRIPT`].
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut responses: Vec<String> = responses.into_iter().map(Into::into).collect();
        if responses.is_empty() {
            responses = DEFAULT_SCRIPT.iter().map(|s| (*s).to_string()).collect();
        }
        Self {
            responses,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Pick the script for a session, in order: config `mock_responses`,
    /// `mock_responses.json`, `mock_responses.txt`, then the default.
    pub fn from_session(env: &AgentEnvironment) -> Self {
        if let Some(responses) = env.config().mock_responses.as_ref().filter(|r| !r.is_empty()) {
            debug!("Mock model: {} responses from config", responses.len());
            return Self::new(responses.clone());
        }
        if let Some(responses) = read_json_script(&env.session_file(MOCK_RESPONSES_JSON)) {
            debug!("Mock model: {} responses from {MOCK_RESPONSES_JSON}", responses.len());
            return Self::new(responses);
        }
        if let Some(responses) = read_text_script(&env.session_file(MOCK_RESPONSES_TXT)) {
            debug!("Mock model: {} responses from {MOCK_RESPONSES_TXT}", responses.len());
            return Self::new(responses);
        }
        debug!("Mock model: default script");
        Self::new(Vec::<String>::new())
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }
}

impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate<'a>(&'a self, _messages: &'a [Message]) -> LlmFuture<'a> {
        let n = self.cursor.fetch_add(1, Ordering::SeqCst);
        let reply = self.responses[n % self.responses.len()].clone();
        Box::pin(async move { Ok(reply) })
    }
}

fn read_json_script(path: &Path) -> Option<Vec<String>> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Vec<String>>(&data) {
        Ok(responses) if !responses.is_empty() => Some(responses),
        Ok(_) => None,
        Err(e) => {
            warn!("Ignoring {}: {e}", path.display());
            None
        }
    }
}

fn read_text_script(path: &Path) -> Option<Vec<String>> {
    let data = std::fs::read_to_string(path).ok()?;
    let lines: Vec<String> = data
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();
    (!lines.is_empty()).then_some(lines)
}
