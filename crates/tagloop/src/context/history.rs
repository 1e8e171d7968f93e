//! The conversation history: typed, append-only, compressible entries.

use crate::context::compression::{
    ASSISTANT_SUMMARY, CompressionPolicy, TOOL_SUMMARY, USER_SUMMARY_CHARS, USER_SUMMARY_PREFIX,
    char_prefix,
};
use crate::protocol;
use crate::tools::core::ToolCallRecord;
use crate::{Message, MessageRole};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::debug;

/// Payload of a [`HistoryEntry`].
#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    /// Protocol description and tool catalog. Never compressed.
    SystemPrompt(String),
    /// Instruction text from the user.
    UserInstruction(String),
    /// Raw model output.
    LlmResponse(String),
    /// Outcome of one dispatched tool call.
    ToolCallResult(ToolCallRecord),
}

/// One entry in the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    kind: EntryKind,
    compressed: bool,
    timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            compressed: false,
            timestamp: Utc::now(),
        }
    }

    pub fn system_prompt(text: impl Into<String>) -> Self {
        Self::new(EntryKind::SystemPrompt(text.into()))
    }

    pub fn user_instruction(text: impl Into<String>) -> Self {
        Self::new(EntryKind::UserInstruction(text.into()))
    }

    pub fn llm_response(text: impl Into<String>) -> Self {
        Self::new(EntryKind::LlmResponse(text.into()))
    }

    pub fn tool_result(record: ToolCallRecord) -> Self {
        Self::new(EntryKind::ToolCallResult(record))
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn role(&self) -> MessageRole {
        match self.kind {
            EntryKind::SystemPrompt(_) => MessageRole::System,
            EntryKind::UserInstruction(_) => MessageRole::User,
            EntryKind::LlmResponse(_) => MessageRole::Assistant,
            EntryKind::ToolCallResult(_) => MessageRole::Tool,
        }
    }

    /// Raw text of a model response.
    pub fn response_text(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::LlmResponse(text) if !self.compressed => Some(text),
            _ => None,
        }
    }

    /// The response contains a `<tool_call>` opening tag.
    pub fn is_tool_call(&self) -> bool {
        self.response_text().is_some_and(protocol::contains_tool_call)
    }

    /// The trimmed response is exactly `<terminate>`.
    pub fn is_termination(&self) -> bool {
        self.response_text().is_some_and(protocol::is_termination)
    }

    /// A response that is neither a tool call nor termination.
    pub fn is_message(&self) -> bool {
        self.response_text().is_some() && !self.is_tool_call() && !self.is_termination()
    }

    /// Replace the entry's detail with its placeholder. Returns `true` if
    /// the entry changed; system prompts and compressed entries never do.
    pub fn compress(&mut self) -> bool {
        if self.compressed {
            return false;
        }
        match &mut self.kind {
            EntryKind::SystemPrompt(_) => return false,
            EntryKind::UserInstruction(text) => *text = char_prefix(text, USER_SUMMARY_CHARS),
            EntryKind::LlmResponse(text) => text.clear(),
            EntryKind::ToolCallResult(record) => {
                record.arguments.clear();
                record.result = None;
                record.error = None;
            }
        }
        self.compressed = true;
        true
    }

    /// Content view: a string, or an object for tool results.
    pub fn render_content(&self) -> Value {
        match (&self.kind, self.compressed) {
            (EntryKind::SystemPrompt(text), _) => Value::String(text.clone()),
            (EntryKind::UserInstruction(text), false) | (EntryKind::LlmResponse(text), false) => {
                Value::String(text.clone())
            }
            (EntryKind::UserInstruction(prefix), true) => {
                Value::String(format!("{USER_SUMMARY_PREFIX}{prefix}..."))
            }
            (EntryKind::LlmResponse(_), true) => Value::String(ASSISTANT_SUMMARY.to_string()),
            (EntryKind::ToolCallResult(record), false) => record.to_value(),
            (EntryKind::ToolCallResult(record), true) => json!({
                "tool_name": record.tool_name,
                "summary": TOOL_SUMMARY,
            }),
        }
    }

    /// Role-tagged message; object content is sent as compact JSON.
    pub fn to_message(&self) -> Message {
        let content = match self.render_content() {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Message::new(self.role(), content)
    }
}

/// Append-only sequence of [`HistoryEntry`].
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Render every entry as a role-tagged message.
    pub fn to_messages(&self) -> Vec<Message> {
        self.entries.iter().map(HistoryEntry::to_message).collect()
    }

    /// Apply one compression pass. Returns the number of newly compressed
    /// entries.
    pub fn compress(&mut self, policy: &CompressionPolicy) -> usize {
        let Some(range) = policy.range(self.entries.len()) else {
            return 0;
        };
        let compressed = self.entries[range.clone()]
            .iter_mut()
            .map(HistoryEntry::compress)
            .filter(|changed| *changed)
            .count();
        if compressed > 0 {
            debug!(
                "Compressed {compressed} history entries in [{}, {})",
                range.start, range.end
            );
        }
        compressed
    }
}
