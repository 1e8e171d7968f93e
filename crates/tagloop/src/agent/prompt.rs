//! System prompt rendering.
//!
//! The system prompt is the first history entry of every session. It is
//! rendered once, after the tool registry is built, so the catalog it lists
//! is exactly the set of tools the model may call.

use crate::protocol::{TERMINATE_TAG, TOOL_CALL_CLOSE, TOOL_CALL_OPEN};
use crate::tools::core::ToolRegistry;

/// Opening line used when the caller supplies no identity.
pub const DEFAULT_IDENTITY: &str =
    "You are tagloop, a deterministic coding agent working inside a sandboxed project directory.";

const STRATEGY: &str = "(1) Read the instruction; (2) inspect the project; (3) create or edit files; \
(4) verify your changes; (5) iterate on failures; (6) terminate when done.";

const CONSTRAINTS: &str = "Stay within the working directory. Never modify protected files. \
Make minimal, explicit edits and include file names in every action.";

// ── SystemPromptBuilder ────────────────────────────────────────────

/// Builder for multi-section system prompts.
///
/// Sections are joined with blank lines. Empty sections, and `None`
/// passed to the `_opt` variants, are skipped.
///
/// # Example
///
/// ```
/// use tagloop::agent::prompt::SystemPromptBuilder;
///
/// let prompt = SystemPromptBuilder::new("You are an agent.")
///     .section("Context", "The project is a static site.")
///     .section_opt("Missing", None::<String>)
///     .build();
///
/// assert!(prompt.contains("## Context"));
/// assert!(!prompt.contains("## Missing"));
/// ```
pub struct SystemPromptBuilder {
    sections: Vec<String>,
}

impl SystemPromptBuilder {
    /// Start with a preamble, included as-is.
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append a section under a `## ` heading. Skipped if `content` is empty.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("## {heading}\n{content}"));
        }
        self
    }

    /// Append a section only if the content is `Some`.
    pub fn section_opt(self, heading: &str, content: Option<impl Into<String>>) -> Self {
        match content {
            Some(c) => self.section(heading, c),
            None => self,
        }
    }

    /// Append raw text without a heading. Skipped if `content` is empty.
    pub fn raw(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(content);
        }
        self
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

// ── Rendering ──────────────────────────────────────────────────────

/// One `- name(signature): description` line per registered tool.
pub fn tool_catalog(registry: &ToolRegistry) -> String {
    registry
        .tools()
        .map(|tool| {
            format!(
                "- {}({}): {}",
                tool.name(),
                tool.schema().signature(),
                tool.description()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The directive grammar, shown verbatim to the model.
pub fn protocol_section() -> String {
    format!(
        "Call a tool:\n{TOOL_CALL_OPEN}{{\"tool\":\"TOOL_NAME\",\"arguments\":{{\"arg1\":\"val\"}}}}{TOOL_CALL_CLOSE}\n\
         You may emit several calls in one reply; they run in order.\n\
         When the task is complete, reply with exactly:\n{TERMINATE_TAG}"
    )
}

/// Render the full system prompt for `registry`.
///
/// `identity` replaces [`DEFAULT_IDENTITY`]; `guidance` is an optional
/// domain-specific section placed before the tool catalog.
pub fn system_prompt(registry: &ToolRegistry, identity: Option<&str>, guidance: Option<&str>) -> String {
    let catalog = tool_catalog(registry);
    SystemPromptBuilder::new(identity.unwrap_or(DEFAULT_IDENTITY))
        .section("Protocol", protocol_section())
        .section("Strategy", STRATEGY)
        .section("Constraints", CONSTRAINTS)
        .section_opt("Guidance", guidance)
        .section(
            "Available tools",
            if catalog.is_empty() {
                "(none)".to_string()
            } else {
                catalog
            },
        )
        .build()
}
