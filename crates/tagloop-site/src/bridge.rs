//! Chat bridge: one user message in, one reply plus a file snapshot out.
//!
//! [`chat`] injects the message into a live session and pumps turns until
//! the model either terminates, answers in plain text, or uses up
//! [`ChatOptions::max_sub_turns`]. Replies that only carry tool calls keep
//! the pump going so the model sees their results. Retryable backend
//! failures are retried with the caller's [`RetryConfig`]; anything else is
//! returned.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tagloop::agent::harness::{Agent, TurnOutcome};
use tagloop::llm::LlmError;
use tagloop::llm::retry::RetryConfig;
use tracing::{debug, info, warn};

/// Default cap on turns per chat message.
pub const MAX_SUB_TURNS: u32 = 15;

/// Reply sent when the model terminates the session.
pub const FINISHED_REPLY: &str = "I have finished the task.";

/// File extensions included in the working-directory snapshot.
pub const SNAPSHOT_EXTENSIONS: &[&str] = &["html", "css", "js", "jsx", "json", "md", "txt"];

#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Turns allowed before the reply is returned regardless. Default: 15.
    pub max_sub_turns: u32,
    /// Backoff for retryable LLM failures. Default: no retries.
    pub retry: RetryConfig,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_sub_turns: MAX_SUB_TURNS,
            retry: RetryConfig::default(),
        }
    }
}

/// Outcome of one [`chat`] call.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    /// Text for the user; empty if the turn cap was hit.
    pub reply: String,
    /// Non-hidden text files in the working directory, by relative path.
    pub files: BTreeMap<String, String>,
    pub sub_turns: u32,
    /// Whether the model terminated the session.
    pub finished: bool,
}

/// Handle one user message against a live session.
pub async fn chat(
    agent: &mut Agent,
    message: &str,
    options: &ChatOptions,
) -> Result<ChatReply, LlmError> {
    agent.inject_instruction(message);

    let mut reply = String::new();
    let mut finished = false;
    let mut sub_turns = 0;
    while sub_turns < options.max_sub_turns {
        sub_turns += 1;
        let turn = agent.turns_taken() + 1;
        match step_with_retry(agent, turn, &options.retry).await? {
            TurnOutcome::Terminated => {
                reply = FINISHED_REPLY.to_string();
                finished = true;
                break;
            }
            TurnOutcome::ToolCalls(n) => {
                debug!("Chat sub-turn {sub_turns}: {n} tool call(s)");
            }
            TurnOutcome::Message(text) => {
                reply = text;
                break;
            }
        }
    }
    if reply.is_empty() && !finished {
        info!("Chat stopped after {sub_turns} sub-turns without a reply");
    }

    let root = agent.env().root().to_path_buf();
    let files = match tokio::task::spawn_blocking(move || snapshot_files(&root)).await {
        Ok(files) => files,
        Err(e) => {
            warn!("File snapshot failed: {e}");
            BTreeMap::new()
        }
    };

    Ok(ChatReply {
        reply,
        files,
        sub_turns,
        finished,
    })
}

/// Run one turn, retrying retryable failures. A failed step leaves the
/// history untouched, so it is safe to repeat.
async fn step_with_retry(
    agent: &mut Agent,
    turn: u32,
    retry: &RetryConfig,
) -> Result<TurnOutcome, LlmError> {
    let mut attempt = 0;
    loop {
        match agent.step(turn).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let delay = retry.delay_for_error(&e, attempt);
                warn!(
                    "Turn {turn} failed ({e}); retry {}/{} in {:.1}s",
                    attempt + 1,
                    retry.max_retries,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ── Snapshot ───────────────────────────────────────────────────────

/// Read every non-hidden text file under `root`, keyed by slash-separated
/// relative path. Hidden files and anything under a hidden directory are
/// skipped, as are symlinks and files that are not valid UTF-8.
pub fn snapshot_files(root: &Path) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    collect(root, "", &mut files);
    files
}

fn collect(dir: &Path, prefix: &str, files: &mut BTreeMap<String, String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let rel = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        if file_type.is_dir() {
            collect(&entry.path(), &rel, files);
        } else if file_type.is_file() && has_snapshot_extension(&name) {
            if let Ok(content) = std::fs::read_to_string(entry.path()) {
                files.insert(rel, content);
            }
        }
    }
}

fn has_snapshot_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SNAPSHOT_EXTENSIONS.contains(&e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_skips_hidden_and_binary_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("css")).unwrap();
        std::fs::create_dir_all(root.join(".tagloop")).unwrap();
        std::fs::write(root.join("index.html"), "<html></html>").unwrap();
        std::fs::write(root.join("css/site.css"), "body {}").unwrap();
        std::fs::write(root.join(".tagloop/config.json"), "{}").unwrap();
        std::fs::write(root.join(".env.json"), "{}").unwrap();
        std::fs::write(root.join("logo.png"), [0u8, 159, 146, 150]).unwrap();
        std::fs::write(root.join("bad.txt"), [0xffu8, 0xfe]).unwrap();

        let files = snapshot_files(root);
        let keys: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["css/site.css", "index.html"]);
        assert_eq!(files["css/site.css"], "body {}");
    }

    #[test]
    fn extension_filter() {
        assert!(has_snapshot_extension("app.jsx"));
        assert!(has_snapshot_extension("README.md"));
        assert!(!has_snapshot_extension("Makefile"));
        assert!(!has_snapshot_extension("photo.jpg"));
    }
}
