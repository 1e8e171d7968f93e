//! Persistent todo list (`todo.*`).
//!
//! Items live in `.tagloop/todo.json` as an array of records with integer
//! IDs. IDs are never reused: the highest ID ever issued is kept in
//! `.tagloop/todo.seq`, so removing the newest item does not free its ID.

use crate::store;
use crate::tools::{TODO_ADD, TODO_COMPLETE, TODO_LIST, TODO_REMOVE};
use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tagloop::agent::env::AgentEnvironment;
use tagloop::tools::{Tool, ToolArgs, ToolError, ToolFuture, ToolOutput, ToolSchema, parse_tool_args};
use tracing::debug;

/// Registry file inside the session directory.
pub const TODO_FILE: &str = "todo.json";

/// High-water mark of issued IDs inside the session directory.
pub const TODO_SEQ_FILE: &str = "todo.seq";

// ── Records ────────────────────────────────────────────────────────

/// Item status. Values written by hand or by other tools are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TodoStatus {
    Pending,
    Completed,
    Other(String),
}

impl From<String> for TodoStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => TodoStatus::Pending,
            "completed" => TodoStatus::Completed,
            _ => TodoStatus::Other(raw),
        }
    }
}

impl From<TodoStatus> for String {
    fn from(status: TodoStatus) -> Self {
        match status {
            TodoStatus::Pending => "pending".into(),
            TodoStatus::Completed => "completed".into(),
            TodoStatus::Other(raw) => raw,
        }
    }
}

fn pending() -> TodoStatus {
    TodoStatus::Pending
}

/// Typed view of one record. Only `id` is required; records without an
/// integer ID stay on disk but are not listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default = "pending")]
    pub status: TodoStatus,
    /// RFC 3339, UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl TodoItem {
    fn from_record(record: &Value) -> Option<Self> {
        serde_json::from_value(record.clone()).ok()
    }
}

fn record_id(record: &Value) -> Option<u64> {
    record.get("id").and_then(Value::as_u64)
}

/// `status` argument of `todo.list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(TodoStatus),
}

impl StatusFilter {
    /// Parse `all`, `pending` or `completed`, ignoring case.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "all" => Some(StatusFilter::All),
            "pending" => Some(StatusFilter::Only(TodoStatus::Pending)),
            "completed" => Some(StatusFilter::Only(TodoStatus::Completed)),
            _ => None,
        }
    }

    fn matches(&self, item: &TodoItem) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => item.status == *status,
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ── TodoStore ──────────────────────────────────────────────────────

/// Read-modify-write access to the todo registry of one session.
///
/// The file is handled as raw JSON records, so fields and statuses this
/// module does not know survive every write.
#[derive(Debug, Clone)]
pub struct TodoStore {
    dir: PathBuf,
}

impl TodoStore {
    /// A store rooted at a session directory.
    pub fn new(session_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: session_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TODO_FILE)
    }

    fn seq_path(&self) -> PathBuf {
        self.dir.join(TODO_SEQ_FILE)
    }

    /// Create an empty registry if none exists.
    pub fn ensure(&self) -> Result<(), String> {
        if self.path().exists() {
            return Ok(());
        }
        store::save_atomic(&self.path(), &Vec::<Value>::new())
    }

    fn records(&self) -> Vec<Value> {
        store::load_or_default(&self.path())
    }

    fn save(&self, records: &[Value]) -> Result<(), String> {
        store::save_atomic(&self.path(), &records)
    }

    /// Every record that reads as an item, in file order.
    pub fn load(&self) -> Vec<TodoItem> {
        self.records().iter().filter_map(TodoItem::from_record).collect()
    }

    fn high_water(&self) -> u64 {
        read_seq(&self.seq_path()).unwrap_or(0)
    }

    /// Append a pending item under the next unused ID.
    pub fn add(&self, description: &str) -> Result<TodoItem, String> {
        let mut records = self.records();
        let max_present = records.iter().filter_map(record_id).max().unwrap_or(0);
        let id = self.high_water().max(max_present) + 1;

        let item = TodoItem {
            id,
            description: description.to_string(),
            status: TodoStatus::Pending,
            created_at: Some(now()),
            completed_at: None,
        };
        let record =
            serde_json::to_value(&item).map_err(|e| format!("failed to encode todo {id}: {e}"))?;
        records.push(record);
        self.save(&records)?;
        std::fs::write(self.seq_path(), id.to_string())
            .map_err(|e| format!("failed to write {TODO_SEQ_FILE}: {e}"))?;
        debug!("Todo {id} added");
        Ok(item)
    }

    pub fn list(&self, filter: &StatusFilter) -> Vec<TodoItem> {
        self.load().into_iter().filter(|i| filter.matches(i)).collect()
    }

    /// Mark an item completed. `Ok(None)` when the ID is unknown, in which
    /// case nothing is written.
    pub fn complete(&self, id: u64) -> Result<Option<TodoItem>, String> {
        let mut records = self.records();
        let Some(fields) = records
            .iter_mut()
            .filter(|r| record_id(r) == Some(id))
            .find_map(Value::as_object_mut)
        else {
            return Ok(None);
        };
        fields.insert("status".into(), json!("completed"));
        fields.insert("completed_at".into(), json!(now()));
        let done = TodoItem::from_record(&Value::Object(fields.clone()))
            .ok_or_else(|| format!("todo {id} is not a valid item"))?;
        self.save(&records)?;
        Ok(Some(done))
    }

    /// Remove an item, returning it and the number of records left.
    pub fn remove(&self, id: u64) -> Result<Option<(TodoItem, usize)>, String> {
        let mut records = self.records();
        let Some(pos) = records.iter().position(|r| record_id(r) == Some(id)) else {
            return Ok(None);
        };
        let removed = records.remove(pos);
        let item = TodoItem::from_record(&removed)
            .ok_or_else(|| format!("todo {id} is not a valid item"))?;
        self.save(&records)?;
        Ok(Some((item, records.len())))
    }
}

fn read_seq(path: &Path) -> Option<u64> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn not_found(id: u64) -> ToolOutput {
    ToolOutput::failure(format!("Todo id {id} not found"))
}

fn bound<'a>(store: &'a Option<TodoStore>, name: &str) -> Result<&'a TodoStore, ToolError> {
    store
        .as_ref()
        .ok_or_else(|| ToolError::NotInitialized(name.to_string()))
}

fn init_store(env: &AgentEnvironment) -> Result<TodoStore, String> {
    let store = TodoStore::new(env.session_dir());
    store.ensure()?;
    Ok(store)
}

// ── Arguments ──────────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct AddArgs {
    /// What needs doing.
    pub description: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct ListArgs {
    /// 'all' (default), 'pending' or 'completed'.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct IdArgs {
    /// Todo item ID.
    pub id: u64,
}

// ── Tools ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct AddTodo {
    store: Option<TodoStore>,
}

impl Tool for AddTodo {
    fn name(&self) -> &str {
        TODO_ADD
    }

    fn description(&self) -> String {
        "Add a pending item to the project todo list.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<AddArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.store = Some(init_store(env)?);
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<AddArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let store = bound(&self.store, TODO_ADD)?;
            if args.description.trim().is_empty() {
                return Ok(ToolOutput::failure("Missing description"));
            }
            let item = store.add(&args.description).map_err(ToolError::Failed)?;
            Ok(ToolOutput::success(json!({ "item": item })))
        })
    }
}

#[derive(Default)]
pub struct ListTodos {
    store: Option<TodoStore>,
}

impl Tool for ListTodos {
    fn name(&self) -> &str {
        TODO_LIST
    }

    fn description(&self) -> String {
        "List todo items, optionally filtered by status.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<ListArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.store = Some(init_store(env)?);
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<ListArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let store = bound(&self.store, TODO_LIST)?;
            let Some(filter) = StatusFilter::parse(args.status.as_deref().unwrap_or("all")) else {
                return Ok(ToolOutput::failure("Invalid status filter"));
            };
            let items = store.list(&filter);
            Ok(ToolOutput::success(json!({
                "count": items.len(),
                "items": items,
            })))
        })
    }
}

#[derive(Default)]
pub struct CompleteTodo {
    store: Option<TodoStore>,
}

impl Tool for CompleteTodo {
    fn name(&self) -> &str {
        TODO_COMPLETE
    }

    fn description(&self) -> String {
        "Mark a todo item as completed.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<IdArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.store = Some(init_store(env)?);
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<IdArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let store = bound(&self.store, TODO_COMPLETE)?;
            match store.complete(args.id).map_err(ToolError::Failed)? {
                Some(item) => Ok(ToolOutput::success(json!({ "item": item }))),
                None => Ok(not_found(args.id)),
            }
        })
    }
}

#[derive(Default)]
pub struct RemoveTodo {
    store: Option<TodoStore>,
}

impl Tool for RemoveTodo {
    fn name(&self) -> &str {
        TODO_REMOVE
    }

    fn description(&self) -> String {
        "Remove a todo item. Its ID is not reused.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<IdArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.store = Some(init_store(env)?);
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<IdArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let store = bound(&self.store, TODO_REMOVE)?;
            match store.remove(args.id).map_err(ToolError::Failed)? {
                Some((item, remaining)) => Ok(ToolOutput::success(json!({
                    "removed": true,
                    "item": item,
                    "remaining": remaining,
                }))),
                None => Ok(not_found(args.id)),
            }
        })
    }
}
