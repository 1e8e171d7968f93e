//! Sandboxed filesystem tools.
//!
//! Every tool resolves its `path` argument through the session
//! [`Sandbox`]; a path that escapes the working directory raises
//! [`ToolError::OutsideSandbox`]. Mutating tools (`fs.write`, `fs.edit`,
//! `fs.delete`, `fs.rmdir`) also consult the path policy and report a
//! protected path as a logical failure. Reads and listings are only subject
//! to containment.
//!
//! | Tool | Name | Purpose |
//! |------|------|---------|
//! | [`WriteFile`] | `fs.write` | Create or overwrite a file |
//! | [`ReadFile`] | `fs.read` | Read a text file |
//! | [`EditFile`] | `fs.edit` | Replace the first occurrence of a substring |
//! | [`DeleteFile`] | `fs.delete` | Remove a file |
//! | [`MakeDir`] | `fs.mkdir` | Create a directory and its parents |
//! | [`RemoveDir`] | `fs.rmdir` | Remove a directory |
//! | [`ListDir`] | `fs.ls` | List a directory |
//! | [`Tree`] | `fs.tree` | Render a directory tree |

use crate::agent::env::AgentEnvironment;
use crate::tools::core::{Tool, ToolArgs, ToolError, ToolFuture, ToolOutput, parse_tool_args};
use crate::tools::names;
use crate::tools::sandbox::Sandbox;
use crate::tools::schema::ToolSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Default depth for `fs.tree`.
pub const DEFAULT_TREE_DEPTH: u32 = 3;

/// All filesystem tools, uninitialized, in catalog order.
pub fn filesystem_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(WriteFile::default()),
        Box::new(ReadFile::default()),
        Box::new(EditFile::default()),
        Box::new(DeleteFile::default()),
        Box::new(MakeDir::default()),
        Box::new(RemoveDir::default()),
        Box::new(ListDir::default()),
        Box::new(Tree::default()),
    ]
}

// ── Typed argument structs ──────────────────────────────────────────

/// Arguments for `fs.write`.
#[derive(Deserialize, JsonSchema)]
pub struct WriteArgs {
    /// File path relative to the working directory (e.g. 'src/index.html').
    pub path: String,
    /// Full file content to write.
    pub content: String,
}

/// Arguments for tools that take a single path.
#[derive(Deserialize, JsonSchema)]
pub struct PathArgs {
    /// Path relative to the working directory.
    pub path: String,
}

/// Arguments for `fs.edit`.
#[derive(Deserialize, JsonSchema)]
pub struct EditArgs {
    /// File path relative to the working directory.
    pub path: String,
    /// Exact text to find; only the first occurrence is replaced.
    pub old_text: String,
    /// Replacement text.
    pub new_text: String,
}

/// Arguments for `fs.rmdir`.
#[derive(Deserialize, JsonSchema)]
pub struct RemoveDirArgs {
    /// Directory path relative to the working directory.
    pub path: String,
    /// Remove the directory and everything in it (default false).
    #[serde(default)]
    pub recursive: Option<bool>,
}

/// Arguments for `fs.ls`.
#[derive(Deserialize, JsonSchema)]
pub struct ListArgs {
    /// Directory to list (default '.').
    #[serde(default)]
    pub path: Option<String>,
}

/// Arguments for `fs.tree`.
#[derive(Deserialize, JsonSchema)]
pub struct TreeArgs {
    /// Directory to render (default '.').
    #[serde(default)]
    pub path: Option<String>,
    /// Maximum depth to descend (default 3).
    #[serde(default)]
    pub max_depth: Option<u32>,
}

// ── Helpers ─────────────────────────────────────────────────────────

fn bound<'a>(sandbox: &'a Option<Sandbox>, name: &str) -> Result<&'a Sandbox, ToolError> {
    sandbox
        .as_ref()
        .ok_or_else(|| ToolError::NotInitialized(name.to_string()))
}

fn protected(rel: &str) -> ToolOutput {
    ToolOutput::failure(format!("Attempt to modify protected file: {rel}"))
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

/// Lines in `content`, counting a trailing partial line.
fn line_count(content: &str) -> usize {
    let newlines = content.matches('\n').count();
    if content.is_empty() || content.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// Directories first, then case-insensitive name.
fn sort_key(is_dir: bool, name: &str) -> (bool, String) {
    (!is_dir, name.to_lowercase())
}

// ── WriteFile ───────────────────────────────────────────────────────

/// Create or overwrite a file, creating parent directories.
#[derive(Default)]
pub struct WriteFile {
    sandbox: Option<Sandbox>,
}

impl Tool for WriteFile {
    fn name(&self) -> &str {
        names::FS_WRITE
    }

    fn description(&self) -> String {
        "Create or overwrite a file. Creates parent directories.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<WriteArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.sandbox = Some(env.sandbox().clone());
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<WriteArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let sandbox = bound(&self.sandbox, names::FS_WRITE)?;
            let path = sandbox.resolve(&args.path)?;
            let rel = sandbox.relative(&path);
            if sandbox.is_protected(&path) {
                return Ok(protected(&rel));
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, args.content.as_bytes()).await?;
            debug!("Wrote {} bytes to {rel}", args.content.len());
            Ok(ToolOutput::success(json!({
                "path": rel,
                "size_bytes": args.content.len(),
            })))
        })
    }
}

// ── ReadFile ────────────────────────────────────────────────────────

/// Read a UTF-8 text file.
#[derive(Default)]
pub struct ReadFile {
    sandbox: Option<Sandbox>,
}

impl Tool for ReadFile {
    fn name(&self) -> &str {
        names::FS_READ
    }

    fn description(&self) -> String {
        "Read a file. Returns content, size_bytes and line_count.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<PathArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.sandbox = Some(env.sandbox().clone());
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<PathArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let sandbox = bound(&self.sandbox, names::FS_READ)?;
            let path = sandbox.resolve(&args.path)?;
            let rel = sandbox.relative(&path);
            if !is_file(&path).await {
                return Ok(ToolOutput::failure(format!("File not found: {rel}")));
            }
            let content = fs::read_to_string(&path).await?;
            Ok(ToolOutput::success(json!({
                "path": rel,
                "size_bytes": content.len(),
                "line_count": line_count(&content),
                "content": content,
            })))
        })
    }
}

// ── EditFile ────────────────────────────────────────────────────────

/// Replace the first occurrence of `old_text` with `new_text`.
#[derive(Default)]
pub struct EditFile {
    sandbox: Option<Sandbox>,
}

impl Tool for EditFile {
    fn name(&self) -> &str {
        names::FS_EDIT
    }

    fn description(&self) -> String {
        "Edit a file by replacing the FIRST occurrence of old_text with new_text.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<EditArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.sandbox = Some(env.sandbox().clone());
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<EditArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let sandbox = bound(&self.sandbox, names::FS_EDIT)?;
            let path = sandbox.resolve(&args.path)?;
            let rel = sandbox.relative(&path);
            if sandbox.is_protected(&path) {
                return Ok(protected(&rel));
            }
            if !is_file(&path).await {
                return Ok(ToolOutput::failure(format!("File not found: {rel}")));
            }
            if args.old_text.is_empty() {
                return Ok(ToolOutput::failure("old_text must not be empty"));
            }
            let content = fs::read_to_string(&path).await?;
            if !content.contains(&args.old_text) {
                return Ok(ToolOutput::failure(format!("old_text not found in {rel}")));
            }
            let updated = content.replacen(&args.old_text, &args.new_text, 1);
            fs::write(&path, updated.as_bytes()).await?;
            Ok(ToolOutput::success(json!({ "path": rel, "replaced": 1 })))
        })
    }
}

// ── DeleteFile ──────────────────────────────────────────────────────

/// Remove a single file.
#[derive(Default)]
pub struct DeleteFile {
    sandbox: Option<Sandbox>,
}

impl Tool for DeleteFile {
    fn name(&self) -> &str {
        names::FS_DELETE
    }

    fn description(&self) -> String {
        "Delete a file.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<PathArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.sandbox = Some(env.sandbox().clone());
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<PathArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let sandbox = bound(&self.sandbox, names::FS_DELETE)?;
            let path = sandbox.resolve(&args.path)?;
            let rel = sandbox.relative(&path);
            if sandbox.is_protected(&path) {
                return Ok(protected(&rel));
            }
            if is_dir(&path).await {
                return Ok(ToolOutput::failure(format!(
                    "{rel} is a directory; use {} instead",
                    names::FS_RMDIR
                )));
            }
            if !is_file(&path).await {
                return Ok(ToolOutput::failure(format!("File not found: {rel}")));
            }
            fs::remove_file(&path).await?;
            Ok(ToolOutput::success(json!({ "path": rel })))
        })
    }
}

// ── MakeDir ─────────────────────────────────────────────────────────

/// Create a directory and any missing parents.
#[derive(Default)]
pub struct MakeDir {
    sandbox: Option<Sandbox>,
}

impl Tool for MakeDir {
    fn name(&self) -> &str {
        names::FS_MKDIR
    }

    fn description(&self) -> String {
        "Create a directory, including parents. No-op if it exists.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<PathArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.sandbox = Some(env.sandbox().clone());
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<PathArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let sandbox = bound(&self.sandbox, names::FS_MKDIR)?;
            let path = sandbox.resolve(&args.path)?;
            fs::create_dir_all(&path).await?;
            Ok(ToolOutput::success(json!({ "path": sandbox.relative(&path) })))
        })
    }
}

// ── RemoveDir ───────────────────────────────────────────────────────

/// Remove a directory, optionally with its contents.
#[derive(Default)]
pub struct RemoveDir {
    sandbox: Option<Sandbox>,
}

impl Tool for RemoveDir {
    fn name(&self) -> &str {
        names::FS_RMDIR
    }

    fn description(&self) -> String {
        "Remove a directory. Non-empty directories need recursive=true.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<RemoveDirArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.sandbox = Some(env.sandbox().clone());
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<RemoveDirArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let sandbox = bound(&self.sandbox, names::FS_RMDIR)?;
            let path = sandbox.resolve(&args.path)?;
            let rel = sandbox.relative(&path);
            if path == sandbox.root() {
                return Ok(ToolOutput::failure("Refusing to remove the working directory"));
            }
            if sandbox.is_protected(&path) {
                return Ok(protected(&rel));
            }
            if !is_dir(&path).await {
                return Ok(ToolOutput::failure(format!("Directory not found: {rel}")));
            }
            let recursive = args.recursive.unwrap_or(false);
            if recursive {
                fs::remove_dir_all(&path).await?;
            } else {
                let mut entries = fs::read_dir(&path).await?;
                if entries.next_entry().await?.is_some() {
                    return Ok(ToolOutput::failure(format!("Directory not empty: {rel}")));
                }
                fs::remove_dir(&path).await?;
            }
            Ok(ToolOutput::success(json!({ "path": rel, "recursive": recursive })))
        })
    }
}

// ── ListDir ─────────────────────────────────────────────────────────

/// List one directory level.
#[derive(Default)]
pub struct ListDir {
    sandbox: Option<Sandbox>,
}

impl Tool for ListDir {
    fn name(&self) -> &str {
        names::FS_LS
    }

    fn description(&self) -> String {
        "List directory contents as entries of {name, type, size}, directories first.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<ListArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.sandbox = Some(env.sandbox().clone());
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<ListArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let sandbox = bound(&self.sandbox, names::FS_LS)?;
            let path = sandbox.resolve(args.path.as_deref().unwrap_or("."))?;
            let rel = sandbox.relative(&path);
            if !is_dir(&path).await {
                return Ok(ToolOutput::failure(format!("Directory not found: {rel}")));
            }

            let mut rows = Vec::new();
            let mut dir = fs::read_dir(&path).await?;
            while let Some(entry) = dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let (is_dir, size) = match fs::metadata(entry.path()).await {
                    Ok(meta) if meta.is_dir() => (true, 0),
                    Ok(meta) => (false, meta.len()),
                    Err(_) => (false, 0),
                };
                rows.push((is_dir, name, size));
            }
            rows.sort_by_key(|(is_dir, name, _)| sort_key(*is_dir, name));

            let entries: Vec<_> = rows
                .into_iter()
                .map(|(is_dir, name, size)| {
                    json!({
                        "name": name,
                        "type": if is_dir { "dir" } else { "file" },
                        "size": size,
                    })
                })
                .collect();
            Ok(ToolOutput::success(json!({
                "path": rel,
                "count": entries.len(),
                "entries": entries,
            })))
        })
    }
}

// ── Tree ────────────────────────────────────────────────────────────

/// Render a directory tree with box-drawing connectors.
#[derive(Default)]
pub struct Tree {
    sandbox: Option<Sandbox>,
}

impl Tool for Tree {
    fn name(&self) -> &str {
        names::FS_TREE
    }

    fn description(&self) -> String {
        "Render a directory tree, skipping hidden entries. Returns a list of lines.".into()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::for_args::<TreeArgs>()
    }

    fn initialize(&mut self, env: &AgentEnvironment) -> Result<(), String> {
        self.sandbox = Some(env.sandbox().clone());
        Ok(())
    }

    fn execute(&self, args: &ToolArgs) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<TreeArgs>(args);
        Box::pin(async move {
            let args = parsed?;
            let sandbox = bound(&self.sandbox, names::FS_TREE)?;
            let base = sandbox.resolve(args.path.as_deref().unwrap_or("."))?;
            let rel = sandbox.relative(&base);
            if !is_dir(&base).await {
                return Ok(ToolOutput::failure(format!("Directory not found: {rel}")));
            }
            let max_depth = args.max_depth.unwrap_or(DEFAULT_TREE_DEPTH);
            let root_label = format!("{rel}/");
            let lines = tokio::task::spawn_blocking(move || render_tree(&base, &root_label, max_depth))
                .await
                .map_err(|e| ToolError::Failed(format!("tree walk failed: {e}")))?;
            Ok(ToolOutput::success(json!({ "path": rel, "lines": lines })))
        })
    }
}

/// Lines of a tree rooted at `base`, labelled `label` on the first line.
pub fn render_tree(base: &Path, label: &str, max_depth: u32) -> Vec<String> {
    let mut lines = vec![label.to_string()];
    walk(base, "", 0, max_depth, &mut lines);
    lines
}

fn walk(dir: &Path, prefix: &str, depth: u32, max_depth: u32, lines: &mut Vec<String>) {
    if depth >= max_depth {
        return;
    }
    let Ok(read) = std::fs::read_dir(dir) else {
        return;
    };
    let mut children: Vec<(bool, String, PathBuf)> = read
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                return None;
            }
            let path = entry.path();
            Some((path.is_dir(), name, path))
        })
        .collect();
    children.sort_by_key(|(is_dir, name, _)| sort_key(*is_dir, name));

    let last = children.len().saturating_sub(1);
    for (i, (is_dir, name, path)) in children.iter().enumerate() {
        let connector = if i == last { "└── " } else { "├── " };
        let suffix = if *is_dir { "/" } else { "" };
        lines.push(format!("{prefix}{connector}{name}{suffix}"));
        if *is_dir {
            let extension = if i == last { "    " } else { "│   " };
            walk(path, &format!("{prefix}{extension}"), depth + 1, max_depth, lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::env::SessionConfig;
    use crate::tools::core::ToolRegistry;
    use crate::tools::sandbox::PathPolicy;
    use serde_json::{Value, json};

    fn registry(dir: &Path, policy: PathPolicy) -> ToolRegistry {
        let env = AgentEnvironment::with_policy(dir, SessionConfig::default(), policy).unwrap();
        ToolRegistry::from_catalog(&env, filesystem_tools(), None).unwrap()
    }

    fn args(value: Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let tools = registry(dir.path(), PathPolicy::new());

        let record = tools
            .dispatch(names::FS_WRITE, args(json!({"path": "site/index.html", "content": "a\nb"})))
            .await;
        assert!(record.succeeded(), "{:?}", record.error);
        assert_eq!(record.result.as_ref().unwrap()["data"]["size_bytes"], 3);

        let record = tools
            .dispatch(names::FS_READ, args(json!({"path": "site/index.html"})))
            .await;
        let data = &record.result.unwrap()["data"];
        assert_eq!(data["content"], "a\nb");
        assert_eq!(data["line_count"], 2);
        assert_eq!(data["path"], "site/index.html");
    }

    #[tokio::test]
    async fn read_missing_is_logical_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tools = registry(dir.path(), PathPolicy::new());
        let record = tools.dispatch(names::FS_READ, args(json!({"path": "nope.txt"}))).await;
        assert_eq!(record.error.as_deref(), Some("File not found: nope.txt"));
        assert_eq!(record.result.unwrap()["ok"], false);
    }

    #[tokio::test]
    async fn every_tool_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let tools = registry(dir.path(), PathPolicy::new());
        let escape = "../../etc/passwd";
        let calls = [
            (names::FS_WRITE, json!({"path": escape, "content": "x"})),
            (names::FS_READ, json!({"path": escape})),
            (names::FS_EDIT, json!({"path": escape, "old_text": "a", "new_text": "b"})),
            (names::FS_DELETE, json!({"path": escape})),
            (names::FS_MKDIR, json!({"path": "../outside"})),
            (names::FS_RMDIR, json!({"path": "sub/../../x"})),
            (names::FS_LS, json!({"path": ".."})),
            (names::FS_TREE, json!({"path": "/"})),
        ];
        for (name, call) in calls {
            let record = tools.dispatch(name, args(call)).await;
            assert!(record.result.is_none(), "{name} produced a result");
            assert!(
                record.error.as_deref().unwrap().starts_with("Path outside working directory"),
                "{name}: {:?}",
                record.error
            );
        }
    }

    #[tokio::test]
    async fn protected_paths_block_mutation_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("vendor")).unwrap();
        let policy = PathPolicy::new().protect("package.json").protect("vendor");
        let tools = registry(dir.path(), policy);

        for (name, call) in [
            (names::FS_WRITE, json!({"path": "package.json", "content": "x"})),
            (names::FS_EDIT, json!({"path": "package.json", "old_text": "{", "new_text": "["})),
            (names::FS_DELETE, json!({"path": "package.json"})),
            (names::FS_RMDIR, json!({"path": "vendor"})),
        ] {
            let record = tools.dispatch(name, args(call)).await;
            assert!(
                record.error.as_deref().unwrap().starts_with("Attempt to modify protected file"),
                "{name}"
            );
        }
        let record = tools.dispatch(names::FS_READ, args(json!({"path": "package.json"}))).await;
        assert!(record.succeeded());
        assert_eq!(std::fs::read_to_string(dir.path().join("package.json")).unwrap(), "{}");
    }

    #[tokio::test]
    async fn edit_replaces_first_occurrence_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one two one").unwrap();
        let tools = registry(dir.path(), PathPolicy::new());

        let record = tools
            .dispatch(
                names::FS_EDIT,
                args(json!({"path": "a.txt", "old_text": "one", "new_text": "1"})),
            )
            .await;
        assert!(record.succeeded());
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "1 two one");

        let record = tools
            .dispatch(
                names::FS_EDIT,
                args(json!({"path": "a.txt", "old_text": "three", "new_text": "3"})),
            )
            .await;
        assert_eq!(record.error.as_deref(), Some("old_text not found in a.txt"));
    }

    #[tokio::test]
    async fn delete_refuses_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        let tools = registry(dir.path(), PathPolicy::new());
        let record = tools.dispatch(names::FS_DELETE, args(json!({"path": "assets"}))).await;
        assert!(record.error.unwrap().contains("fs.rmdir"));
        assert!(dir.path().join("assets").is_dir());
    }

    #[tokio::test]
    async fn rmdir_requires_recursive_for_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("build/js")).unwrap();
        let tools = registry(dir.path(), PathPolicy::new());

        let record = tools.dispatch(names::FS_RMDIR, args(json!({"path": "build"}))).await;
        assert_eq!(record.error.as_deref(), Some("Directory not empty: build"));

        let record = tools
            .dispatch(names::FS_RMDIR, args(json!({"path": "build", "recursive": true})))
            .await;
        assert!(record.succeeded());
        assert!(!dir.path().join("build").exists());

        let record = tools.dispatch(names::FS_RMDIR, args(json!({"path": "build"}))).await;
        assert_eq!(record.error.as_deref(), Some("Directory not found: build"));

        let record = tools.dispatch(names::FS_RMDIR, args(json!({"path": "."}))).await;
        assert!(!record.succeeded());
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn mkdir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let tools = registry(dir.path(), PathPolicy::new());
        for _ in 0..2 {
            let record = tools.dispatch(names::FS_MKDIR, args(json!({"path": "a/b/c"}))).await;
            assert!(record.succeeded());
        }
        assert!(dir.path().join("a/b/c").is_dir());
    }

    #[tokio::test]
    async fn ls_sorts_directories_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("A.css"), "").unwrap();
        std::fs::create_dir(dir.path().join("zeta")).unwrap();
        let tools = registry(dir.path(), PathPolicy::new());

        let record = tools.dispatch(names::FS_LS, ToolArgs::new()).await;
        let data = record.result.unwrap()["data"].clone();
        assert_eq!(data["count"], 3);
        let names: Vec<&str> = data["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["zeta", "A.css", "b.txt"]);
        assert_eq!(data["entries"][0]["type"], "dir");
        assert_eq!(data["entries"][2]["size"], 5);
    }

    #[tokio::test]
    async fn tree_skips_hidden_and_respects_depth() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/deep/deeper")).unwrap();
        std::fs::create_dir_all(dir.path().join(".tagloop")).unwrap();
        std::fs::write(dir.path().join("index.html"), "").unwrap();
        std::fs::write(dir.path().join("src/app.js"), "").unwrap();
        let tools = registry(dir.path(), PathPolicy::new());

        let record = tools.dispatch(names::FS_TREE, args(json!({"max_depth": 2}))).await;
        let lines: Vec<String> =
            serde_json::from_value(record.result.unwrap()["data"]["lines"].clone()).unwrap();
        assert_eq!(
            lines,
            vec![
                "./",
                "├── src/",
                "│   ├── deep/",
                "│   └── app.js",
                "└── index.html",
            ]
        );
    }

    #[tokio::test]
    async fn uninitialized_tool_errors() {
        let tool = ReadFile::default();
        let err = tool.execute(&args(json!({"path": "x"}))).await.unwrap_err();
        assert!(matches!(err, ToolError::NotInitialized(_)));
    }

    #[test]
    fn line_counting() {
        assert_eq!(line_count(""), 0);
        assert_eq!(line_count("a"), 1);
        assert_eq!(line_count("a\n"), 1);
        assert_eq!(line_count("a\nb"), 2);
    }
}
