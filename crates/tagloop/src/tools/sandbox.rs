//! Path containment and write protection for file-touching tools.
//!
//! Every caller-supplied path is resolved against the session root
//! ([`Sandbox::resolve`]). Resolution is lexical for `.`/`..` and follows
//! symlinks on the existing part of the path, so neither `../../etc/passwd`
//! nor a symlink pointing outside the root can escape.
//!
//! Mutations additionally consult a [`PathPolicy`]. Precedence, highest
//! first: kill-switch, writable glob, protected glob, default allow.

use crate::agent::env::SessionConfig;
use crate::tools::core::ToolError;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Set to `1` to disable all write protection.
pub const ALLOW_ALL_WRITES_ENV: &str = "TAGLOOP_ALLOW_ALL_WRITES";

/// Comma-separated globs that are always writable.
pub const WRITABLE_GLOBS_ENV: &str = "TAGLOOP_WRITABLE_GLOBS";

// ── PathPolicy ─────────────────────────────────────────────────────

/// Glob-based write protection.
///
/// Patterns match the slash-separated path relative to the session root.
/// `*` also matches `/`, so `src/*` covers nested files.
#[derive(Debug, Clone, Default)]
pub struct PathPolicy {
    protected: Vec<glob::Pattern>,
    writable: Vec<glob::Pattern>,
    allow_all: bool,
}

impl PathPolicy {
    /// A policy that allows every write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy from `protected_files`/`writable_paths` plus the
    /// [`ALLOW_ALL_WRITES_ENV`] and [`WRITABLE_GLOBS_ENV`] overrides.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::from_config_with(config, |key| std::env::var(key).ok())
    }

    /// [`from_config`](Self::from_config) reading overrides through `lookup`.
    pub fn from_config_with(config: &SessionConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut policy = Self::new();
        for pattern in &config.protected_files {
            policy = policy.protect(pattern);
        }
        for pattern in &config.writable_paths {
            policy = policy.allow_write(pattern);
        }
        policy.with_overrides(lookup)
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if lookup(ALLOW_ALL_WRITES_ENV).is_some_and(|v| v.trim() == "1") {
            debug!("{ALLOW_ALL_WRITES_ENV}=1: write protection disabled");
            self.allow_all = true;
        }
        if let Some(extra) = lookup(WRITABLE_GLOBS_ENV) {
            for pattern in extra.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                self = self.allow_write(pattern);
            }
        }
        self
    }

    /// Block writes to paths matching `pattern`.
    pub fn protect(mut self, pattern: &str) -> Self {
        match glob::Pattern::new(pattern) {
            Ok(p) => self.protected.push(p),
            Err(e) => warn!("Ignoring invalid protected glob '{pattern}': {e}"),
        }
        self
    }

    /// Force-allow writes to paths matching `pattern`, overriding `protect`.
    pub fn allow_write(mut self, pattern: &str) -> Self {
        match glob::Pattern::new(pattern) {
            Ok(p) => self.writable.push(p),
            Err(e) => warn!("Ignoring invalid writable glob '{pattern}': {e}"),
        }
        self
    }

    /// Kill-switch: when `true`, nothing is protected.
    pub fn allow_all_writes(mut self, enabled: bool) -> Self {
        self.allow_all = enabled;
        self
    }

    /// Whether a write to the root-relative path `rel` is blocked.
    pub fn is_protected(&self, rel: &str) -> bool {
        if self.allow_all {
            return false;
        }
        if self.writable.iter().any(|p| p.matches(rel)) {
            return false;
        }
        self.protected.iter().any(|p| p.matches(rel))
    }
}

// ── Sandbox ────────────────────────────────────────────────────────

/// A session root plus its write policy.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    policy: PathPolicy,
}

impl Sandbox {
    /// Create a sandbox rooted at `root`, which must exist.
    pub fn new(root: &Path, policy: PathPolicy) -> Result<Self, String> {
        let root = root
            .canonicalize()
            .map_err(|e| format!("failed to resolve working directory {}: {e}", root.display()))?;
        Ok(Self { root, policy })
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    /// Resolve a caller-supplied path to an absolute path inside the root.
    ///
    /// The root itself is a valid resolution. Anything else outside it is
    /// rejected with [`ToolError::OutsideSandbox`].
    pub fn resolve(&self, rel: &str) -> Result<PathBuf, ToolError> {
        let joined = self.root.join(rel);
        let resolved = follow_existing(&normalize(&joined));
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            debug!("Rejected path '{rel}' -> {}", resolved.display());
            Err(ToolError::OutsideSandbox(rel.to_string()))
        }
    }

    /// Slash-separated path relative to the root (`.` for the root).
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join("/")
        }
    }

    /// Whether writing to the resolved path `path` is blocked by the policy.
    pub fn is_protected(&self, path: &Path) -> bool {
        self.policy.is_protected(&self.relative(path))
    }
}

/// Lexically remove `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the longest existing ancestor and re-append the rest, so
/// symlinks in the existing prefix are followed.
fn follow_existing(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        if let Ok(canonical) = ancestor.canonicalize() {
            return match path.strip_prefix(ancestor) {
                Ok(rest) if !rest.as_os_str().is_empty() => canonical.join(rest),
                _ => canonical,
            };
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox(dir: &Path) -> Sandbox {
        Sandbox::new(dir, PathPolicy::new()).unwrap()
    }

    #[test]
    fn resolves_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let sb = sandbox(dir.path());
        let p = sb.resolve("src/app.js").unwrap();
        assert!(p.starts_with(sb.root()));
        assert_eq!(sb.relative(&p), "src/app.js");
        assert_eq!(sb.relative(&sb.resolve(".").unwrap()), ".");
    }

    #[test]
    fn rejects_traversal_in_every_shape() {
        let dir = tempfile::tempdir().unwrap();
        let sb = sandbox(dir.path());
        for rel in ["../../etc/passwd", "..", "a/../../x", "/etc/passwd", "./../sibling"] {
            let err = sb.resolve(rel).unwrap_err();
            assert!(matches!(err, ToolError::OutsideSandbox(_)), "{rel}");
            assert!(err.to_string().starts_with("Path outside working directory"));
        }
    }

    #[test]
    fn inner_parent_components_stay_inside() {
        let dir = tempfile::tempdir().unwrap();
        let sb = sandbox(dir.path());
        let p = sb.resolve("a/b/../c.txt").unwrap();
        assert_eq!(sb.relative(&p), "a/c.txt");
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escape() {
        let outside = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let sb = sandbox(dir.path());
        assert!(sb.resolve("link/secret.txt").is_err());
    }

    #[test]
    fn policy_precedence() {
        let policy = PathPolicy::new()
            .protect("*.json")
            .protect("config/*")
            .allow_write("config/local.json");
        assert!(policy.is_protected("package.json"));
        assert!(policy.is_protected("config/deep/app.yaml"));
        assert!(!policy.is_protected("config/local.json"));
        assert!(!policy.is_protected("src/index.html"));

        let open = policy.allow_all_writes(true);
        assert!(!open.is_protected("package.json"));
    }

    #[test]
    fn config_policy_layers_in_order() {
        let config = SessionConfig {
            protected_files: vec!["*.json".into(), "assets/*".into()],
            writable_paths: vec!["assets/public/*".into()],
            ..Default::default()
        };
        let no_env = |_: &str| -> Option<String> { None };
        let env_globs = |key: &str| (key == WRITABLE_GLOBS_ENV).then(|| "site.json, ".to_string());
        let kill_switch = |key: &str| (key == ALLOW_ALL_WRITES_ENV).then(|| " 1 ".to_string());

        let base = PathPolicy::from_config_with(&config, no_env);
        let globbed = PathPolicy::from_config_with(&config, env_globs);
        let open = PathPolicy::from_config_with(&config, kill_switch);

        // (path, base, with env globs, with kill switch)
        let cases = [
            ("index.html", false, false, false),
            ("package.json", true, true, false),
            ("site.json", true, false, false),
            ("assets/logo.png", true, true, false),
            ("assets/public/logo.png", false, false, false),
            ("assets/public/data.json", false, false, false),
        ];
        for (path, protected, with_globs, with_kill) in cases {
            assert_eq!(base.is_protected(path), protected, "base: {path}");
            assert_eq!(globbed.is_protected(path), with_globs, "env globs: {path}");
            assert_eq!(open.is_protected(path), with_kill, "kill switch: {path}");
        }

        let off = PathPolicy::from_config_with(&config, |key: &str| {
            (key == ALLOW_ALL_WRITES_ENV).then(|| "0".to_string())
        });
        assert!(off.is_protected("package.json"));
    }

    #[test]
    fn sandbox_checks_protection_on_resolved_paths() {
        let dir = tempfile::tempdir().unwrap();
        let sb = Sandbox::new(dir.path(), PathPolicy::new().protect("package.json")).unwrap();
        assert!(sb.is_protected(&sb.resolve("package.json").unwrap()));
        assert!(sb.is_protected(&sb.resolve("./sub/../package.json").unwrap()));
        assert!(!sb.is_protected(&sb.resolve("index.html").unwrap()));
    }

    #[test]
    fn invalid_globs_are_ignored() {
        let policy = PathPolicy::new().protect("[");
        assert!(!policy.is_protected("["));
    }
}
